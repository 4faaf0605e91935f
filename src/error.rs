//! Error types for backhaul.
//!
//! This module provides the [`Error`] enum containing all possible errors
//! that can occur during a sync job, and the [`Result`] type alias.
//!
//! # Error Categories
//!
//! | Category | Errors |
//! |----------|--------|
//! | Pre-flight (fatal) | [`Error::Configuration`], [`Error::NoEnvironments`], [`Error::Staging`] |
//! | Per-environment | [`Error::CatalogListing`] |
//! | Per-item | [`Error::Fetch`], [`Error::Spool`], [`Error::Store`] |
//! | Control | [`Error::Cancelled`] |
//! | IO | [`Error::Io`] |
//!
//! Pre-flight errors abort the job before any transfer starts. Per-environment
//! and per-item errors are captured into the [`SyncReport`](crate::SyncReport)
//! instead of being returned: one bad artifact or one unlistable environment
//! never takes down the rest of the batch.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for backhaul operations.
///
/// This is a type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a sync job.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// IO error during spool or store operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Destination-store client configuration is structurally invalid
    #[error("Invalid client configuration: {reason}")]
    Configuration {
        /// What made the configuration unusable
        reason: String,
    },

    /// The site has zero environments and none was explicitly requested
    #[error("Site '{site}' has no environments to sync")]
    NoEnvironments {
        /// The site identifier that resolved to nothing
        site: String,
    },

    /// Failed to create the local staging directory
    #[error("Failed to create staging directory {path}: {source}")]
    Staging {
        /// The staging directory that could not be created
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Listing the backup catalog for one environment failed
    ///
    /// Recorded on that environment's report; the remaining environments
    /// still run.
    #[error("Failed to list backups for environment '{environment}': {reason}")]
    CatalogListing {
        /// The environment whose listing failed
        environment: String,
        /// Collaborator error detail
        reason: String,
    },

    /// Opening or reading the artifact's source URL failed
    #[error("Failed to fetch {url}: {reason}")]
    Fetch {
        /// The source URL that could not be read
        url: String,
        /// Transport or status detail
        reason: String,
    },

    /// Spooling the source stream into the staging directory failed
    #[error("Failed to spool artifact into {path}: {source}")]
    Spool {
        /// The staging directory the spool file lives in
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The destination store rejected the object
    #[error("Destination store rejected '{key}': {reason}")]
    Store {
        /// The destination key being written
        key: String,
        /// Store error detail
        reason: String,
    },

    /// The job was cancelled via its cancellation token
    ///
    /// Carries partial counts so the caller knows what completed before
    /// cancellation. Re-running the same job resumes where it left off:
    /// everything already uploaded is skipped by the existence check.
    #[error(
        "Sync cancelled ({uploaded} uploaded, {skipped} skipped, {failed} failed, {bytes_transferred} bytes)"
    )]
    Cancelled {
        /// Items uploaded before cancellation
        uploaded: u64,
        /// Items skipped before cancellation
        skipped: u64,
        /// Items failed (including never-started) before cancellation
        failed: u64,
        /// Total bytes transferred before cancellation
        bytes_transferred: u64,
    },
}

impl Error {
    /// Whether this error aborts the job before any transfer starts.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::NoEnvironments { .. } | Self::Staging { .. }
        )
    }
}
