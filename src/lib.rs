//! # backhaul
//!
//! Bounded-concurrency, resumable sync of platform backups into object
//! storage.
//!
//! ## Core Features
//!
//! - **Bounded concurrency**: at most N transfers in flight per
//!   environment, on a dedicated worker pool
//! - **Resumable**: objects already at the destination are skipped, so an
//!   interrupted job picks up where it left off
//! - **Streaming transfers**: source bytes spool through the staging
//!   directory and into the store in fixed-size chunks, never a whole
//!   file in memory
//! - **Failure isolation**: one bad artifact or one unlistable environment
//!   is recorded and the rest of the batch completes
//! - **Cancellable**: a cooperative token stops new transfers and lets
//!   in-flight ones drain
//! - **Progress reporting**: per-item byte counters with human formatting
//!
//! ## Quick Start
//!
//! ```no_run
//! use backhaul::{
//!     BackupCatalog, BackupItem, DirStore, HttpFetcher, Result, SiteEnvironments, SyncJob, Syncer,
//! };
//! use chrono::{DateTime, Utc};
//!
//! // The platform-facing collaborators are implemented at the boundary,
//! // e.g. over the platform API or its CLI's JSON output.
//! struct Platform;
//!
//! impl SiteEnvironments for Platform {
//!     fn list_environment_ids(&self, _site: &str) -> Result<Vec<String>> {
//!         Ok(vec!["dev".to_string(), "live".to_string()])
//!     }
//! }
//!
//! impl BackupCatalog for Platform {
//!     fn list_finished_backups(
//!         &self,
//!         _environment: &str,
//!         _element: Option<&str>,
//!         _after: Option<DateTime<Utc>>,
//!     ) -> Result<Vec<BackupItem>> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let platform = Platform;
//! let store = DirStore::new("/srv/backups");
//! let fetcher = HttpFetcher::new()?;
//!
//! let job = SyncJob::new("acme-site", "acme-backups")
//!     .with_environment("live")
//!     .with_concurrent(4);
//!
//! let report = Syncer::new(&platform, &platform, &store, &fetcher).sync(&job)?;
//! println!(
//!     "{} uploaded, {} skipped, {} failed",
//!     report.uploaded(),
//!     report.skipped(),
//!     report.failed()
//! );
//! # Ok::<(), backhaul::Error>(())
//! ```
//!
//! ## Collaborators
//!
//! The sync core depends on four narrow interfaces handed in at
//! construction — no component reads ambient global state:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`SiteEnvironments`] | enumerate a site's environments |
//! | [`BackupCatalog`] | list one environment's finished backups |
//! | [`ObjectStore`] | existence probe + streaming put at the destination |
//! | [`ArtifactFetcher`] | open a source URL for streaming reads |
//!
//! [`DirStore`] (local directory), [`S3Store`] (S3 via the `aws` CLI) and
//! [`HttpFetcher`] are the implementations shipped with the crate; the
//! platform-facing traits are implemented at the boundary, e.g. from the
//! platform CLI's JSON listings.
//!
//! ## Idempotence
//!
//! The destination existence check is the only idempotence mechanism:
//! a key that exists is treated as already synced, with no content
//! comparison. Re-running a job therefore re-uploads nothing that
//! finished before, but it also cannot repair a same-named object with
//! different content.
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `progress` | Progress bar support with indicatif |
//! | `tracing` | Structured logging with the tracing crate |
//! | `serde` | Serialize/Deserialize for [`SyncJob`] and [`BackupItem`] |
//! | `full` | Enable all optional features |

#![cfg_attr(docsrs, feature(doc_cfg))]

mod catalog;
mod config;
mod error;
mod fetch;
mod job;
mod progress;
mod spool;
mod store;
mod sync;

pub use catalog::{BackupCatalog, BackupItem, SiteEnvironments, resolve_environments};
pub use config::{ClientConfig, Credentials, DEFAULT_REGION, StoreOptions, resolve_client_config};
pub use error::{Error, Result};
pub use fetch::{ArtifactFetcher, HttpFetcher};
pub use job::SyncJob;
pub use progress::{
    DEFAULT_PRECISION, ProgressFn, format_bytes, format_bytes_with, percentage, status_line,
};
pub use spool::{Spool, ensure_staging_dir};
pub use store::{DirStore, ObjectStore, S3Store};
pub use sync::{EnvReport, SyncReport, Syncer, TransferResult, TransferStatus, destination_key};

#[cfg(feature = "progress")]
#[cfg_attr(docsrs, doc(cfg(feature = "progress")))]
pub use progress::create_progress_bar;
