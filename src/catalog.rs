//! Backup catalog and site collaborator contracts.
//!
//! The sync core never talks to the hosting platform directly; it consumes
//! two narrow traits implemented at the boundary: [`SiteEnvironments`] to
//! enumerate a site's environments and [`BackupCatalog`] to list the
//! finished backups of one environment. Both are shared immutably across
//! worker threads, so implementations must be `Sync`.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::job::SyncJob;

/// One transferable backup artifact.
///
/// Produced by the [`BackupCatalog`]; read-only to the transfer scheduler.
/// The `url` is a time-limited signed URL and is fetched fresh for every
/// transfer attempt — it is never reused across retries.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BackupItem {
    /// Object basename, e.g. `acme_live_2024-03-01.tar.gz`
    pub filename: String,
    /// Time-limited source URL for the artifact bytes
    pub url: String,
    /// When the backup finished
    pub created_at: DateTime<Utc>,
    /// Environment this backup belongs to
    pub environment: String,
    /// Byte size if the catalog knows it in advance
    ///
    /// May be unknown until the transfer begins; progress reporting then
    /// falls back to the spooled length.
    pub size: Option<u64>,
}

/// Enumerates a site's environments.
pub trait SiteEnvironments: Sync {
    /// List the environment identifiers of `site`, in upstream order.
    ///
    /// The order is preserved as given (typically the platform's lifecycle
    /// ordering); the core never re-sorts it.
    fn list_environment_ids(&self, site: &str) -> Result<Vec<String>>;
}

/// Lists the finished backups of one environment.
///
/// Only finished backups appear — artifacts still being created are the
/// collaborator's problem, never the scheduler's. Element and timestamp
/// filtering happen here too; the core does not re-validate them. An empty
/// listing is a valid nothing-to-sync state, not an error.
pub trait BackupCatalog: Sync {
    /// List finished backups for `environment`, optionally filtered by
    /// artifact kind and minimum creation timestamp.
    fn list_finished_backups(
        &self,
        environment: &str,
        element: Option<&str>,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<BackupItem>>;
}

/// Expand a job into the ordered list of environments to process.
///
/// An explicit environment on the job short-circuits the site lookup.
///
/// # Errors
///
/// Returns [`Error::NoEnvironments`] when the site resolves to zero
/// environments and none was explicitly requested.
pub fn resolve_environments(job: &SyncJob, site: &dyn SiteEnvironments) -> Result<Vec<String>> {
    if let Some(environment) = &job.environment {
        return Ok(vec![environment.clone()]);
    }

    let environments = site.list_environment_ids(&job.site)?;
    if environments.is_empty() {
        return Err(Error::NoEnvironments {
            site: job.site.clone(),
        });
    }
    Ok(environments)
}
