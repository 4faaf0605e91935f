//! Core sync orchestration.
//!
//! [`Syncer`] wires the four collaborators together and drives the
//! transfer scheduler: for each environment of the job, list the finished
//! backups, skip what the destination already holds, and stream the rest
//! with at most `job.concurrent` transfers in flight.
//!
//! # Scheduling model
//!
//! Environments are processed strictly sequentially. Within one
//! environment the items run on a dedicated thread pool sized to the
//! job's concurrency limit; task start order follows the catalog listing
//! order, completion order is unconstrained, and results land in a
//! lock-guarded collector, so aggregation never depends on either order.
//! A failed item is recorded and its siblings keep running; only
//! pre-flight conditions (bad configuration, no environments, unusable
//! staging directory) abort the job.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::catalog::{BackupCatalog, BackupItem, SiteEnvironments, resolve_environments};
use crate::error::{Error, Result};
use crate::fetch::ArtifactFetcher;
use crate::job::SyncJob;
use crate::progress::ProgressFn;
use crate::spool::{Spool, ensure_staging_dir};
use crate::store::ObjectStore;

/// Outcome classification for one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The destination key already existed; the source was never contacted
    Skipped,
    /// The artifact was streamed to the destination
    Uploaded,
    /// The transfer failed; see [`TransferResult::error`]
    Failed,
}

/// Outcome of attempting one backup artifact.
#[derive(Debug)]
pub struct TransferResult {
    /// Fully qualified destination key
    pub key: String,
    /// Object basename, for human reporting
    pub filename: String,
    /// What happened
    pub status: TransferStatus,
    /// Bytes transferred (0 for skipped and failed items)
    pub bytes: u64,
    /// Error detail when the status is [`TransferStatus::Failed`]
    pub error: Option<Error>,
}

impl TransferResult {
    fn skipped(key: String, filename: String) -> Self {
        Self {
            key,
            filename,
            status: TransferStatus::Skipped,
            bytes: 0,
            error: None,
        }
    }

    fn uploaded(key: String, filename: String, bytes: u64) -> Self {
        Self {
            key,
            filename,
            status: TransferStatus::Uploaded,
            bytes,
            error: None,
        }
    }

    fn failed(key: String, filename: String, error: Error) -> Self {
        Self {
            key,
            filename,
            status: TransferStatus::Failed,
            bytes: 0,
            error: Some(error),
        }
    }
}

/// Aggregated outcome for one environment.
#[derive(Debug)]
pub struct EnvReport {
    /// Environment identifier
    pub environment: String,
    /// One result per catalog item, in completion order
    pub results: Vec<TransferResult>,
    /// Set when the catalog listing itself failed and the environment was
    /// skipped
    pub error: Option<Error>,
}

impl EnvReport {
    fn count(&self, status: TransferStatus) -> u64 {
        self.results.iter().filter(|r| r.status == status).count() as u64
    }

    /// Number of items skipped because they already existed.
    pub fn skipped(&self) -> u64 {
        self.count(TransferStatus::Skipped)
    }

    /// Number of items uploaded.
    pub fn uploaded(&self) -> u64 {
        self.count(TransferStatus::Uploaded)
    }

    /// Number of items that failed.
    pub fn failed(&self) -> u64 {
        self.count(TransferStatus::Failed)
    }

    /// Total bytes transferred for this environment.
    pub fn bytes_transferred(&self) -> u64 {
        self.results.iter().map(|r| r.bytes).sum()
    }

    /// The failed results, for error reporting.
    pub fn failures(&self) -> impl Iterator<Item = &TransferResult> {
        self.results
            .iter()
            .filter(|r| r.status == TransferStatus::Failed)
    }
}

/// Outcome of a whole sync job: one [`EnvReport`] per processed
/// environment, in processing order.
#[derive(Debug)]
pub struct SyncReport {
    /// Per-environment reports
    pub environments: Vec<EnvReport>,
    /// Wall-clock duration of the job
    pub duration: Duration,
}

impl SyncReport {
    /// Look up the report for one environment.
    pub fn environment(&self, name: &str) -> Option<&EnvReport> {
        self.environments.iter().find(|e| e.environment == name)
    }

    /// Total items skipped across all environments.
    pub fn skipped(&self) -> u64 {
        self.environments.iter().map(EnvReport::skipped).sum()
    }

    /// Total items uploaded across all environments.
    pub fn uploaded(&self) -> u64 {
        self.environments.iter().map(EnvReport::uploaded).sum()
    }

    /// Total items failed across all environments.
    pub fn failed(&self) -> u64 {
        self.environments.iter().map(EnvReport::failed).sum()
    }

    /// Total bytes transferred across all environments.
    pub fn bytes_transferred(&self) -> u64 {
        self.environments
            .iter()
            .map(EnvReport::bytes_transferred)
            .sum()
    }
}

/// Compute the destination key for one artifact.
///
/// Keys are `prefix / site / environment / filename` joined with `/`;
/// an absent or empty prefix is omitted. The mapping is deterministic:
/// the same filename in the same environment always lands on the same
/// key, which is what makes the existence check an idempotence anchor.
pub fn destination_key(
    prefix: Option<&str>,
    site: &str,
    environment: &str,
    filename: &str,
) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{site}/{environment}/{filename}"),
        None => format!("{site}/{environment}/{filename}"),
    }
}

/// Orchestrates a sync job across its collaborators.
///
/// The collaborators are narrow interfaces handed in at construction;
/// the syncer holds no other state and reads nothing ambient.
pub struct Syncer<'a> {
    site: &'a dyn SiteEnvironments,
    catalog: &'a dyn BackupCatalog,
    store: &'a dyn ObjectStore,
    fetcher: &'a dyn ArtifactFetcher,
    progress: Option<ProgressFn>,
}

impl<'a> Syncer<'a> {
    /// Create a syncer over the four collaborators.
    pub fn new(
        site: &'a dyn SiteEnvironments,
        catalog: &'a dyn BackupCatalog,
        store: &'a dyn ObjectStore,
        fetcher: &'a dyn ArtifactFetcher,
    ) -> Self {
        Self {
            site,
            catalog,
            store,
            fetcher,
            progress: None,
        }
    }

    /// Install a progress callback.
    ///
    /// Callbacks fire only for verbose jobs, tagged with the in-flight
    /// item's filename; they are status output, never control flow.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the job and return the per-environment report.
    ///
    /// # Errors
    ///
    /// Pre-flight failures ([`Error::Configuration`] from the caller's
    /// setup, [`Error::NoEnvironments`], [`Error::Staging`]) abort before
    /// any transfer starts. [`Error::Cancelled`] is returned when the
    /// job's cancellation token fires, carrying partial counts. All
    /// per-environment and per-item failures are captured in the report
    /// instead: the job always completes once in-flight transfers drain.
    pub fn sync(&self, job: &SyncJob) -> Result<SyncReport> {
        let start_time = Instant::now();

        ensure_staging_dir(&job.staging_dir)?;
        let environments = resolve_environments(job, self.site)?;

        let mut reports = Vec::with_capacity(environments.len());
        for environment in &environments {
            if job.is_cancelled() {
                break;
            }
            reports.push(self.sync_environment(job, environment));
        }

        let report = SyncReport {
            environments: reports,
            duration: start_time.elapsed(),
        };

        if job.is_cancelled() {
            return Err(Error::Cancelled {
                uploaded: report.uploaded(),
                skipped: report.skipped(),
                failed: report.failed(),
                bytes_transferred: report.bytes_transferred(),
            });
        }

        Ok(report)
    }

    /// Run one environment's listing and transfers to completion.
    fn sync_environment(&self, job: &SyncJob, environment: &str) -> EnvReport {
        let items = match self.catalog.list_finished_backups(
            environment,
            job.element.as_deref(),
            job.after,
        ) {
            Ok(items) => items,
            Err(err) => {
                let err = match err {
                    listing @ Error::CatalogListing { .. } => listing,
                    other => Error::CatalogListing {
                        environment: environment.to_string(),
                        reason: other.to_string(),
                    },
                };
                job.warn(&format!("{err}"));
                return EnvReport {
                    environment: environment.to_string(),
                    results: Vec::new(),
                    error: Some(err),
                };
            }
        };

        let results = Mutex::new(Vec::with_capacity(items.len()));

        if !items.is_empty() {
            let run = |items: &[BackupItem]| {
                items.par_iter().for_each(|item| {
                    if let Some(result) = self.process_item(job, environment, item) {
                        results
                            .lock()
                            .unwrap_or_else(std::sync::PoisonError::into_inner)
                            .push(result);
                    }
                });
            };

            // A dedicated pool enforces the job's concurrency ceiling
            // regardless of what the global pool is sized to.
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(job.concurrent)
                .build();

            match pool {
                Ok(pool) => pool.install(|| run(&items)),
                Err(e) => {
                    job.warn(&format!(
                        "Failed to create thread pool ({e}), using global pool"
                    ));
                    run(&items);
                }
            }
        }

        EnvReport {
            environment: environment.to_string(),
            results: results
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
            error: None,
        }
    }

    /// Handle one catalog item inside the worker pool.
    ///
    /// Returns `None` when the job was cancelled before this item started.
    fn process_item(
        &self,
        job: &SyncJob,
        environment: &str,
        item: &BackupItem,
    ) -> Option<TransferResult> {
        if job.is_cancelled() {
            return None;
        }

        let key = destination_key(job.prefix.as_deref(), &job.site, environment, &item.filename);

        match self.store.exists(&key) {
            Ok(true) => return Some(TransferResult::skipped(key, item.filename.clone())),
            Ok(false) => {}
            Err(err) => {
                job.warn(&format!("Failed to probe {key}: {err}"));
                return Some(TransferResult::failed(key, item.filename.clone(), err));
            }
        }

        Some(self.transfer_with_retry(job, item, key))
    }

    /// Drive one transfer, re-attempting per the job's retry policy.
    fn transfer_with_retry(&self, job: &SyncJob, item: &BackupItem, key: String) -> TransferResult {
        let mut attempt = 0u32;
        loop {
            match self.transfer(job, item, &key) {
                Ok(bytes) => return TransferResult::uploaded(key, item.filename.clone(), bytes),
                Err(err) => {
                    if attempt >= job.retries || job.is_cancelled() {
                        job.warn(&format!("Failed to sync {}: {err}", item.filename));
                        return TransferResult::failed(key, item.filename.clone(), err);
                    }
                    let delay = job.retry_delay * 2u32.saturating_pow(attempt);
                    job.warn(&format!(
                        "Retrying {} after error: {err} (attempt {}/{})",
                        item.filename,
                        attempt + 1,
                        job.retries
                    ));
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// One end-to-end attempt: open the source, spool it, stream the spool
    /// into the destination.
    fn transfer(&self, job: &SyncJob, item: &BackupItem, key: &str) -> Result<u64> {
        // Fresh stream per attempt; signed URLs are never replayed.
        let mut source = self.fetcher.open(item)?;
        let spool = Spool::capture(source.as_mut(), &job.staging_dir)?;
        drop(source);

        let mut reader = spool.reader().map_err(|e| Error::Spool {
            path: job.staging_dir.clone(),
            source: e,
        })?;

        let progress = if job.verbose {
            self.progress.as_ref()
        } else {
            None
        };
        let filename = item.filename.as_str();

        self.store
            .put(key, &mut reader, Some(spool.len()), &mut |done, expected| {
                if let Some(progress) = progress {
                    progress(filename, done, expected);
                }
            })
    }
}
