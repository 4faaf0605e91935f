//! Job configuration for sync operations.
//!
//! This module provides [`SyncJob`], the immutable configuration for one
//! sync invocation. A job is constructed once at the boundary and passed
//! by reference into every component; no component reads ambient global
//! state.
//!
//! # Example
//!
//! ```
//! use backhaul::SyncJob;
//!
//! let job = SyncJob::new("acme-site", "acme-backups")
//!     .with_environment("live")
//!     .with_concurrent(4)
//!     .with_prefix("nightly");
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Configuration for one sync invocation.
///
/// Use [`SyncJob::new`] to get sensible defaults, then customize using the
/// builder methods.
///
/// # Default Values
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `environment` | `None` | Sync all environments of the site |
/// | `prefix` | `None` | No destination path prefix |
/// | `staging_dir` | `$TMPDIR/backhaul` | Local spool directory |
/// | `concurrent` | 2 | Simultaneous in-flight transfers |
/// | `element` | `None` | No artifact-kind filter |
/// | `after` | `None` | No minimum creation timestamp |
/// | `retries` | 0 | No per-item retry |
/// | `retry_delay` | 500 ms | Backoff base when retries are enabled |
/// | `verbose` | `false` | No per-item progress output |
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SyncJob {
    /// Site identifier on the hosting platform
    pub site: String,

    /// Single environment to sync; `None` means all environments
    pub environment: Option<String>,

    /// Destination bucket name
    pub bucket: String,

    /// Destination path prefix, prepended to every object key
    pub prefix: Option<String>,

    /// Local staging directory for spool files (created if absent)
    pub staging_dir: PathBuf,

    /// Maximum number of simultaneous in-flight transfers (default: 2)
    ///
    /// Builder methods clamp this to at least 1.
    pub concurrent: usize,

    /// Artifact-kind filter passed to the backup catalog (e.g. "files", "db")
    pub element: Option<String>,

    /// Only sync backups created after this timestamp
    pub after: Option<DateTime<Utc>>,

    /// Additional attempts per item after the first failure (default: 0)
    ///
    /// Zero preserves the strict no-retry behavior. Each attempt re-opens
    /// the source URL; a response stream is never replayed.
    pub retries: u32,

    /// Backoff base between retry attempts; doubles per attempt
    pub retry_delay: Duration,

    /// Emit per-item byte progress (default: false)
    pub verbose: bool,

    /// Cooperative cancellation token
    ///
    /// When the flag becomes true, no new transfer starts; in-flight
    /// transfers drain and the job returns
    /// [`Error::Cancelled`](crate::Error::Cancelled) with partial counts.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel_token: Option<Arc<AtomicBool>>,

    /// Callback for warnings (optional)
    ///
    /// If not set and the `tracing` feature is enabled, warnings are logged
    /// via tracing. Otherwise, warnings are silently ignored.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warn_handler: Option<fn(&str)>,
}

impl SyncJob {
    /// Create a job for the given site and destination bucket with defaults.
    pub fn new<S: Into<String>, B: Into<String>>(site: S, bucket: B) -> Self {
        Self {
            site: site.into(),
            environment: None,
            bucket: bucket.into(),
            prefix: None,
            staging_dir: std::env::temp_dir().join("backhaul"),
            concurrent: 2,
            element: None,
            after: None,
            retries: 0,
            retry_delay: Duration::from_millis(500),
            verbose: false,
            cancel_token: None,
            warn_handler: None,
        }
    }

    /// Restrict the job to a single environment.
    #[must_use]
    pub fn with_environment<E: Into<String>>(mut self, environment: E) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the destination path prefix.
    #[must_use]
    pub fn with_prefix<P: Into<String>>(mut self, prefix: P) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the local staging directory.
    #[must_use]
    pub fn with_staging_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.staging_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the number of simultaneous transfers.
    ///
    /// Value is clamped to at least 1 to prevent a stalled pool.
    #[must_use]
    pub fn with_concurrent(mut self, n: usize) -> Self {
        self.concurrent = n.max(1);
        self
    }

    /// Set the artifact-kind filter.
    #[must_use]
    pub fn with_element<E: Into<String>>(mut self, element: E) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Only sync backups created after the given timestamp.
    #[must_use]
    pub fn with_after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    /// Enable per-item retry with the given number of additional attempts.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the backoff base between retry attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enable per-item progress output.
    #[must_use]
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Set a cancellation token for cooperative cancellation.
    ///
    /// Set the token to `true` (e.g. from a Ctrl-C handler) to stop issuing
    /// new transfers and let in-flight ones drain.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::sync::atomic::AtomicBool;
    /// use backhaul::SyncJob;
    ///
    /// let cancel = Arc::new(AtomicBool::new(false));
    /// let job = SyncJob::new("acme-site", "acme-backups").with_cancel_token(cancel.clone());
    /// ```
    #[must_use]
    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Create a job with a warning handler.
    #[must_use]
    pub fn with_warn_handler(mut self, handler: fn(&str)) -> Self {
        self.warn_handler = Some(handler);
        self
    }

    /// Whether the cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| token.load(Ordering::Relaxed))
    }

    pub(crate) fn warn(&self, msg: &str) {
        if let Some(handler) = self.warn_handler {
            handler(msg);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("{}", msg);
        }
    }
}
