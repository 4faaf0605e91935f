//! Artifact source streams.
//!
//! [`ArtifactFetcher`] turns a [`BackupItem`] into a readable byte stream.
//! The production implementation is [`HttpFetcher`]; tests and air-gapped
//! mirrors can use `file://` URLs, which it serves from the local
//! filesystem.

use std::fs::File;
use std::io::Read;
use std::time::Duration;

use crate::catalog::BackupItem;
use crate::error::{Error, Result};

/// Opens a readable stream for one backup artifact.
///
/// `open` is called fresh for every transfer attempt: signed URLs are
/// time-limited, and a previously read response stream must never be
/// replayed. Implementations are shared across worker threads.
pub trait ArtifactFetcher: Sync {
    /// Open the artifact's source URL for streaming reads.
    fn open(&self, item: &BackupItem) -> Result<Box<dyn Read + Send>>;
}

/// HTTP fetcher over a shared blocking client.
///
/// The client carries a request timeout so no transfer can hang forever on
/// a dead connection; the timeout covers the whole request including body
/// reads.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn open(&self, item: &BackupItem) -> Result<Box<dyn Read + Send>> {
        // Local URLs bypass the HTTP client entirely.
        if let Some(path) = item.url.strip_prefix("file://") {
            let file = File::open(path).map_err(|e| Error::Fetch {
                url: item.url.clone(),
                reason: e.to_string(),
            })?;
            return Ok(Box::new(file));
        }

        let response = self
            .client
            .get(&item.url)
            .send()
            .map_err(|e| Error::Fetch {
                url: item.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: item.url.clone(),
                reason: format!("HTTP status {status}"),
            });
        }

        Ok(Box::new(response))
    }
}
