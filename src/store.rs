//! Destination object stores.
//!
//! [`ObjectStore`] is the narrow contract the scheduler drives: an
//! existence probe and a streaming put. Two implementations ship with the
//! crate: [`DirStore`] writes objects under a local root (atomic temp file
//! + rename), and [`S3Store`] drives the `aws` CLI as a subprocess so the
//! upload streams through the child's stdin without ever holding a whole
//! object in memory.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Copy buffer size for streaming puts.
const CHUNK_SIZE: usize = 64 * 1024;

/// Destination store contract.
///
/// Shared immutably across all transfer tasks of an environment; both
/// methods must be safe to call concurrently.
pub trait ObjectStore: Sync {
    /// Whether an object already exists at `key`.
    ///
    /// A `true` result is the sole idempotence mechanism: the item is
    /// recorded as skipped without contacting the source. There is no
    /// content comparison — a same-named object with different bytes is
    /// indistinguishable from an already-synced one and will never be
    /// re-uploaded.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Stream `reader` into the object at `key`.
    ///
    /// `expected_len` is forwarded to progress callbacks and may be used
    /// as an upload hint; `progress` receives cumulative
    /// `(bytes_done, bytes_expected)` pairs as chunks land. Returns the
    /// number of bytes written.
    fn put(
        &self,
        key: &str,
        reader: &mut dyn Read,
        expected_len: Option<u64>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64>;
}

/// Chunked copy that reports cumulative progress per chunk.
fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    expected_len: Option<u64>,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        done += n as u64;
        progress(done, expected_len);
    }
    writer.flush()?;
    Ok(done)
}

// =============================================================================
// Filesystem-rooted store
// =============================================================================

/// Object store rooted at a local directory.
///
/// Keys map to paths under the root; writes go to a temp file in the
/// destination directory and are renamed into place, so a crashed run
/// never leaves a partial object behind for the existence probe to
/// mistake for a finished one.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    fsync: bool,
}

impl DirStore {
    /// Create a store rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            fsync: true,
        }
    }

    /// Disable fsync for faster (but less durable) writes.
    #[must_use]
    pub fn without_fsync(mut self) -> Self {
        self.fsync = false;
        self
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for DirStore {
    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key).is_file())
    }

    fn put(
        &self,
        key: &str,
        reader: &mut dyn Read,
        expected_len: Option<u64>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        let dst = self.object_path(key);
        let parent = dst.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| Error::Store {
            key: key.to_string(),
            reason: format!("failed to create {}: {e}", parent.display()),
        })?;

        let mut temp_file = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::Store {
            key: key.to_string(),
            reason: format!("failed to create temp file in {}: {e}", parent.display()),
        })?;

        let written = copy_with_progress(reader, temp_file.as_file_mut(), expected_len, progress)
            .map_err(|e| Error::Store {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        if self.fsync {
            temp_file.as_file().sync_all().map_err(|e| Error::Store {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        }

        temp_file.persist(&dst).map_err(|e| Error::Store {
            key: key.to_string(),
            reason: e.error.to_string(),
        })?;

        Ok(written)
    }
}

// =============================================================================
// S3 store via the aws CLI
// =============================================================================

/// Object store backed by an S3 bucket, driven through the `aws` CLI.
///
/// The resolved [`ClientConfig`] materializes as `--region`/`--profile`
/// arguments and a credential-pair environment for each child process.
#[derive(Debug, Clone)]
pub struct S3Store {
    bucket: String,
    config: ClientConfig,
}

impl S3Store {
    /// Create a store for `bucket` with the given client configuration.
    pub fn new<B: Into<String>>(bucket: B, config: ClientConfig) -> Self {
        Self {
            bucket: bucket.into(),
            config,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("aws");
        cmd.arg("--region").arg(&self.config.region);
        if let Some(profile) = &self.config.profile {
            cmd.arg("--profile").arg(profile);
        }
        // Explicit credentials take precedence over the profile at the
        // client level.
        if let Some(creds) = &self.config.credentials {
            cmd.env("AWS_ACCESS_KEY_ID", &creds.access_key)
                .env("AWS_SECRET_ACCESS_KEY", &creds.secret_key);
        }
        cmd
    }
}

/// Whether CLI stderr output describes a missing object rather than a
/// real failure.
fn is_not_found_text(stderr: &str) -> bool {
    stderr.contains("404") || stderr.contains("Not Found") || stderr.contains("NoSuchKey")
}

impl ObjectStore for S3Store {
    fn exists(&self, key: &str) -> Result<bool> {
        let output = self
            .command()
            .args(["s3api", "head-object", "--bucket"])
            .arg(&self.bucket)
            .arg("--key")
            .arg(key)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Store {
                key: key.to_string(),
                reason: format!("failed to run aws: {e}"),
            })?;

        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found_text(&stderr) {
            return Ok(false);
        }
        Err(Error::Store {
            key: key.to_string(),
            reason: format!("head-object failed: {}", stderr.trim()),
        })
    }

    fn put(
        &self,
        key: &str,
        reader: &mut dyn Read,
        expected_len: Option<u64>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        let remote = format!("s3://{}/{}", self.bucket, key);
        let mut cmd = self.command();
        cmd.args(["s3", "cp", "-"]).arg(&remote);
        if let Some(len) = expected_len {
            cmd.arg("--expected-size").arg(len.to_string());
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Store {
                key: key.to_string(),
                reason: format!("failed to run aws: {e}"),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| Error::Store {
            key: key.to_string(),
            reason: "aws child has no stdin".to_string(),
        })?;

        let copied = copy_with_progress(reader, &mut stdin, expected_len, progress);
        // Close stdin so the child sees EOF even when the copy failed.
        drop(stdin);

        let output = child.wait_with_output().map_err(|e| Error::Store {
            key: key.to_string(),
            reason: format!("failed to wait for aws: {e}"),
        })?;

        let written = copied.map_err(|e| Error::Store {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Store {
                key: key.to_string(),
                reason: format!("upload failed: {}", stderr.trim()),
            });
        }

        Ok(written)
    }
}
