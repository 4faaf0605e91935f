//! Staging-directory spool for in-flight artifacts.
//!
//! The source URL yields a one-shot stream, but a destination store may
//! need to read an object more than once (chunking, internal retry).
//! [`Spool`] bridges the two: the stream is written once into a temp file
//! under the job's staging directory, and the store reads the file as many
//! times as it likes via [`Spool::reader`]. Per-task memory stays bounded
//! by the copy buffer, not the artifact size; the file is removed when the
//! spool is dropped.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// A fully spooled artifact, re-readable any number of times.
#[derive(Debug)]
pub struct Spool {
    file: NamedTempFile,
    len: u64,
}

impl Spool {
    /// Drain `reader` into a temp file under `staging_dir`.
    pub fn capture<R: Read + ?Sized>(reader: &mut R, staging_dir: &Path) -> Result<Self> {
        let mut file = NamedTempFile::new_in(staging_dir).map_err(|e| Error::Spool {
            path: staging_dir.to_path_buf(),
            source: e,
        })?;

        let len = io::copy(reader, &mut file).map_err(|e| Error::Spool {
            path: staging_dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self { file, len })
    }

    /// Spooled length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the artifact was empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Open an independent read handle on the spooled bytes.
    ///
    /// Each call returns a fresh handle positioned at the start.
    pub fn reader(&self) -> io::Result<File> {
        self.file.reopen()
    }
}

/// Create the staging directory if it does not exist.
///
/// The directory is world-writable on Unix so unprivileged workers sharing
/// a host path can spool into it, matching the original tool's staging
/// semantics.
pub fn ensure_staging_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| Error::Staging {
        path: path.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777)).map_err(|e| {
            Error::Staging {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }

    Ok(())
}
