//! Common test utilities for integration tests.

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use serde_json::{Value, json};

/// A test fixture holding source artifacts, a manifest, a local destination
/// root, and a staging directory under one temp dir.
pub struct SyncFixture {
    pub root: TempDir,
}

impl SyncFixture {
    pub fn new() -> Self {
        let root = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir_all(root.path().join("artifacts")).expect("Failed to create artifacts dir");
        fs::create_dir_all(root.path().join("dest")).expect("Failed to create dest dir");
        Self { root }
    }

    /// Write a source artifact and return its `file://` URL.
    pub fn artifact(&self, name: &str, content: &str) -> String {
        let path = self.root.path().join("artifacts").join(name);
        fs::write(&path, content).expect("Failed to write artifact");
        format!("file://{}", path.display())
    }

    /// One backup entry for the manifest.
    pub fn backup(&self, filename: &str, url: &str, created_at: &str) -> Value {
        json!({
            "filename": filename,
            "url": url,
            "created_at": created_at,
        })
    }

    /// Write the manifest document and return its path.
    pub fn write_manifest(&self, value: &Value) -> PathBuf {
        let path = self.root.path().join("manifest.json");
        fs::write(&path, value.to_string()).expect("Failed to write manifest");
        path
    }

    /// The `--local-root` destination directory.
    pub fn local_root(&self) -> PathBuf {
        self.root.path().join("dest")
    }

    /// The `--tmp-location` staging directory.
    pub fn staging(&self) -> PathBuf {
        self.root.path().join("staging")
    }

    /// Path of one destination object under the local root.
    pub fn object(&self, bucket: &str, key: &str) -> PathBuf {
        self.local_root().join(bucket).join(key)
    }
}

impl Default for SyncFixture {
    fn default() -> Self {
        Self::new()
    }
}
