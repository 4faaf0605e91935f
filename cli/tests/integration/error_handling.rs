//! Error handling integration tests for the bkh CLI.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use std::fs;

#[path = "../common/mod.rs"]
mod common;

use common::SyncFixture;

#[test]
fn test_missing_manifest_is_invalid_input() {
    let fx = SyncFixture::new();

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(fx.root.path().join("does-not-exist.json"))
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--quiet")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error[invalid_input]"))
        .stderr(predicate::str::contains("Failed to read manifest"));
}

#[test]
fn test_malformed_manifest_is_invalid_input() {
    let fx = SyncFixture::new();
    let manifest = fx.root.path().join("manifest.json");
    fs::write(&manifest, "{ not json").unwrap();

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--quiet")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse manifest"));
}

#[test]
fn test_manifest_for_other_site_is_rejected() {
    let fx = SyncFixture::new();
    let manifest = fx.write_manifest(&json!({
        "site": "other-site",
        "environments": [{"id": "dev", "backups": []}],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--quiet")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("other-site"));
}

#[test]
fn test_invalid_after_timestamp() {
    let fx = SyncFixture::new();
    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [{"id": "dev", "backups": []}],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--after")
        .arg("last tuesday")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--quiet")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Invalid --after timestamp"));
}

#[test]
fn test_empty_manifest_has_no_environments() {
    let fx = SyncFixture::new();
    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--quiet")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[no_environments]"))
        .stderr(predicate::str::contains("has no environments"));
}

#[test]
fn test_one_bad_source_still_syncs_the_rest() {
    let fx = SyncFixture::new();
    let url_good = fx.artifact("good.tar.gz", "good bytes");
    let url_bad = format!(
        "file://{}",
        fx.root.path().join("artifacts/missing.tar.gz").display()
    );

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [
                fx.backup("good.tar.gz", &url_good, "2024-03-01T12:00:00Z"),
                fx.backup("missing.tar.gz", &url_bad, "2024-03-01T12:00:00Z"),
            ]},
        ],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--quiet")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("1 uploaded, 0 skipped, 1 failed"))
        .stdout(predicate::str::contains("missing.tar.gz"))
        .stderr(predicate::str::contains("error[partial_failure]"));

    // The failure did not block its sibling.
    assert!(fx.object("acme-backups", "acme/dev/good.tar.gz").exists());
}

#[test]
fn test_unknown_environment_is_a_listing_failure() {
    let fx = SyncFixture::new();
    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [{"id": "dev", "backups": []}],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--env")
        .arg("staging")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--quiet")
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("staging: listing failed"))
        .stderr(predicate::str::contains("error[partial_failure]"));
}

#[test]
fn test_blank_region_is_a_configuration_error() {
    let fx = SyncFixture::new();
    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [{"id": "dev", "backups": []}],
    }));

    // No --local-root: the S3 store path resolves the client configuration
    // up front and must reject the blank region before anything runs.
    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--region")
        .arg("")
        .arg("--quiet")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error[configuration]"))
        .stderr(predicate::str::contains("Invalid client configuration"));
}
