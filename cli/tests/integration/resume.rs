//! Resume integration tests for the bkh CLI.
//!
//! Skip-on-exists is the resume mechanism: whatever an earlier (possibly
//! interrupted) run already placed at the destination is never fetched or
//! uploaded again.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use std::fs;

#[path = "../common/mod.rs"]
mod common;

use common::SyncFixture;

fn sync_cmd(fx: &SyncFixture, manifest: &std::path::Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bkh");
    cmd.arg("acme")
        .arg("--manifest")
        .arg(manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--quiet");
    cmd
}

#[test]
fn test_second_run_uploads_nothing() {
    let fx = SyncFixture::new();
    let url_a = fx.artifact("a.tar.gz", "aaa");
    let url_b = fx.artifact("b.tar.gz", "bbb");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [
                fx.backup("a.tar.gz", &url_a, "2024-03-01T12:00:00Z"),
                fx.backup("b.tar.gz", &url_b, "2024-03-01T12:00:00Z"),
            ]},
        ],
    }));

    sync_cmd(&fx, &manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 2 backups"));

    sync_cmd(&fx, &manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Nothing to sync (2 backups already exist)",
        ));
}

#[test]
fn test_pre_existing_objects_are_skipped_not_overwritten() {
    let fx = SyncFixture::new();
    let url_a = fx.artifact("a.tar.gz", "fresh a");
    let url_b = fx.artifact("b.tar.gz", "fresh b");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [
                fx.backup("a.tar.gz", &url_a, "2024-03-01T12:00:00Z"),
                fx.backup("b.tar.gz", &url_b, "2024-03-01T12:00:00Z"),
            ]},
        ],
    }));

    // Simulate an earlier partial run: one object already at the destination.
    let existing = fx.object("acme-backups", "acme/dev/a.tar.gz");
    fs::create_dir_all(existing.parent().unwrap()).unwrap();
    fs::write(&existing, "from the first run").unwrap();

    sync_cmd(&fx, &manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 uploaded, 1 skipped, 0 failed"));

    // The existing object was never touched: exists means already synced.
    assert_eq!(fs::read_to_string(&existing).unwrap(), "from the first run");
    assert_eq!(
        fs::read_to_string(fx.object("acme-backups", "acme/dev/b.tar.gz")).unwrap(),
        "fresh b"
    );
}

#[test]
fn test_resume_per_environment() {
    let fx = SyncFixture::new();
    let url_dev = fx.artifact("dev.tar.gz", "dev");
    let url_live = fx.artifact("live.tar.gz", "live");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [fx.backup("dev.tar.gz", &url_dev, "2024-03-01T12:00:00Z")]},
            {"id": "live", "backups": [fx.backup("live.tar.gz", &url_live, "2024-03-01T12:00:00Z")]},
        ],
    }));

    // First run only covered dev.
    sync_cmd(&fx, &manifest)
        .arg("--env")
        .arg("dev")
        .assert()
        .success();

    // The full run picks up live and skips dev.
    sync_cmd(&fx, &manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("dev: 0 uploaded, 1 skipped"))
        .stdout(predicate::str::contains("live: 1 uploaded, 0 skipped"));
}
