//! Output format integration tests for the bkh CLI.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};

#[path = "../common/mod.rs"]
mod common;

use common::SyncFixture;

#[test]
fn test_json_output_shape() {
    let fx = SyncFixture::new();
    let url = fx.artifact("db.tar.gz", "db bytes");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [fx.backup("db.tar.gz", &url, "2024-03-01T12:00:00Z")]},
        ],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    let output = cmd
        .arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--output")
        .arg("json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["site"], "acme");
    assert_eq!(value["uploaded"], 1);
    assert_eq!(value["skipped"], 0);
    assert_eq!(value["failed"], 0);
    assert_eq!(value["bytes_transferred"], 8);

    let environments = value["environments"].as_array().unwrap();
    assert_eq!(environments.len(), 1);
    assert_eq!(environments[0]["environment"], "dev");
    assert_eq!(environments[0]["uploaded"], 1);
    assert!(environments[0]["error"].is_null());
}

#[test]
fn test_json_output_includes_failure_detail() {
    let fx = SyncFixture::new();
    let url_bad = format!(
        "file://{}",
        fx.root.path().join("artifacts/gone.tar.gz").display()
    );

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [fx.backup("gone.tar.gz", &url_bad, "2024-03-01T12:00:00Z")]},
        ],
    }));

    let mut cmd = cargo_bin_cmd!("bkh");
    let output = cmd
        .arg("acme")
        .arg("--manifest")
        .arg(&manifest)
        .arg("--bucket")
        .arg("acme-backups")
        .arg("--local-root")
        .arg(fx.local_root())
        .arg("--tmp-location")
        .arg(fx.staging())
        .arg("--output")
        .arg("json")
        .assert()
        .failure()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["failed"], 1);

    let failures = value["environments"][0]["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["filename"], "gone.tar.gz");
    assert_eq!(failures[0]["key"], "acme/dev/gone.tar.gz");
    assert!(
        failures[0]["error"]
            .as_str()
            .unwrap()
            .contains("Failed to fetch")
    );
}

#[test]
fn test_verbose_prints_progress_lines() {
    let fx = SyncFixture::new();
    let url = fx.artifact("db.tar.gz", "some db bytes");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [fx.backup("db.tar.gz", &url, "2024-03-01T12:00:00Z")]},
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
        .arg("--verbose")
        .assert()
        .success()
        .stderr(predicate::str::contains("db.tar.gz:"))
        .stderr(predicate::str::contains("100.00%"));
}

#[test]
fn test_quiet_run_still_prints_summary() {
    let fx = SyncFixture::new();
    let url = fx.artifact("db.tar.gz", "db");

    let manifest = fx.write_manifest(&json!({
        "site": "acme",
        "environments": [
            {"id": "dev", "backups": [fx.backup("db.tar.gz", &url, "2024-03-01T12:00:00Z")]},
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
        .success()
        .stdout(predicate::str::contains("dev: 1 uploaded, 0 skipped"));
}
