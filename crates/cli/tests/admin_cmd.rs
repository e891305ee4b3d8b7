use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;

#[allow(deprecated)]
fn fedifinder() -> Command {
    Command::cargo_bin("fedifinder").expect("binary")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json on stdout")
}

/// A store file with one row of each failure class next to a healthy one:
/// a permanent HTTP failure, a transient timeout at the retry ceiling, and
/// a redirect-exhausted row that never reached a verdict.
fn seeded_store(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("instances.json");
    let body = json!({
        "schema_version": 1,
        "instances": {
            "vis.social": {
                "domain": "vis.social",
                "part_of_fediverse": true,
                "software_name": "mastodon",
                "software_version": "4.2.1",
                "users_total": 100,
                "retries": 0
            },
            "google.com": {
                "domain": "google.com",
                "part_of_fediverse": false,
                "status": 404,
                "retries": 1
            },
            "slow.example": {
                "domain": "slow.example",
                "part_of_fediverse": false,
                "status": "timeout",
                "retries": 5
            },
            "loopy.example": {
                "domain": "loopy.example",
                "status": "too_many_redirects",
                "retries": 1
            }
        }
    });
    fs::write(&path, body.to_string()).unwrap();
    path
}

#[test]
fn cleanup_sweeps_every_failure_class() {
    let dir = TempDir::new().unwrap();
    let path = seeded_store(&dir);

    let output = fedifinder()
        .args(["cleanup", "--store"])
        .arg(&path)
        .output()
        .expect("command run");

    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["evicted_failed"], 1);
    assert_eq!(summary["evicted_transient"], 1);
    assert_eq!(summary["evicted_unresolved"], 1);

    let remaining: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(remaining["instances"]["vis.social"].is_object());
    assert!(remaining["instances"]["google.com"].is_null());
    assert!(remaining["instances"]["slow.example"].is_null());
    assert!(remaining["instances"]["loopy.example"].is_null());
}

#[test]
fn cleanup_of_a_missing_store_sweeps_nothing() {
    let dir = TempDir::new().unwrap();

    let output = fedifinder()
        .args(["cleanup", "--store"])
        .arg(dir.path().join("absent.json"))
        .output()
        .expect("command run");

    assert!(output.status.success());
    let summary = stdout_json(&output);
    assert_eq!(summary["evicted_failed"], 0);
    assert_eq!(summary["evicted_transient"], 0);
    assert_eq!(summary["evicted_unresolved"], 0);
}

#[test]
fn export_snapshot_keeps_only_federated_rows() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let out = dir.path().join("known_instances.json");

    let output = fedifinder()
        .args(["export-snapshot", "--store"])
        .arg(&store)
        .arg("--out")
        .arg(&out)
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["written"], 1);

    let snapshot: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(snapshot["vis.social"]["software_name"], "mastodon");
    assert!(snapshot["google.com"].is_null());
    assert!(snapshot["slow.example"].is_null());
    assert!(snapshot["loopy.example"].is_null());
}

#[test]
fn check_rejects_a_malformed_domain() {
    fedifinder()
        .args(["check", "not a domain"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid domain"));
}

#[test]
fn check_rejects_a_malformed_handle() {
    fedifinder()
        .args(["check", "vis.social", "--handle", "@broken"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid handle"));
}

#[test]
fn check_falls_back_to_the_handle_host() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let output = fedifinder()
        .args(["check", "--handle", "@luca@vis.social", "--store"])
        .arg(&store)
        .output()
        .expect("command run");

    assert!(output.status.success());
    let record = stdout_json(&output);
    assert_eq!(record["domain"], "vis.social");
    assert_eq!(record["part_of_fediverse"], true);
    assert_eq!(record["software_name"], "mastodon");
}
