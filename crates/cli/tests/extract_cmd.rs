use assert_cmd::Command;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

#[allow(deprecated)]
fn fedifinder() -> Command {
    Command::cargo_bin("fedifinder").expect("binary")
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json on stdout")
}

#[test]
fn extract_prints_the_canonical_handle_list() {
    let output = fedifinder()
        .args([
            "extract",
            "fedi @luca@lucahammer.com http://vis.social/web/@Luca/ http://det.social/@luca",
        ])
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output),
        json!(["@luca@lucahammer.com", "@luca@vis.social", "@luca@det.social"])
    );
}

#[test]
fn blocked_addresses_never_reach_stdout() {
    let output = fedifinder()
        .args(["extract", "mail me at contact@example.org or user@gmail.com"])
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output), json!([]));
}

#[test]
fn extract_scans_stdin_when_no_text_is_given() {
    let output = fedifinder()
        .arg("extract")
        .write_stdin("ping @pv@botsin.space sometime")
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output), json!(["@pv@botsin.space"]));
}

#[test]
fn extract_reads_the_file_argument() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bio.txt");
    fs::write(&path, "elsewhere: @luca@vis.social\n").unwrap();

    let output = fedifinder()
        .args(["extract", "--file"])
        .arg(&path)
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert_eq!(stdout_json(&output), json!(["@luca@vis.social"]));
}

#[test]
fn resolve_without_handles_exits_clean_and_silent() {
    let output = fedifinder()
        .args(["resolve", "just words, no handles here."])
        .output()
        .expect("command run");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}
