//! End-to-end tests for the `satchel` binary
//!
//! Each test writes a configuration with a filesystem remote into a scratch
//! directory and drives the real executable.

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn write_config(root: &Path, dry_run: bool) -> std::path::PathBuf {
    let config = format!(
        r#"
working-dir: {root}/work
export-dir: {root}/export
status-log-dir: {root}/status
repository: rac
source-organization: Rockefeller Archive Center
dry-run: {dry_run}
manifest-algorithms: [md5, sha256]
remote-dir: incoming
remotes:
  local:
    type: filesystem
    base-dir: {root}/remote
"#,
        root = root.display(),
        dry_run = dry_run
    );
    let path = root.join("satchel.yaml");
    fs::write(&path, config).unwrap();
    path
}

fn write_payload(root: &Path) -> std::path::PathBuf {
    let source = root.join("source");
    fs::create_dir_all(source.join("letters")).unwrap();
    fs::write(source.join("letters/1950-01-02.txt"), "Dear colleague").unwrap();
    source
}

fn satchel(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_satchel"))
        .arg("--quiet")
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn deliver(config: &Path, source: &Path) -> Output {
    satchel(
        config,
        &[
            "deliver",
            "--source",
            source.to_str().unwrap(),
            "--object-id",
            "5494124",
            "--title",
            "Correspondence, 1950",
        ],
    )
}

#[test]
fn test_deliver_to_filesystem_remote() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), false);
    let source = write_payload(temp.path());

    let output = deliver(&config, &source);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(temp.path().join("remote/incoming/rac.5494124.tar").is_file());

    let output = satchel(&config, &["status", "--identifier", "rac.5494124", "--json"]);
    assert!(output.status.success());
    let events: Value = serde_json::from_slice(&output.stdout).unwrap();
    let statuses: Vec<&str> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses.first(), Some(&"bagging"));
    assert_eq!(statuses.last(), Some(&"deposited"));
}

#[test]
fn test_dry_run_then_latest_status() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), true);
    let source = write_payload(temp.path());

    assert!(deliver(&config, &source).status.success());
    assert!(temp.path().join("export/rac.5494124.tar").is_file());
    assert!(!temp.path().join("remote").exists());

    let output = satchel(&config, &["status", "--json"]);
    let latest: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(latest.as_array().unwrap().len(), 1);
    assert_eq!(latest[0]["status"], "deposit_skipped");
    assert_eq!(latest[0]["note"], "dry run");
}

#[test]
fn test_pending_lists_only_unfinished_bags() {
    let temp = TempDir::new().unwrap();

    let dry = write_config(temp.path(), true);
    let source = write_payload(temp.path());
    assert!(deliver(&dry, &source).status.success());
    let output = satchel(&dry, &["status", "--pending", "--json"]);
    assert!(output.status.success());
    let pending: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(pending.as_array().unwrap().is_empty());

    let live = write_config(temp.path(), false);
    assert!(deliver(&live, &source).status.success());
    let output = satchel(&live, &["status", "--pending", "--json"]);
    let pending: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["status"], "deposited");
}

#[test]
fn test_validate_rejects_plain_directory() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), true);
    let not_a_bag = write_payload(temp.path());

    let output = satchel(&config, &["validate", not_a_bag.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a valid bag"));
}

#[test]
fn test_verify_requires_ingest_section() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), false);

    let output = satchel(&config, &["verify"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No ingest API configured"));
}
