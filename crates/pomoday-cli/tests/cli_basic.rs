//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_pomoday"))
        .args(args)
        .env("POMODAY_DATA_DIR", data_dir)
        .env_remove("POMODAY_TEST_MODE")
        .env_remove("POMODAY_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_status_json_has_snapshot_fields() {
    let dir = TempDir::new().unwrap();
    let snap = run_json(dir.path(), &["status", "--json"]);
    for field in ["revision", "namespace", "day", "session", "score", "label"] {
        assert!(snap.get(field).is_some(), "missing field {field}");
    }
    assert_eq!(snap["namespace"], "live");
    assert!(dir.path().join("config.toml").exists());
    assert!(dir.path().join("pomoday.db").exists());
}

#[test]
fn test_list_json_shows_the_default_day() {
    let dir = TempDir::new().unwrap();
    let rows = run_json(dir.path(), &["list", "--json"]);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 32);
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[0]["kind"], "focus");
    assert_eq!(rows[1]["kind"], "break");
}

#[test]
fn test_config_get_set() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "schedule.focus_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "25");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "schedule.focus_minutes", "50"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "schedule.focus_minutes"]);
    assert_eq!(stdout.trim(), "50");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "get", "schedule.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_test_mode_uses_its_own_namespace() {
    let dir = TempDir::new().unwrap();
    let snap = run_json(dir.path(), &["--test-mode", "status", "--json"]);
    assert_eq!(snap["namespace"], "test");

    let (_, stderr, code) = run_cli(dir.path(), &["--test-mode", "remove", "31"]);
    assert_eq!(code, 0, "{stderr}");

    let test_rows = run_json(dir.path(), &["--test-mode", "list", "--json"]);
    let live_rows = run_json(dir.path(), &["list", "--json"]);
    assert_eq!(test_rows.as_array().unwrap().len(), 31);
    assert_eq!(live_rows.as_array().unwrap().len(), 32);
}

#[test]
fn test_removing_a_started_interval_fails() {
    let dir = TempDir::new().unwrap();
    // The accelerated day is anchored at its start, so #1 is already running.
    let (_, stderr, code) = run_cli(dir.path(), &["--test-mode", "remove", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("locked"), "{stderr}");
}

#[test]
fn test_invalid_outcome_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["evaluate", "1", "maybe"]);
    assert_ne!(code, 0);
}

#[test]
fn test_history_starts_empty() {
    let dir = TempDir::new().unwrap();
    let days = run_json(dir.path(), &["history", "--json"]);
    assert_eq!(days, serde_json::json!([]));
}
