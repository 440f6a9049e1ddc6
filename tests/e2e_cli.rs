//! CLI end-to-end tests
//!
//! Tests for the dracin command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the dracin binary
#[allow(deprecated)]
fn dracin_cmd() -> Command {
    Command::cargo_bin("dracin").unwrap()
}

/// Write a config whose state file lives in `dir`.
fn config_with_store(dir: &TempDir) -> (PathBuf, PathBuf) {
    let state = dir.path().join("state.json");
    let config = dir.path().join("dracin.toml");
    fs::write(
        &config,
        format!(
            "[server]\nport = 9090\n\n[store]\npath = {:?}\n",
            state.to_string_lossy()
        ),
    )
    .unwrap();
    (config, state)
}

fn read_state(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = dracin_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = dracin_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dracin"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = dracin_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "dracin {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_start_help() {
    let mut cmd = dracin_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the gateway server"));
}

#[test]
fn test_cli_validate_config() {
    let dir = tempdir().unwrap();
    let (config, _) = config_with_store(&dir);

    let mut cmd = dracin_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("Server: 0.0.0.0:9090"))
        .stdout(predicate::str::contains("Providers: 4 (4 enabled)"));
}

#[test]
fn test_cli_validate_rejects_unknown_default() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "default_provider = \"api_nowhere\"\n").unwrap();

    let mut cmd = dracin_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the provider table"));
}

#[test]
fn test_cli_validate_missing_file() {
    let mut cmd = dracin_cmd();
    cmd.args(["validate", "/nonexistent/dracin.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_cli_providers_json() {
    let dir = tempdir().unwrap();
    let (config, _) = config_with_store(&dir);

    let output = dracin_cmd()
        .arg("--config")
        .arg(&config)
        .args(["providers", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let providers: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = providers
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert_eq!(ids, ["api_primary", "api_secondary", "api_backup1", "api_backup2"]);
}

#[test]
fn test_cli_switch_persists_choice() {
    let dir = tempdir().unwrap();
    let (config, state) = config_with_store(&dir);

    let mut cmd = dracin_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["switch", "api_backup1", "--reason", "secondary down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api_secondary -> api_backup1"));

    let stored = read_state(&state);
    assert_eq!(stored["config"]["activeApiId"], "api_backup1");
    assert_eq!(stored["config"]["switchHistory"][0]["reason"], "secondary down");
    assert_eq!(stored["config"]["switchHistory"][0]["triggeredBy"], "admin");

    let mut cmd = dracin_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("providers")
        .assert()
        .success()
        .stdout(predicate::str::contains("* api_backup1"));
}

#[test]
fn test_cli_switch_to_active_is_a_no_op() {
    let dir = tempdir().unwrap();
    let (config, state) = config_with_store(&dir);

    let mut cmd = dracin_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["switch", "api_secondary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already the active provider"));
    assert!(!state.exists());
}

#[test]
fn test_cli_switch_unknown_provider() {
    let dir = tempdir().unwrap();
    let (config, _) = config_with_store(&dir);

    let mut cmd = dracin_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["switch", "api_nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown provider"));
}

#[test]
fn test_cli_switch_requires_store() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("dracin.toml");
    fs::write(&config, "[server]\nport = 9090\n").unwrap();

    let mut cmd = dracin_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["switch", "api_primary"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("requires [store] path"));
}
