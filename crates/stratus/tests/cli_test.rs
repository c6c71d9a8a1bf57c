#![allow(deprecated)] // TODO: move from Command::cargo_bin to the cargo_bin_cmd! macro

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const DEFINITION: &str = r#"
project "cli-demo"

engine {
    poll-interval "10ms"
    timeout "5s"
}

backend "azure" {
    location "westeurope"
}

resource "bucket" "assets" {
    backend "azure"
}

resource "network" "core" {
    backend "gcp"
    cidr-block "10.1.0.0/16"
}

resource "bucket" "Logs_Archive" {
    backend "aws"
}
"#;

fn project(definition: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("stratus.kdl"), definition).unwrap();
    dir
}

fn stratus(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stratus").unwrap();
    cmd.current_dir(dir)
        .env_remove("STRATUS_CONFIG_PATH")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Help lists every command
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("stratus").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("state"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("stratus").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stratus"));
}

#[test]
fn test_apply_help() {
    let mut cmd = Command::cargo_bin("stratus").unwrap();
    cmd.arg("apply")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--simulate"))
        .stdout(predicate::str::contains("[RESOURCE]"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("stratus").unwrap();
    cmd.arg("provision").assert().failure();
}

#[test]
fn test_missing_definition_fails() {
    let dir = TempDir::new().unwrap();
    stratus(dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env("HOME", dir.path())
        .arg("plan")
        .assert()
        .failure();
}

/// Plan needs no credentials and shows each chain
#[test]
fn test_plan_shows_chains() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("bucket"))
        .stdout(predicate::str::contains("resource-group"))
        .stdout(predicate::str::contains("storage-account"))
        .stdout(predicate::str::contains("+ create"))
        .stdout(predicate::str::contains("Plan complete"));
}

#[test]
fn test_plan_single_resource() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["plan", "network:core"])
        .assert()
        .success()
        .stdout(predicate::str::contains("core"))
        .stdout(predicate::str::contains("assets").not());
}

#[test]
fn test_plan_unknown_resource_fails() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["plan", "nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not declared"));
}

/// Kinds an adapter cannot provision fail before any backend call
#[test]
fn test_plan_unsupported_kind_fails() {
    let dir = project(
        r#"
resource "load-balancer" "edge" {
    backend "gcp"
}
"#,
    );
    stratus(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be planned"));
}

#[test]
fn test_config_flag() {
    let dir = project(DEFINITION);
    let other = TempDir::new().unwrap();
    stratus(other.path())
        .arg("--config")
        .arg(dir.path().join("stratus.kdl"))
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("assets"));
}

/// Simulation provisions everything in memory and leaves state untouched
#[test]
fn test_apply_simulate() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["apply", "--simulate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulating"))
        .stdout(predicate::str::contains("3 resource(s) changed"))
        .stdout(predicate::str::contains("logs_archive"));

    assert!(!dir.path().join(".stratus").join("state.json").exists());
}

#[test]
fn test_state_list_empty() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources in state"));
}

#[test]
fn test_state_show_missing_fails() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["state", "show", "bucket:assets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in state"));
}

#[test]
fn test_destroy_empty_state() {
    let dir = project(DEFINITION);
    stratus(dir.path())
        .args(["destroy", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources in state"));
}

#[test]
fn test_invalid_definition_fails() {
    let dir = project(
        r#"
resource "spaceship" "x" {
    backend "aws"
}
"#,
    );
    stratus(dir.path()).arg("plan").assert().failure();
}
