//! Integration tests for the `localgw` binary.

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn fixture_template() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../docs/fixtures/template.yaml")
        .canonicalize()
        .expect("fixture template present")
}

fn cli(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("localgw");
    cmd.current_dir(dir.path())
        .env_remove("LOCALGW_OUTPUT")
        .env_remove("LOCALGW_REGION")
        .env_remove("LOG_FORMAT")
        .env("RUST_LOG", "warn");
    cmd
}

fn project_with_fixture() -> TempDir {
    let dir = tempdir().expect("create temp dir");
    fs::copy(fixture_template(), dir.path().join("template.yaml")).expect("copy fixture");
    dir
}

#[test]
fn init_discovers_template_and_writes_config() {
    let dir = project_with_fixture();

    cli(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated mock_api/config.yaml"));

    let written = fs::read_to_string(dir.path().join("mock_api/config.yaml")).unwrap();
    assert!(written.contains("/orders"));
    assert!(written.contains("COGNITO_USER_POOLS"));
    assert!(written.contains("triggered:"));
}

#[test]
fn init_respects_output_environment() {
    let dir = project_with_fixture();

    cli(&dir)
        .env("LOCALGW_OUTPUT", "gen/api.yaml")
        .arg("init")
        .assert()
        .success();

    assert!(dir.path().join("gen/api.yaml").is_file());
    assert!(!dir.path().join("mock_api").exists());
}

#[test]
fn init_region_flows_into_pseudo_parameters() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("template.yaml"),
        "Resources:\n  Data:\n    Type: AWS::S3::Bucket\n    Properties:\n      BucketName: !Sub \"data-${AWS::Region}\"\n",
    )
    .unwrap();

    cli(&dir)
        .args(["init", "--region", "ap-south-1"])
        .assert()
        .success();

    let written = fs::read_to_string(dir.path().join("mock_api/config.yaml")).unwrap();
    assert!(written.contains("data-ap-south-1"));
}

#[test]
fn init_with_missing_template_writes_sample() {
    let dir = tempdir().unwrap();

    cli(&dir)
        .args(["init", "--template", "missing.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample configuration"))
        .stderr(predicate::str::contains("template not found"));

    let written = fs::read_to_string(dir.path().join("mock_api/config.yaml")).unwrap();
    assert!(written.contains("/hello_world"));
}

#[test]
fn init_without_any_template_is_a_no_op() {
    let dir = tempdir().unwrap();

    cli(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert!(!dir.path().join("mock_api").exists());
}

#[test]
fn init_reports_malformed_templates() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("template.yaml"), "Resources: [unclosed\n").unwrap();

    cli(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to generate"))
        .stderr(predicate::str::contains("failed to parse template"));
}

#[test]
fn routes_lists_generated_routes() {
    let dir = project_with_fixture();
    cli(&dir).arg("init").assert().success();

    cli(&dir)
        .arg("routes")
        .assert()
        .success()
        .stdout(predicate::str::contains("/orders -> list.handler (orders/, auth COGNITO_USER_POOLS)"))
        .stdout(predicate::str::contains("/health -> list.handler (orders/, auth NONE)"));
}

#[test]
fn routes_json_output_is_parseable() {
    let dir = project_with_fixture();
    cli(&dir).arg("init").assert().success();

    let output = cli(&dir)
        .args(["routes", "--format", "json"])
        .output()
        .expect("run routes");
    assert!(output.status.success());

    let routes: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let routes = routes.as_array().expect("array of routes");
    assert!(routes
        .iter()
        .any(|r| r["method"] == "POST" && r["path"] == "/orders" && r["handler"] == "create.handler"));
}

#[test]
fn routes_rejects_unknown_config_format() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "paths = {}\n").unwrap();

    cli(&dir)
        .args(["routes", "--config", "config.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read configuration"));
}
