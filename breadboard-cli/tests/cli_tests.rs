//! CLI integration tests

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn breadboard_cli() -> Command {
    cargo_bin_cmd!("breadboard-cli")
}

/// Path to breadboard library test fixtures (relative to workspace).
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("breadboard")
        .join("tests")
        .join("fixtures")
}

#[test]
fn test_cli_help() {
    let mut cmd = breadboard_cli();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("breadboard"));
}

#[test]
fn test_cli_version() {
    let mut cmd = breadboard_cli();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_inspect_directory() {
    let mut cmd = breadboard_cli();
    cmd.arg("inspect").arg(fixtures_dir().join("devices"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("arduino_uno"))
        .stdout(predicate::str::contains("Boards"))
        .stdout(predicate::str::contains("Loaded 4 device(s), 0 failed"));
}

#[test]
fn test_cli_inspect_reports_failures() {
    let mut cmd = breadboard_cli();
    cmd.arg("inspect")
        .arg(fixtures_dir().join("devices").join("led_red.adev"))
        .arg(fixtures_dir().join("broken.adev"));
    cmd.assert()
        .failure()
        .stdout(predicate::str::contains("led_red"))
        .stderr(predicate::str::contains("broken.adev"));
}

#[test]
fn test_cli_inspect_json() {
    let mut cmd = breadboard_cli();
    cmd.arg("inspect")
        .arg(fixtures_dir().join("devices").join("push_button.adev"))
        .arg("--format")
        .arg("json");
    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["devices"][0]["id"], "push_button");
    assert_eq!(json["failures"].as_array().unwrap().len(), 0);
}

#[test]
fn test_cli_check_blink() {
    let mut cmd = breadboard_cli();
    cmd.arg("check").arg(fixtures_dir().join("blink.ino"));
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Blink: on"))
        .stdout(predicate::str::contains("Serial: Blink ready"));
}

#[test]
fn test_cli_check_empty_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.ino");
    std::fs::write(&path, "   \n").unwrap();

    let mut cmd = breadboard_cli();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no program loaded"));
}

#[test]
fn test_cli_check_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.ino");
    std::fs::write(&path, "void setup() {\n  digitalWrite(13, HIGH);\n").unwrap();

    let mut cmd = breadboard_cli();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Warning: missing loop()"))
        .stdout(predicate::str::contains("mismatched braces"))
        .stdout(predicate::str::contains("Blink: off"));
}

#[test]
fn test_cli_simulate_blink() {
    let mut cmd = breadboard_cli();
    cmd.arg("simulate")
        .arg("--devices")
        .arg(fixtures_dir().join("devices"))
        .arg("--place")
        .arg("arduino_uno")
        .arg("led_red")
        .arg("--program")
        .arg(fixtures_dir().join("blink.ino"))
        .arg("--wire")
        .arg("0:d13=1:anode")
        .arg("--ticks")
        .arg("2")
        .arg("--format")
        .arg("json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let ticks = json["ticks"].as_array().unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0]["lit"].as_array().unwrap().len(), 0);
    assert_eq!(ticks[1]["lit"].as_array().unwrap().len(), 2);
    assert_eq!(json["serial"][0], "Blink ready");
    assert!(json["wires"][0]["route"].is_array());
}

#[test]
fn test_cli_simulate_bad_wire() {
    let mut cmd = breadboard_cli();
    cmd.arg("simulate")
        .arg("--devices")
        .arg(fixtures_dir().join("devices"))
        .arg("--place")
        .arg("led_red")
        .arg("--program")
        .arg(fixtures_dir().join("blink.ino"))
        .arg("--wire")
        .arg("0:anode=3:gnd");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("instance 3"));
}

#[test]
fn test_cli_simulate_unknown_device() {
    let mut cmd = breadboard_cli();
    cmd.arg("simulate")
        .arg("--devices")
        .arg(fixtures_dir().join("devices"))
        .arg("--place")
        .arg("servo")
        .arg("--program")
        .arg(fixtures_dir().join("blink.ino"));
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown device: servo"));
}

#[test]
fn test_cli_route() {
    let mut cmd = breadboard_cli();
    cmd.arg("route").arg("0,0,right").arg("100,48,left");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(0, 0) -> "))
        .stdout(predicate::str::contains("(100, 48)"));
}

#[test]
fn test_cli_route_bad_side() {
    let mut cmd = breadboard_cli();
    cmd.arg("route").arg("0,0,up").arg("100,48,left");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unknown side"));
}
