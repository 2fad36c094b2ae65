use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect()
}

#[test]
fn open_text_emits_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let file = temp.path().join("a.txt");
    fs::write(&file, "hello\nworld\n").unwrap();

    let output = cargo_bin_cmd!("docshell-cli")
        .arg("open")
        .arg(&file)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let values = json_lines(&output);
    assert_eq!(values.len(), 1);
    assert_eq!(values[0]["kind"], "text");
    assert_eq!(values[0]["status"], "ready");
    assert_eq!(values[0]["title"], "a.txt");
    assert_eq!(values[0]["lines"], 2);
    assert!(values[0]["error"].is_null());
}

#[test]
fn open_markdown_and_text_in_order() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let notes = temp.path().join("notes.md");
    let plain = temp.path().join("plain.txt");
    fs::write(&notes, "# Notes").unwrap();
    fs::write(&plain, "x").unwrap();

    let output = cargo_bin_cmd!("docshell-cli")
        .arg("open")
        .arg(&notes)
        .arg(&plain)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let values = json_lines(&output);
    assert_eq!(values.len(), 2);
    assert_eq!(values[0]["kind"], "markdown");
    assert_eq!(values[1]["kind"], "text");
}

#[test]
fn open_missing_file_reports_inline_error_and_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let missing = temp.path().join("missing.txt");

    cargo_bin_cmd!("docshell-cli")
        .arg("open")
        .arg(&missing)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\":\"failed\""))
        .stdout(predicate::str::contains("file not found"))
        .stderr(predicate::str::contains("failed to open 1 of 1 files"));
}

#[test]
fn open_pdf_without_backend_is_rejected() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = temp.path().join("report.pdf");
    fs::write(&pdf, b"%PDF-1.7").unwrap();

    cargo_bin_cmd!("docshell-cli")
        .arg("open")
        .arg(&pdf)
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"kind\":\"paged\""))
        .stdout(predicate::str::contains("no paged render backend"));
}

#[test]
fn config_prints_defaults() {
    let output = cargo_bin_cmd!("docshell-cli")
        .arg("config")
        .env_remove("DOCSHELL_SCROLL_IDLE_MS")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["debounce_interval_ms"], 300);
    assert_eq!(value["scroll_idle_ms"], 200);
    assert_eq!(value["memory_ceiling_mb"], 500);
}

#[test]
fn config_honours_file_and_env() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let settings = temp.path().join("docshell.toml");
    fs::write(&settings, "memory_ceiling_mb = 64\n").unwrap();

    let output = cargo_bin_cmd!("docshell-cli")
        .arg("--config")
        .arg(&settings)
        .arg("config")
        .env("DOCSHELL_SCROLL_IDLE_MS", "120")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["memory_ceiling_mb"], 64);
    assert_eq!(value["scroll_idle_ms"], 120);
}

#[test]
fn invalid_settings_fail_fast() {
    cargo_bin_cmd!("docshell-cli")
        .arg("config")
        .env("DOCSHELL_SWEEP_INTERVAL_MS", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("sweep_interval_ms"));
}
