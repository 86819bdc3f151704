//! Integration tests for the `ecos` binary.
//!
//! Argument parsing, offline protocol tools and config handling; none of
//! them needs a command station.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// `ecos` with config lookups pointed at a nonexistent directory and no
/// `ECOS_*` overrides leaking in from the environment.
fn ecos_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ecos");
    cmd.env("HOME", "/tmp/ecos-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/ecos-cli-test-nonexistent")
        .env_remove("ECOS_CONFIG")
        .env_remove("ECOS_LOG_LEVEL")
        .env_remove("ECOS_STATION__HOST")
        .env_remove("ECOS_STATION__PORT")
        .env_remove("RUST_LOG");
    cmd
}

const CAPTURE: &str = "\
<REPLY get(1, info, status)>\r\n\
1 status[GO]\r\n\
1 ProtocolVersion[0.5]\r\n\
<END 0 (OK)>\r\n\
<REPLY queryObjects(10, addr, name, protocol)>\r\n\
1000 addr[3] name[\"BR 89\"] protocol[DCC28]\r\n\
<END 0 (OK)>\r\n";

// ── Basic invocation ────────────────────────────────────────────────

/// stdout + stderr, for messages whose stream clap decides.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

#[test]
fn no_args_shows_help() {
    let output = ecos_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    ecos_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("listen")
            .and(predicate::str::contains("parse"))
            .and(predicate::str::contains("encode"))
            .and(predicate::str::contains("decode")),
    );
}

#[test]
fn completions_bash() {
    ecos_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── parse ───────────────────────────────────────────────────────────

#[test]
fn parse_prints_snapshot_json() {
    let output = ecos_cmd()
        .args(["parse", "-"])
        .write_stdin(CAPTURE)
        .output()
        .unwrap();
    assert!(output.status.success());

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["ecosbase"][0]["status"], "GO");
    assert_eq!(doc["locomotives"][0]["objectId"], 1000);
    assert_eq!(doc["locomotives"][0]["name"], "BR 89");
    assert_eq!(doc["feedbacks"], serde_json::json!([]));
}

#[test]
fn parse_reads_capture_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.txt");
    std::fs::write(&path, CAPTURE).unwrap();

    ecos_cmd()
        .args(["parse", "-o", "plain"])
        .arg(&path)
        .assert()
        .success()
        .stdout("1\n1000\n");
}

#[test]
fn parse_lists_queued_commands() {
    ecos_cmd()
        .args(["parse", "--commands", "-o", "plain", "-"])
        .write_stdin(CAPTURE)
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("get(1000, speed, speedstep")
                .and(predicate::str::contains("request(1000, view)")),
        );
}

#[test]
fn parse_missing_file_fails() {
    ecos_cmd()
        .args(["parse", "/tmp/ecos-cli-test-nonexistent/none.txt"])
        .assert()
        .code(1);
}

// ── encode / decode ─────────────────────────────────────────────────

#[test]
fn encode_then_decode() {
    let output = ecos_cmd()
        .args(["encode", "request(1000, control, force)", "set(1000, speed[20])"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let batch = String::from_utf8(output.stdout).unwrap();

    ecos_cmd()
        .args(["decode", "-o", "plain", batch.trim()])
        .assert()
        .success()
        .stdout("request(1000, control, force)\nset(1000, speed[20])\n");
}

#[test]
fn encode_rejects_non_commands() {
    ecos_cmd()
        .args(["encode", "hello"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a protocol command"));
}

#[test]
fn decode_rejects_garbage() {
    ecos_cmd().args(["decode", "%%%"]).assert().code(2);
}

// ── config ──────────────────────────────────────────────────────────

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ecos.toml");

    ecos_cmd()
        .args(["config", "init", "--host", "10.1.1.1", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    ecos_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .code(3);

    ecos_cmd()
        .args(["config", "show", "--port", "15000", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("host = \"10.1.1.1\"")
                .and(predicate::str::contains("port = 15000")),
        );
}

#[test]
fn config_show_rejects_empty_host() {
    ecos_cmd()
        .args(["config", "show", "--host", " "])
        .assert()
        .code(3);
}
