/// CLI Integration Tests
/// Runs the real binary; `serve` exits cleanly once stdin is closed.
use assert_cmd::Command;
use predicates::prelude::*;

fn frame(body: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body)
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Debug Adapter Protocol"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dap_driver"));
}

#[test]
fn test_cli_serve_subcommand_help() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the MCP server"))
        .stdout(predicate::str::contains("--adapter-path"))
        .stdout(predicate::str::contains("--request-timeout-secs"))
        .stdout(predicate::str::contains("--log-format"));
}

#[test]
fn test_cli_no_subcommand_fails() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_rejects_unknown_log_format() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.args(["serve", "--log-format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_cli_serve_exits_on_closed_stdin() {
    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.arg("serve").write_stdin("").assert().success();
}

#[test]
fn test_cli_serve_answers_initialize_on_stdout() {
    let request = frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#);

    let mut cmd = Command::cargo_bin("dap_driver").unwrap();
    cmd.args(["serve", "--log-format", "json", "--log-level", "debug"])
        .write_stdin(request)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Content-Length: "))
        .stdout(predicate::str::contains("\"protocolVersion\":\"2024-11-05\""))
        .stderr(predicate::str::contains("\"level\":\"INFO\""));
}
