// SPDX-License-Identifier: MIT

//! End-to-end smoke tests against the compiled `codemachine` binary.
//!
//! These never spawn a real engine CLI (none is installed in the test
//! environment) — they exercise the argument surface and the precondition
//! checks that run before any step does.

use assert_cmd::Command;
use tempfile::tempdir;

fn cli() -> Command {
    Command::cargo_bin("codemachine").expect("binary built")
}

fn stdout_of(cmd: &mut Command) -> String {
    String::from_utf8_lossy(&cmd.output().expect("spawn codemachine").stdout).into_owned()
}

#[test]
fn help_shows_usage() {
    let mut cmd = cli();
    cmd.arg("--help");
    assert!(stdout_of(&mut cmd).contains("Usage:"));
}

#[test]
fn version_flag_reports_version() {
    let mut cmd = cli();
    cmd.arg("--version");
    assert!(stdout_of(&mut cmd).contains("codemachine"));
}

#[test]
fn missing_workspace_directory_fails_with_precondition_exit_code() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");

    let mut cmd = cli();
    cmd.args(["--workspace", missing.to_str().expect("utf8 path")]);
    let output = cmd.output().expect("spawn codemachine");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn missing_template_file_fails_with_generic_error_exit_code() {
    let dir = tempdir().expect("tempdir");

    let mut cmd = cli();
    cmd.args(["--workspace", dir.path().to_str().expect("utf8 path")]);
    let output = cmd.output().expect("spawn codemachine");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("template.toml"));
}
