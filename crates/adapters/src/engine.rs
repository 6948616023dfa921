// SPDX-License-Identifier: MIT

//! Spawns an engine CLI, streams its stdout, classifies each line, and
//! surfaces the result to the Step Executor.

use crate::error::AdapterError;
use crate::normalize::normalize_lines;
use crate::protocol::{classify_line, ParsedLine, ToolNameTracker};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default agent invocation timeout (30 minutes), overridden by
/// `CODEMACHINE_AGENT_TIMEOUT` (milliseconds) or a per-call override.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Grace period between SIGTERM and SIGKILL when a cancellation fires.
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineRunOptions {
    pub cli_binary: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub stdin_payload: Option<String>,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl EngineRunOptions {
    pub fn new(cli_binary: impl Into<String>, cwd: PathBuf) -> Self {
        Self {
            cli_binary: cli_binary.into(),
            args: Vec::new(),
            cwd,
            env: HashMap::new(),
            stdin_payload: None,
            timeout: DEFAULT_AGENT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct EngineRunResult {
    pub session_id: Option<String>,
    pub captured_error: Option<String>,
    pub exit_code: Option<i32>,
}

/// Spawns `options.cli_binary`, forwarding each classified stdout line on
/// `events` as it streams, and returns the terminal outcome.
///
/// A captured error (from a `result`/`assistant` line) always takes
/// precedence over a non-zero exit code. `ENOENT` is reported as
/// [`AdapterError::NotInstalled`] with a localized install hint.
pub async fn run_engine(
    options: EngineRunOptions,
    events: mpsc::Sender<ParsedLine>,
) -> Result<EngineRunResult, AdapterError> {
    let mut command = Command::new(&options.cli_binary);
    command
        .args(&options.args)
        .current_dir(&options.cwd)
        .envs(&options.env)
        .stdin(if options.stdin_payload.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(AdapterError::NotInstalled {
                binary: options.cli_binary.clone(),
                install_hint: format!("run the install command for {} and retry", options.cli_binary),
            });
        }
        Err(err) => return Err(AdapterError::Spawn(err)),
    };

    if let Some(payload) = &options.stdin_payload {
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(payload.as_bytes()).await;
        }
    }

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");

    let mut result = EngineRunResult::default();
    let mut tracker = ToolNameTracker::new();
    let mut stdout_lines = BufReader::new(stdout).lines();
    let mut stderr_lines = BufReader::new(stderr).lines();

    let outcome = tokio::select! {
        outcome = drain(&mut stdout_lines, &mut stderr_lines, &mut tracker, &events, &mut result) => outcome,
        _ = tokio::time::sleep(options.timeout) => Err(AdapterError::Timeout(options.timeout)),
        _ = options.cancel.cancelled() => Err(AdapterError::Aborted),
    };

    if outcome.is_err() {
        terminate(&mut child).await;
        return outcome.map(|_| result);
    }

    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => return Err(AdapterError::Spawn(err)),
    };
    result.exit_code = status.code();

    if let Some(error) = result.captured_error.clone() {
        return Err(AdapterError::CapturedError(error));
    }
    if !status.success() {
        return Err(AdapterError::NonZeroExit(status.code().unwrap_or(-1)));
    }
    Ok(result)
}

async fn drain(
    stdout_lines: &mut tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    stderr_lines: &mut tokio::io::Lines<BufReader<tokio::process::ChildStderr>>,
    tracker: &mut ToolNameTracker,
    events: &mpsc::Sender<ParsedLine>,
    result: &mut EngineRunResult,
) -> Result<(), AdapterError> {
    loop {
        tokio::select! {
            line = stdout_lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        for normalized in normalize_lines(&raw) {
                            if normalized.is_empty() {
                                continue;
                            }
                            let parsed = classify_line(&normalized, tracker);
                            match &parsed {
                                ParsedLine::SessionId(id) if result.session_id.is_none() => {
                                    result.session_id = Some(id.clone());
                                }
                                ParsedLine::CapturedError(reason) => {
                                    result.captured_error = Some(reason.clone());
                                }
                                _ => {}
                            }
                            let _ = events.send(parsed).await;
                        }
                    }
                    Ok(None) => return Ok(()),
                    Err(err) => return Err(AdapterError::Spawn(err)),
                }
            }
            line = stderr_lines.next_line() => {
                if let Ok(Some(raw)) = line {
                    let _ = events.send(ParsedLine::Unrecognized(raw)).await;
                }
            }
        }
    }
}

/// Gives the child a grace period to exit on its own (e.g. after the
/// caller drops its own handle to the subprocess's stdin) before force-
/// killing it. `tokio::process::Child::kill` is a hard kill on every
/// platform; a cooperative SIGTERM would need `unsafe` libc bindings this
/// workspace forbids, so the grace period is the only softening available.
async fn terminate(child: &mut tokio::process::Child) {
    if tokio::time::timeout(KILL_GRACE_PERIOD, child.wait()).await.is_ok() {
        return;
    }
    let _ = child.kill().await;
}

pub fn now() -> SystemTime {
    SystemTime::now()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn streams_session_id_and_succeeds_on_clean_exit() {
        let mut options = EngineRunOptions::new(
            "sh",
            std::env::temp_dir(),
        );
        options.args = vec![
            "-c".into(),
            r#"echo '{"session_id": "sess-test-1"}'; echo '{"type": "result", "usage": {"input_tokens": 1}}'"#.into(),
        ];

        let (tx, mut rx) = mpsc::channel(16);
        let result = run_engine(options, tx).await.expect("engine run succeeds");
        assert_eq!(result.session_id.as_deref(), Some("sess-test-1"));

        let mut saw_telemetry = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ParsedLine::Telemetry(_)) {
                saw_telemetry = true;
            }
        }
        assert!(saw_telemetry);
    }

    #[tokio::test]
    async fn missing_binary_reports_not_installed() {
        let options = EngineRunOptions::new("codemachine-definitely-not-a-real-binary", std::env::temp_dir());
        let (tx, _rx) = mpsc::channel(16);
        let err = run_engine(options, tx).await.expect_err("binary is missing");
        assert!(matches!(err, AdapterError::NotInstalled { .. }));
    }

    #[tokio::test]
    async fn captured_error_takes_precedence_over_exit_code() {
        let mut options = EngineRunOptions::new("sh", std::env::temp_dir());
        options.args = vec![
            "-c".into(),
            r#"echo '{"type": "result", "is_error": true, "result": "boom"}'; exit 0"#.into(),
        ];
        let (tx, _rx) = mpsc::channel(16);
        let err = run_engine(options, tx).await.expect_err("captured error wins");
        assert!(matches!(err, AdapterError::CapturedError(reason) if reason == "boom"));
    }
}
