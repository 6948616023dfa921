// SPDX-License-Identifier: MIT

//! A scripted engine invocation, used by `codemachine-runtime`'s tests so
//! the Step Executor can be exercised without spawning a real subprocess.

use crate::error::AdapterError;
use crate::protocol::ParsedLine;
use tokio::sync::mpsc;

/// One scripted outcome for [`FakeEngine`].
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub lines: Vec<ParsedLine>,
    pub session_id: Option<String>,
    pub error: Option<String>,
}

impl ScriptedRun {
    pub fn ok(lines: Vec<ParsedLine>, session_id: impl Into<String>) -> Self {
        Self { lines, session_id: Some(session_id.into()), error: None }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self { lines: Vec::new(), session_id: None, error: Some(reason.into()) }
    }
}

/// Plays back a queue of [`ScriptedRun`]s in order, one per invocation,
/// standing in for [`crate::engine::run_engine`] in tests.
pub async fn play_scripted_run(
    script: ScriptedRun,
    events: mpsc::Sender<ParsedLine>,
) -> Result<crate::engine::EngineRunResult, AdapterError> {
    for line in script.lines {
        let _ = events.send(line).await;
    }
    if let Some(reason) = script.error {
        return Err(AdapterError::CapturedError(reason));
    }
    Ok(crate::engine::EngineRunResult { session_id: script.session_id, captured_error: None, exit_code: Some(0) })
}
