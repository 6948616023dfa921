// SPDX-License-Identifier: MIT

//! The Step Executor: resolves a module step's prompt, invokes the
//! selected engine, and streams classified output onto the event bus.

use codemachine_adapters::{AdapterError, EngineRunOptions, ParsedLine};
use codemachine_core::{AgentId, Event, EventBus, MonitoringId, SessionId};
use codemachine_engine::EngineAdapter;
use codemachine_template::ModuleStep;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to read prompt file {path}: {source}")]
    PromptRead { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// One invocation of a module step against a chosen engine.
pub struct StepInvocation<'a> {
    pub step: &'a ModuleStep,
    pub engine: Arc<dyn EngineAdapter>,
    pub cwd: std::path::PathBuf,
    pub stdin_payload: Option<String>,
    pub timeout: std::time::Duration,
    pub cancel: CancellationToken,
}

/// Joins a module step's prompt files with a blank line between each, the
/// on-disk convention for a step's base prompt parts.
pub fn load_prompt(step: &ModuleStep) -> Result<String, ExecutorError> {
    let mut parts = Vec::with_capacity(step.prompt_paths.len());
    for path in &step.prompt_paths {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ExecutorError::PromptRead { path: path.clone(), source })?;
        parts.push(text);
    }
    Ok(parts.join("\n\n"))
}

/// Runs one step invocation to completion, publishing bus events as the
/// engine streams and returning the terminal session id (if any).
pub async fn execute_step(
    invocation: StepInvocation<'_>,
    agent_id: AgentId,
    monitoring_id: MonitoringId,
    bus: &EventBus,
) -> Result<codemachine_adapters::EngineRunResult, ExecutorError> {
    let prompt = match invocation.stdin_payload.clone() {
        Some(payload) => payload,
        None => load_prompt(invocation.step)?,
    };

    let options = EngineRunOptions {
        cli_binary: invocation.engine.cli_binary().to_string(),
        args: Vec::new(),
        cwd: invocation.cwd,
        env: std::collections::HashMap::new(),
        stdin_payload: Some(prompt),
        timeout: invocation.timeout,
        cancel: invocation.cancel,
    };

    let (tx, mut rx) = mpsc::channel::<ParsedLine>(256);
    let bus_clone = bus.clone();
    let mid = monitoring_id;
    let relay = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Some(event) = to_bus_event(mid, line) {
                bus_clone.publish(event);
            }
        }
    });

    let result = invocation.engine.run(options, tx).await;
    let _ = relay.await;

    if let Some(session_id) = result.as_ref().ok().and_then(|r| r.session_id.clone()) {
        bus.publish(Event::SessionRegistered {
            agent_id,
            session_id: SessionId::from_string(session_id),
            monitoring_id,
        });
    }

    Ok(result?)
}

fn to_bus_event(monitoring_id: MonitoringId, line: ParsedLine) -> Option<Event> {
    match line {
        ParsedLine::Text(text) => Some(Event::EngineLog { monitoring_id, line: text, tag: None }),
        ParsedLine::Thinking(text) => {
            Some(Event::EngineLog { monitoring_id, line: text, tag: Some("thinking".into()) })
        }
        ParsedLine::CommandStarted { tool_use_id, tool_name } => {
            Some(Event::CommandStarted { monitoring_id, tool_use_id, tool_name })
        }
        ParsedLine::CommandResult { tool_use_id, tool_name, is_error, preview } => {
            Some(Event::CommandResult { monitoring_id, tool_use_id, tool_name, is_error, preview })
        }
        ParsedLine::Telemetry(telemetry) => Some(Event::EngineTelemetry { monitoring_id, telemetry }),
        ParsedLine::SystemInit | ParsedLine::SessionId(_) => None,
        ParsedLine::CapturedError(reason) => {
            Some(Event::EngineLog { monitoring_id, line: reason, tag: Some("error".into()) })
        }
        ParsedLine::Unrecognized(text) => Some(Event::EngineLog { monitoring_id, line: text, tag: Some("raw".into()) }),
    }
}

/// Loads and filters a step's chained prompts (all turns after the first)
/// by the workflow's selected track/conditions.
pub fn filter_chained_prompts(
    prompts: &[codemachine_template::ChainedPrompt],
    selected_track: Option<&str>,
    selected_conditions: Option<&[String]>,
) -> Vec<codemachine_template::ChainedPrompt> {
    prompts
        .iter()
        .filter(|p| {
            codemachine_template::matches_track(p.track.as_ref().map(std::slice::from_ref), selected_track)
                && codemachine_template::matches_conditions(p.conditions.as_deref(), selected_conditions)
        })
        .cloned()
        .collect()
}

pub fn prompt_dir_exists(path: &Path) -> bool {
    path.exists() && path.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemachine_template::ChainedPrompt;

    fn prompt(track: Option<&str>) -> ChainedPrompt {
        ChainedPrompt {
            name: "p".into(),
            label: "P".into(),
            content: "do it".into(),
            conditions: None,
            track: track.map(str::to_string),
        }
    }

    #[test]
    fn filters_chained_prompts_by_track() {
        let prompts = vec![prompt(Some("fast")), prompt(Some("slow")), prompt(None)];
        let filtered = filter_chained_prompts(&prompts, Some("fast"), None);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn load_prompt_joins_parts_with_blank_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "first").expect("write a");
        std::fs::write(&b, "second").expect("write b");
        let step = ModuleStep {
            agent_id: AgentId::new(),
            name: "s".into(),
            engine_override: None,
            model: None,
            tracks: None,
            conditions: None,
            execute_once: false,
            interactive: None,
            prompt_paths: vec![a, b],
            chained_prompts_path: None,
        };
        let joined = load_prompt(&step).expect("joins");
        assert_eq!(joined, "first\n\nsecond");
    }
}
