// SPDX-License-Identifier: MIT

//! Parses and classifies lines of the engine's streaming-JSON protocol.
//!
//! Each stdout line is either a `{type: "assistant"|"user"|"system"|
//! "result", ...}` envelope or an alternative `{role, content, tool_calls}`
//! shape with equivalent semantics. Both are normalized to [`ParsedLine`].

use codemachine_core::ParsedTelemetry;
use serde_json::Value;
use std::collections::HashMap;

/// One classified stdout line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Text(String),
    Thinking(String),
    CommandStarted { tool_use_id: String, tool_name: String },
    CommandResult { tool_use_id: String, tool_name: String, is_error: bool, preview: String },
    SystemInit,
    Telemetry(ParsedTelemetry),
    SessionId(String),
    /// `result` with `is_error: true`, or an `assistant` line with an
    /// `error` field. Takes precedence over the process exit code.
    CapturedError(String),
    /// Not valid JSON, or JSON with no recognized shape; passed through as
    /// a raw log line.
    Unrecognized(String),
}

/// Tracks `tool_use_id -> tool_name` across a single invocation so a
/// subsequent `user`/tool-result line can resolve the name that issued it.
#[derive(Debug, Default)]
pub struct ToolNameTracker {
    names: HashMap<String, String>,
}

impl ToolNameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tool_use_id: &str, tool_name: &str) {
        self.names.insert(tool_use_id.to_string(), tool_name.to_string());
    }

    pub fn resolve_and_clear(&mut self, tool_use_id: &str) -> String {
        self.names.remove(tool_use_id).unwrap_or_else(|| "tool".to_string())
    }
}

/// Parses and classifies one normalized stdout line, tracking tool-name
/// context across calls via `tracker`.
pub fn classify_line(line: &str, tracker: &mut ToolNameTracker) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ParsedLine::Unrecognized(String::new());
    }

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return ParsedLine::Unrecognized(line.to_string()),
    };

    // `type` is checked first so a line carrying both a recognized type and
    // a `session_id` (e.g. a combined `result` line) still reaches its
    // per-type classifier instead of being swallowed as a bare session id.
    match value.get("type").and_then(Value::as_str) {
        Some("assistant") => classify_assistant(&value, tracker),
        Some("user") => classify_user(&value, tracker),
        Some("system") if value.get("subtype").and_then(Value::as_str) == Some("init") => {
            ParsedLine::SystemInit
        }
        Some("result") => classify_result(&value),
        _ => {
            if let Some(session_id) = value.get("session_id").and_then(Value::as_str) {
                return ParsedLine::SessionId(session_id.to_string());
            }
            classify_role_shape(&value, tracker).unwrap_or(ParsedLine::Unrecognized(line.to_string()))
        }
    }
}

fn classify_assistant(value: &Value, tracker: &mut ToolNameTracker) -> ParsedLine {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return ParsedLine::CapturedError(error.to_string());
    }

    let blocks = value
        .pointer("/message/content")
        .or_else(|| value.get("content"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for block in &blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or("tool").to_string();
                tracker.record(&id, &name);
                return ParsedLine::CommandStarted { tool_use_id: id, tool_name: name };
            }
            Some("thinking") => {
                let text = block.get("thinking").and_then(Value::as_str).unwrap_or_default();
                return ParsedLine::Thinking(text.to_string());
            }
            Some("text") => {
                let text = block.get("text").and_then(Value::as_str).unwrap_or_default();
                return ParsedLine::Text(text.to_string());
            }
            _ => continue,
        }
    }

    ParsedLine::Unrecognized(value.to_string())
}

fn classify_user(value: &Value, tracker: &mut ToolNameTracker) -> ParsedLine {
    let blocks = value
        .pointer("/message/content")
        .or_else(|| value.get("content"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for block in &blocks {
        if block.get("type").and_then(Value::as_str) == Some("tool_result") {
            let tool_use_id = block.get("tool_use_id").and_then(Value::as_str).unwrap_or_default();
            let tool_name = tracker.resolve_and_clear(tool_use_id);
            let is_error = block.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            let content = block
                .get("content")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| block.get("content").map(|v| v.to_string()).unwrap_or_default());
            let preview: String = content.chars().take(100).collect();
            return ParsedLine::CommandResult {
                tool_use_id: tool_use_id.to_string(),
                tool_name,
                is_error,
                preview,
            };
        }
    }

    ParsedLine::Unrecognized(value.to_string())
}

fn classify_result(value: &Value) -> ParsedLine {
    let is_error = value.get("is_error").and_then(Value::as_bool).unwrap_or(false);
    if is_error {
        let message = value.get("result").and_then(Value::as_str).unwrap_or("unknown error");
        return ParsedLine::CapturedError(message.to_string());
    }

    let usage = value.get("usage").cloned().unwrap_or(Value::Null);
    let telemetry = ParsedTelemetry {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_read_input_tokens: usage.get("cache_read_input_tokens").and_then(Value::as_u64).unwrap_or(0),
        cache_creation_input_tokens: usage
            .get("cache_creation_input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        duration_ms: value.get("duration_ms").and_then(Value::as_u64).unwrap_or(0),
        total_cost_usd_micros: value
            .get("total_cost_usd")
            .and_then(Value::as_f64)
            .map(|usd| (usd * 1_000_000.0).round() as u64)
            .unwrap_or(0),
    };
    ParsedLine::Telemetry(telemetry)
}

/// The alternative `{role, content, tool_calls}` shape some engines emit.
fn classify_role_shape(value: &Value, tracker: &mut ToolNameTracker) -> Option<ParsedLine> {
    let role = value.get("role").and_then(Value::as_str)?;
    match role {
        "assistant" => {
            if let Some(calls) = value.get("tool_calls").and_then(Value::as_array) {
                if let Some(call) = calls.first() {
                    let id = call.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = call
                        .pointer("/function/name")
                        .and_then(Value::as_str)
                        .unwrap_or("tool")
                        .to_string();
                    tracker.record(&id, &name);
                    return Some(ParsedLine::CommandStarted { tool_use_id: id, tool_name: name });
                }
            }
            let text = value.get("content").and_then(Value::as_str).unwrap_or_default();
            Some(ParsedLine::Text(text.to_string()))
        }
        "tool" => {
            let tool_use_id = value.get("tool_call_id").and_then(Value::as_str).unwrap_or_default();
            let tool_name = tracker.resolve_and_clear(tool_use_id);
            let content = value.get("content").and_then(Value::as_str).unwrap_or_default();
            let preview: String = content.chars().take(100).collect();
            Some(ParsedLine::CommandResult {
                tool_use_id: tool_use_id.to_string(),
                tool_name,
                is_error: false,
                preview,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_recognized_from_any_line_shape() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"type": "system", "subtype": "other", "session_id": "abc123"}"#;
        assert_eq!(classify_line(line, &mut tracker), ParsedLine::SessionId("abc123".into()));
    }

    #[test]
    fn assistant_text_block_becomes_text() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"type": "assistant", "message": {"content": [{"type": "text", "text": "hello"}]}}"#;
        assert_eq!(classify_line(line, &mut tracker), ParsedLine::Text("hello".into()));
    }

    #[test]
    fn tool_use_then_tool_result_resolves_name() {
        let mut tracker = ToolNameTracker::new();
        let started = r#"{"type": "assistant", "message": {"content": [{"type": "tool_use", "id": "t1", "name": "bash"}]}}"#;
        assert_eq!(
            classify_line(started, &mut tracker),
            ParsedLine::CommandStarted { tool_use_id: "t1".into(), tool_name: "bash".into() }
        );

        let result = r#"{"type": "user", "message": {"content": [{"type": "tool_result", "tool_use_id": "t1", "content": "ok", "is_error": false}]}}"#;
        assert_eq!(
            classify_line(result, &mut tracker),
            ParsedLine::CommandResult {
                tool_use_id: "t1".into(),
                tool_name: "bash".into(),
                is_error: false,
                preview: "ok".into(),
            }
        );
    }

    #[test]
    fn unresolved_tool_result_falls_back_to_tool_label() {
        let mut tracker = ToolNameTracker::new();
        let result = r#"{"type": "user", "message": {"content": [{"type": "tool_result", "tool_use_id": "unknown", "content": "ok"}]}}"#;
        assert_eq!(
            classify_line(result, &mut tracker),
            ParsedLine::CommandResult {
                tool_use_id: "unknown".into(),
                tool_name: "tool".into(),
                is_error: false,
                preview: "ok".into(),
            }
        );
    }

    #[test]
    fn result_line_extracts_telemetry() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"type": "result", "usage": {"input_tokens": 10, "output_tokens": 5, "cache_read_input_tokens": 2, "cache_creation_input_tokens": 1}, "duration_ms": 250, "total_cost_usd": 0.0123}"#;
        match classify_line(line, &mut tracker) {
            ParsedLine::Telemetry(t) => {
                assert_eq!(t.tokens_in(), 13);
                assert_eq!(t.duration_ms, 250);
                assert_eq!(t.total_cost_usd_micros, 12_300);
            }
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn result_line_with_session_id_still_extracts_telemetry() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"type": "result", "session_id": "abc123", "usage": {"input_tokens": 4}}"#;
        match classify_line(line, &mut tracker) {
            ParsedLine::Telemetry(t) => assert_eq!(t.input_tokens, 4),
            other => panic!("expected telemetry, got {other:?}"),
        }
    }

    #[test]
    fn result_line_with_error_flag_captures_error() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"type": "result", "is_error": true, "result": "boom"}"#;
        assert_eq!(classify_line(line, &mut tracker), ParsedLine::CapturedError("boom".into()));
    }

    #[test]
    fn non_json_line_is_unrecognized() {
        let mut tracker = ToolNameTracker::new();
        assert_eq!(classify_line("plain log output", &mut tracker), ParsedLine::Unrecognized("plain log output".into()));
    }

    #[test]
    fn role_shape_assistant_tool_call() {
        let mut tracker = ToolNameTracker::new();
        let line = r#"{"role": "assistant", "tool_calls": [{"id": "c1", "function": {"name": "search"}}]}"#;
        assert_eq!(
            classify_line(line, &mut tracker),
            ParsedLine::CommandStarted { tool_use_id: "c1".into(), tool_name: "search".into() }
        );
    }
}
