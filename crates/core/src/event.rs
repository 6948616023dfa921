// SPDX-License-Identifier: MIT

//! Workflow event types carried on the [`crate::bus::EventBus`].
//!
//! Every event carries the ids needed to route it without an additional
//! lookup into `template.json`. Unknown type tags deserialize to
//! [`Event::Custom`] so forward-compatible consumers never hard-fail on an
//! event emitted by a newer build.

use crate::ids::{AgentId, MonitoringId, SessionId, WorkflowRunId};
use crate::status::AgentStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Telemetry extracted from an engine's `result`/`usage` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTelemetry {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub duration_ms: u64,
    /// Cost in USD, represented as micro-dollars to avoid float drift.
    pub total_cost_usd_micros: u64,
}

impl ParsedTelemetry {
    /// `tokens_in = input + cache_read + cache_creation`, per the engine
    /// protocol's accounting convention.
    pub fn tokens_in(&self) -> u64 {
        self.input_tokens + self.cache_read_input_tokens + self.cache_creation_input_tokens
    }

    pub fn cached_tokens(&self) -> u64 {
        self.cache_read_input_tokens + self.cache_creation_input_tokens
    }
}

/// Events published on the event bus.
///
/// Serializes as `{"type": "event:name", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "workflow:running")]
    WorkflowRunning { run_id: WorkflowRunId, module_index: usize, agent_id: AgentId },

    #[serde(rename = "workflow:status")]
    WorkflowStatus { run_id: WorkflowRunId, module_index: usize, agent_id: AgentId, status: AgentStatus },

    #[serde(rename = "workflow:error")]
    WorkflowError { run_id: WorkflowRunId, reason: String },

    #[serde(rename = "workflow:stopping")]
    WorkflowStopping { run_id: WorkflowRunId },

    #[serde(rename = "workflow:user_stop")]
    WorkflowUserStop { run_id: WorkflowRunId },

    #[serde(rename = "workflow:completed")]
    WorkflowCompleted { run_id: WorkflowRunId },

    /// A loop directive reset one or more steps; emitted before any new
    /// `workflow:running` event for the same step.
    #[serde(rename = "workflow:loop_reset")]
    LoopReset { run_id: WorkflowRunId, from_module_index: usize, to_module_index: usize, cycle: u32 },

    #[serde(rename = "session:registered")]
    SessionRegistered {
        agent_id: AgentId,
        session_id: SessionId,
        monitoring_id: MonitoringId,
    },

    #[serde(rename = "engine:log")]
    EngineLog {
        monitoring_id: MonitoringId,
        line: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },

    #[serde(rename = "engine:command_started")]
    CommandStarted { monitoring_id: MonitoringId, tool_use_id: String, tool_name: String },

    #[serde(rename = "engine:command_result")]
    CommandResult {
        monitoring_id: MonitoringId,
        tool_use_id: String,
        tool_name: String,
        is_error: bool,
        /// First 100 characters of the tool result content.
        preview: String,
    },

    #[serde(rename = "engine:telemetry")]
    EngineTelemetry { monitoring_id: MonitoringId, telemetry: ParsedTelemetry },

    #[serde(rename = "checkpoint:state")]
    CheckpointState { run_id: WorkflowRunId, active: bool, #[serde(default, skip_serializing_if = "Option::is_none")] reason: Option<String> },

    /// A checkpoint gate was cleared by `checkpoint:continue`; distinct
    /// from `checkpoint:state{active: false}` so a subscriber can tell
    /// "the gate just opened" apart from "replaying an already-closed
    /// gate from history".
    #[serde(rename = "checkpoint:clear")]
    CheckpointCleared { run_id: WorkflowRunId },

    /// A `trigger` directive spawned a one-off agent session.
    #[serde(rename = "triggered:added")]
    TriggeredAgentAdded { run_id: WorkflowRunId, module_index: usize, agent_id: AgentId },

    #[serde(rename = "history:truncated")]
    HistoryTruncated { dropped: usize },

    /// Unrecognized event tag, preserved for forward compatibility.
    #[serde(other)]
    Custom,
}

impl Event {
    /// Best-effort routing key; `None` for events with no natural owner
    /// (e.g. [`Event::Custom`], [`Event::HistoryTruncated`]).
    pub fn monitoring_id(&self) -> Option<&MonitoringId> {
        match self {
            Event::SessionRegistered { monitoring_id, .. }
            | Event::EngineLog { monitoring_id, .. }
            | Event::CommandStarted { monitoring_id, .. }
            | Event::CommandResult { monitoring_id, .. }
            | Event::EngineTelemetry { monitoring_id, .. } => Some(monitoring_id),
            _ => None,
        }
    }

    /// Round-trips through `serde_json::Value`, used by the bus when a
    /// caller needs an opaque snapshot (e.g. for a debug log sink).
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_arithmetic() {
        let t = ParsedTelemetry {
            input_tokens: 10,
            output_tokens: 5,
            cache_read_input_tokens: 3,
            cache_creation_input_tokens: 2,
            duration_ms: 100,
            total_cost_usd_micros: 42,
        };
        assert_eq!(t.tokens_in(), 15);
        assert_eq!(t.cached_tokens(), 5);
    }

    #[test]
    fn unknown_tag_deserializes_to_custom() {
        let value = serde_json::json!({"type": "something:unseen", "foo": "bar"});
        let event: Event = serde_json::from_value(value).expect("deserializes");
        assert_eq!(event, Event::Custom);
    }

    #[test]
    fn round_trips_through_json() {
        let event = Event::WorkflowRunning {
            run_id: WorkflowRunId::new(),
            module_index: 2,
            agent_id: AgentId::new(),
        };
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["type"], "workflow:running");
        let back: Event = serde_json::from_value(json).expect("deserializes");
        assert_eq!(event, back);
    }

    #[test]
    fn monitoring_id_routing() {
        let mid = MonitoringId::new();
        let event = Event::EngineLog { monitoring_id: mid, line: "hi".into(), tag: None };
        assert_eq!(event.monitoring_id(), Some(&mid));
        assert_eq!(Event::Custom.monitoring_id(), None);
    }
}
