// SPDX-License-Identifier: MIT

//! The persisted data model: one `StepData` per module step, and the
//! single-file `TemplateTracking` document that owns them.

use chrono::{DateTime, Utc};
use codemachine_core::{AgentId, MonitoringId, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{session_id, monitoring_id, completed_chains?, completed_at?}` —
/// persisted once per module step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_id: Option<MonitoringId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_chains: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepData {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn has_partial_chains(&self) -> bool {
        !self.is_complete() && self.completed_chains.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Tri-state autonomous mode: `never`/`always` override the step-declared
/// `interactive` flag unconditionally; `true`/`false` is the ordinary
/// toggle the mode-change signal flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomousMode {
    #[default]
    False,
    True,
    Never,
    Always,
}

impl AutonomousMode {
    pub fn is_autonomous(self) -> bool {
        matches!(self, Self::True | Self::Always)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub monitoring_id: MonitoringId,
}

/// The single persisted document at `.codemachine/template.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateTracking {
    pub active_template: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub completed_steps: BTreeMap<usize, StepData>,
    #[serde(default)]
    pub not_completed_steps: Vec<usize>,
    #[serde(default = "default_resume_from_last_step")]
    pub resume_from_last_step: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomous_mode: Option<AutonomousMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_config: Option<ControllerConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_view: Option<bool>,
}

fn default_resume_from_last_step() -> bool {
    true
}

impl TemplateTracking {
    pub fn new(active_template: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            active_template: active_template.into(),
            last_updated: now,
            resume_from_last_step: true,
            ..Default::default()
        }
    }

    /// Invariant (a): every index in `not_completed_steps` is also a key of
    /// `completed_steps` with `completed_at` unset.
    pub fn check_invariants(&self) -> Result<(), String> {
        for idx in &self.not_completed_steps {
            match self.completed_steps.get(idx) {
                None => return Err(format!("not_completed_steps references unknown index {idx}")),
                Some(data) if data.is_complete() => {
                    return Err(format!("not_completed_steps references completed index {idx}"))
                }
                Some(_) => {}
            }
        }
        for (idx, data) in &self.completed_steps {
            if data.is_complete() && data.completed_chains.is_some() {
                return Err(format!("index {idx} has both completed_at and completed_chains"));
            }
        }
        Ok(())
    }
}
