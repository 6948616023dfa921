// SPDX-License-Identifier: MIT

//! Agent step status and the execution-history trail a loop directive
//! leaves behind when it rewinds a step back to `Pending`.

use crate::simple_display;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a module step's agent.
///
/// `Completed` never regresses except through a `loop` directive, which
/// resets the step to `Pending` and appends an [`ExecutionHistoryEntry`]
/// recording the prior state and the loop's cycle number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Pending,
    Running,
    /// The autonomous controller agent is driving this step's input.
    Delegated,
    Awaiting,
    Completed,
    Failed,
    Skipped,
    Retrying,
}

simple_display!(AgentStatus {
    Pending => "pending",
    Running => "running",
    Delegated => "delegated",
    Awaiting => "awaiting",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
    Retrying => "retrying",
});

impl AgentStatus {
    /// Terminal statuses never transition on their own; only an explicit
    /// loop directive or a fresh step restart moves past them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// One entry recorded when a loop directive rewinds a step's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub prior_status: AgentStatus,
    pub cycle: u32,
    pub recorded_at_epoch_ms: u64,
}

/// In-memory record of which agents are skipped for the remainder of an
/// active loop, set from the directive's `skip` list when the loop is
/// entered and cleared when the loop ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLoop {
    pub skip_list: Vec<crate::ids::AgentId>,
}

impl ActiveLoop {
    pub fn is_skipped(&self, agent_id: &crate::ids::AgentId) -> bool {
        self.skip_list.contains(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(AgentStatus::Completed.is_terminal());
        assert!(AgentStatus::Failed.is_terminal());
        assert!(AgentStatus::Skipped.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
        assert!(!AgentStatus::Pending.is_terminal());
    }

    #[test]
    fn display_matches_snake_case_tag() {
        assert_eq!(AgentStatus::Delegated.to_string(), "delegated");
    }

    #[test]
    fn active_loop_skip_membership() {
        let agent = crate::ids::AgentId::new();
        let mut loop_state = ActiveLoop::default();
        assert!(!loop_state.is_skipped(&agent));
        loop_state.skip_list.push(agent);
        assert!(loop_state.is_skipped(&agent));
    }
}
