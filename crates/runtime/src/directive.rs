// SPDX-License-Identifier: MIT

//! Directive Processor: evaluates `directive.json` after each invocation
//! in `error → trigger → checkpoint → loop` priority order.

use crate::fsm::WorkflowState;
use codemachine_core::{ActiveLoop, AgentId, AgentStatus, ExecutionHistoryEntry};
use codemachine_wire::Directive;

/// What the Runner's scheduling loop should do next, having evaluated one
/// step's directive.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveOutcome {
    /// No directive, or `Continue`: advance normally.
    Advance,
    /// `error`: workflow status moves to `Error`, the run stops.
    Error { reason: Option<String> },
    /// `trigger`: spawn a one-off agent and await it before resuming.
    Trigger { agent_id: AgentId, reason: Option<String> },
    /// `checkpoint`: block until a checkpoint signal arrives.
    Checkpoint { reason: Option<String> },
    /// `loop`: rewind to `new_index` after updating execution history.
    Loop { new_index: usize },
    /// A loop directive whose source counter exceeded `max_iterations`;
    /// the active loop ends and scheduling continues as `Advance`.
    LoopExhausted,
}

/// Evaluates one directive against `state`, mutating its loop bookkeeping
/// in place and returning what the Runner should do.
///
/// `loop_source` keys the per-loop-source iteration counter — typically
/// the triggering module's index as a string, so two different steps
/// looping independently don't share a budget.
pub fn process_directive(
    directive: &Directive,
    state: &mut WorkflowState,
    current_index: usize,
    loop_source: &str,
) -> DirectiveOutcome {
    match directive {
        Directive::Continue => DirectiveOutcome::Advance,

        Directive::Error { reason } => DirectiveOutcome::Error { reason: reason.clone() },

        Directive::Trigger { agent_id, reason } => {
            DirectiveOutcome::Trigger { agent_id: *agent_id, reason: reason.clone() }
        }

        Directive::Checkpoint { reason } => DirectiveOutcome::Checkpoint { reason: reason.clone() },

        Directive::Loop { steps_back, max_iterations, skip, reason: _ } => {
            let counter = state.loop_counters.entry(loop_source.to_string()).or_insert(0);
            *counter += 1;

            if let Some(max) = max_iterations {
                if *counter > *max {
                    state.loop_counters.remove(loop_source);
                    state.active_loop = None;
                    return DirectiveOutcome::LoopExhausted;
                }
            }

            let cycle = *state.loop_counters.get(loop_source).unwrap_or(&1);
            let new_index = current_index.saturating_sub(*steps_back);

            for idx in new_index..=current_index {
                let prior = state.status_of(idx);
                state.history.entry(idx).or_default().push(ExecutionHistoryEntry {
                    prior_status: prior,
                    cycle,
                    recorded_at_epoch_ms: 0,
                });
                state.statuses.insert(idx, AgentStatus::Pending);
            }

            state.active_loop = Some(ActiveLoop { skip_list: skip.clone().unwrap_or_default() });

            DirectiveOutcome::Loop { new_index }
        }
    }
}
