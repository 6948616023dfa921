// SPDX-License-Identifier: MIT

//! Workflow Runner FSM: states, transition events, and the scenario
//! matrix that picks a mode handler for the `Awaiting` state.

use codemachine_core::{ActiveLoop, AgentStatus, ExecutionHistoryEntry};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsmState {
    Idle,
    Running,
    /// A `Running`-equivalent substate: the autonomous controller agent is
    /// driving this step's input rather than a human.
    Delegated,
    Awaiting,
    Completed,
    Stopped,
    Error(String),
}

impl FsmState {
    pub fn is_final(&self) -> bool {
        matches!(self, FsmState::Completed | FsmState::Stopped | FsmState::Error(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    Start,
    StepComplete(String),
    InputReceived(String),
    Resume,
    Await,
    Skip,
    Stop,
    StepError(String),
}

/// The pure state-transition function; the Runner's scheduling loop drives
/// it, but the transitions themselves have no I/O.
#[derive(Debug, Clone)]
pub struct RunnerFsm {
    state: FsmState,
}

impl RunnerFsm {
    pub fn new() -> Self {
        Self { state: FsmState::Idle }
    }

    pub fn state(&self) -> &FsmState {
        &self.state
    }

    pub fn apply(&mut self, event: RunnerEvent) -> &FsmState {
        self.state = match (&self.state, event) {
            (FsmState::Idle, RunnerEvent::Start) => FsmState::Running,
            (FsmState::Running | FsmState::Delegated, RunnerEvent::Await) => FsmState::Awaiting,
            (FsmState::Running | FsmState::Delegated, RunnerEvent::StepError(reason)) => FsmState::Error(reason),
            (FsmState::Running | FsmState::Delegated, RunnerEvent::Stop) => FsmState::Stopped,
            (FsmState::Awaiting, RunnerEvent::Resume) => FsmState::Running,
            (FsmState::Awaiting, RunnerEvent::InputReceived(_)) => FsmState::Running,
            (FsmState::Awaiting, RunnerEvent::Skip) => FsmState::Running,
            (FsmState::Awaiting, RunnerEvent::Stop) => FsmState::Stopped,
            (FsmState::Awaiting, RunnerEvent::StepComplete(_)) => FsmState::Completed,
            (current, _) => current.clone(),
        };
        &self.state
    }
}

impl Default for RunnerFsm {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved mode handler for an `Awaiting` step, per the scenario matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeHandler {
    Interactive,
    Autonomous,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Controller,
    User,
    System,
}

/// Row lookup against the scenario matrix. `paused` forces interactive
/// handling regardless of the other three inputs.
pub fn resolve_scenario(
    interactive: Option<bool>,
    auto_mode: bool,
    has_chained_prompts: bool,
    paused: bool,
) -> (ModeHandler, InputSource, bool) {
    if paused {
        let source = if auto_mode { InputSource::Controller } else { InputSource::User };
        return (ModeHandler::Interactive, source, false);
    }

    let interactive = interactive.unwrap_or(has_chained_prompts);

    match (interactive, auto_mode, has_chained_prompts) {
        (true, true, _) => (ModeHandler::Interactive, InputSource::Controller, false),
        (true, false, _) => (ModeHandler::Interactive, InputSource::User, false),
        (false, true, true) => (ModeHandler::Autonomous, InputSource::System, false),
        (false, true, false) => (ModeHandler::Continuous, InputSource::System, false),
        // Non-interactive with auto mode off has no queue and no
        // controller to drive it; forced into interactive/user with a
        // caller-visible warning flag.
        (false, false, _) => (ModeHandler::Interactive, InputSource::User, true),
    }
}

/// Skip predicate, evaluated in order; the first matching reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TrackMismatch,
    MissingCondition,
    AlreadyExecutedOnce,
    InActiveLoopSkipList,
}

pub fn skip_reason(
    tracks: Option<&[String]>,
    selected_track: Option<&str>,
    conditions: Option<&[String]>,
    selected_conditions: Option<&[String]>,
    execute_once: bool,
    already_completed: bool,
    agent_id: &codemachine_core::AgentId,
    active_loop: Option<&ActiveLoop>,
) -> Option<SkipReason> {
    if !codemachine_template::matches_track(tracks, selected_track) {
        return Some(SkipReason::TrackMismatch);
    }
    if !codemachine_template::matches_conditions(conditions, selected_conditions) {
        return Some(SkipReason::MissingCondition);
    }
    if execute_once && already_completed {
        return Some(SkipReason::AlreadyExecutedOnce);
    }
    if active_loop.is_some_and(|l| l.is_skipped(agent_id)) {
        return Some(SkipReason::InActiveLoopSkipList);
    }
    None
}

/// In-memory runtime state the FSM, Signal Manager, and Directive
/// Processor share across one workflow run. Distinct from
/// [`codemachine_storage::TemplateTracking`], which is the durable record
/// the index manager persists to disk.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub statuses: HashMap<usize, AgentStatus>,
    pub history: HashMap<usize, Vec<ExecutionHistoryEntry>>,
    pub active_loop: Option<ActiveLoop>,
    pub loop_counters: HashMap<String, u32>,
    pub paused: bool,
    pub autonomous: bool,
    pub current_index: usize,
}

impl WorkflowState {
    pub fn status_of(&self, module_index: usize) -> AgentStatus {
        self.statuses.get(&module_index).copied().unwrap_or(AgentStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_transitions_idle_to_running() {
        let mut fsm = RunnerFsm::new();
        fsm.apply(RunnerEvent::Start);
        assert_eq!(fsm.state(), &FsmState::Running);
    }

    #[test]
    fn full_happy_path_reaches_completed() {
        let mut fsm = RunnerFsm::new();
        fsm.apply(RunnerEvent::Start);
        fsm.apply(RunnerEvent::Await);
        assert_eq!(fsm.state(), &FsmState::Awaiting);
        fsm.apply(RunnerEvent::StepComplete("done".into()));
        assert_eq!(fsm.state(), &FsmState::Completed);
    }

    #[test]
    fn step_error_is_terminal() {
        let mut fsm = RunnerFsm::new();
        fsm.apply(RunnerEvent::Start);
        fsm.apply(RunnerEvent::StepError("boom".into()));
        assert!(fsm.state().is_final());
    }

    #[test]
    fn stop_from_awaiting_is_terminal() {
        let mut fsm = RunnerFsm::new();
        fsm.apply(RunnerEvent::Start);
        fsm.apply(RunnerEvent::Await);
        fsm.apply(RunnerEvent::Stop);
        assert_eq!(fsm.state(), &FsmState::Stopped);
    }

    #[test]
    fn scenario_matrix_rows_one_through_eight() {
        assert_eq!(
            resolve_scenario(Some(true), true, true, false),
            (ModeHandler::Interactive, InputSource::Controller, false)
        );
        assert_eq!(
            resolve_scenario(Some(true), false, false, false),
            (ModeHandler::Interactive, InputSource::User, false)
        );
        assert_eq!(
            resolve_scenario(Some(false), true, true, false),
            (ModeHandler::Autonomous, InputSource::System, false)
        );
        assert_eq!(
            resolve_scenario(Some(false), true, false, false),
            (ModeHandler::Continuous, InputSource::System, false)
        );
        let (handler, source, warn) = resolve_scenario(Some(false), false, true, false);
        assert_eq!(handler, ModeHandler::Interactive);
        assert_eq!(source, InputSource::User);
        assert!(warn);
    }

    #[test]
    fn none_interactive_falls_back_to_has_chained_prompts() {
        let (handler, _, _) = resolve_scenario(None, true, true, false);
        assert_eq!(handler, ModeHandler::Interactive);
        let (handler, _, _) = resolve_scenario(None, true, false, false);
        assert_eq!(handler, ModeHandler::Continuous);
    }

    #[test]
    fn paused_forces_interactive_regardless_of_scenario() {
        let (handler, source, _) = resolve_scenario(Some(false), true, false, true);
        assert_eq!(handler, ModeHandler::Interactive);
        assert_eq!(source, InputSource::Controller);
    }

    #[test]
    fn skip_predicate_checks_track_before_conditions() {
        let agent = codemachine_core::AgentId::new();
        let tracks = vec!["fast".to_string()];
        let reason = skip_reason(Some(&tracks), Some("slow"), None, None, false, false, &agent, None);
        assert_eq!(reason, Some(SkipReason::TrackMismatch));
    }

    #[test]
    fn skip_predicate_respects_execute_once() {
        let agent = codemachine_core::AgentId::new();
        let reason = skip_reason(None, None, None, None, true, true, &agent, None);
        assert_eq!(reason, Some(SkipReason::AlreadyExecutedOnce));
    }

    #[test]
    fn skip_predicate_respects_active_loop_skip_list() {
        let agent = codemachine_core::AgentId::new();
        let mut active_loop = ActiveLoop::default();
        active_loop.skip_list.push(agent);
        let reason = skip_reason(None, None, None, None, false, false, &agent, Some(&active_loop));
        assert_eq!(reason, Some(SkipReason::InActiveLoopSkipList));
    }
}
