// SPDX-License-Identifier: MIT

//! Wires the Step Executor, Index Manager, Engine Registry, Signal
//! Manager, and Directive Processor into the Workflow Runner's scheduling
//! loop described in §4.H.

use crate::cleanup::{persist_active_sessions, ActiveSessionTable};
use crate::directive::{process_directive, DirectiveOutcome};
use crate::executor::{execute_step, filter_chained_prompts, StepInvocation};
use crate::fsm::{resolve_scenario, skip_reason, FsmState, InputSource, ModeHandler, RunnerFsm, RunnerEvent, WorkflowState};
use crate::signal::{SignalEffect, SignalManager};
use async_trait::async_trait;
use codemachine_core::{AgentId, AgentStatus, Event, EventBus, MonitoringId, WorkflowRunId};
use codemachine_engine::{AuthCache, EngineRegistry};
use codemachine_storage::{IndexManager, ResumeDecision, StorageError};
use codemachine_template::{load_template, ModuleStep, Template, TemplateError};
use codemachine_wire::{read_directive, reset_directive, DirectiveError, ProcessSignal};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// The controller's demotion signal: switches the workflow to manual mode
/// without consuming a chain turn.
const SWITCH_TO_MANUAL: &str = "__SWITCH_TO_MANUAL__";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Directive(#[from] DirectiveError),
    #[error(transparent)]
    Executor(#[from] crate::executor::ExecutorError),
    #[error("no authenticated engine is available")]
    NoAuthenticatedEngine,
}

pub struct RunWorkflowOptions {
    pub cwd: PathBuf,
    pub template_dir: PathBuf,
    pub active_template: String,
    pub selected_track: Option<String>,
    pub selected_conditions: Option<Vec<String>>,
    pub autonomous: bool,
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub run_id: WorkflowRunId,
    pub final_state: FsmState,
}

/// Supplies a step's next turn of input for the interactive handler.
/// `codemachine-cli` implements this against stdin; tests supply a
/// canned provider.
#[async_trait]
pub trait InputProvider: Send + Sync {
    async fn next_input(&self, source: InputSource, queued_prompt: Option<&str>) -> String;
}

/// An input provider that always advances (empty input), used when no
/// interactive surface is wired up — e.g. a headless autonomous run with
/// no queued prompts left.
pub struct AutoAdvance;

#[async_trait]
impl InputProvider for AutoAdvance {
    async fn next_input(&self, _source: InputSource, queued_prompt: Option<&str>) -> String {
        queued_prompt.unwrap_or_default().to_string()
    }
}

/// What to do once a module step's current invocation has settled — either
/// because its directive was `Continue`/a spent loop, or because a
/// `Trigger`/`Checkpoint` directive ran to completion.
enum TurnOutcome {
    Settled,
    Stopped,
}

pub async fn run_workflow(
    options: RunWorkflowOptions,
    registry: Arc<EngineRegistry>,
    auth_cache: Arc<AuthCache<codemachine_core::SystemClock>>,
    bus: EventBus,
    mut signals: mpsc::Receiver<ProcessSignal>,
    input: Arc<dyn InputProvider>,
) -> Result<WorkflowOutcome, WorkflowError> {
    if !options.cwd.exists() {
        return Err(WorkflowError::Precondition(format!("workspace {} does not exist", options.cwd.display())));
    }

    let state_dir = crate::env::Config::state_dir(&options.cwd);
    let template = load_template(
        &options.template_dir,
        options.selected_track.as_deref(),
        options.selected_conditions.as_deref(),
    )?;
    let index = Arc::new(IndexManager::load_or_init(&state_dir, &options.active_template)?);
    let directive_path = state_dir.join("memory").join("directive.json");

    let run_id = WorkflowRunId::new();
    let signal_manager = Arc::new(SignalManager::new(options.autonomous));
    let sessions = ActiveSessionTable::new();
    {
        let index = index.clone();
        let sessions = sessions.clone();
        let signal_manager_for_hook = signal_manager.clone();
        signal_manager_for_hook.set_cleanup_hook(move || persist_active_sessions(&index, &sessions));
    }

    let mut state = WorkflowState { autonomous: options.autonomous, ..Default::default() };
    let resume = index.get_resume_info();
    let mut current_index = resume.start_index;
    // Only the step we're actually resuming into gets special recovery
    // handling (§4.H "Recovery on start"); every later step runs fresh.
    let (mut recovering_index, mut recovering_from_chain) = match resume.decision {
        ResumeDecision::ResumeChain { module_index, from_chain } => (Some(module_index), from_chain),
        _ => (None, 0),
    };

    let mut fsm = RunnerFsm::new();
    fsm.apply(RunnerEvent::Start);

    let total = template.module_step_count();
    let outcome = 'scheduler: loop {
        if current_index >= total {
            fsm.apply(RunnerEvent::Await);
            fsm.apply(RunnerEvent::StepComplete(String::new()));
            break 'scheduler WorkflowOutcome { run_id, final_state: fsm.state().clone() };
        }

        if let Some(outcome) = check_stop(&mut signals, &signal_manager, &bus, run_id, &mut fsm) {
            break 'scheduler outcome;
        }

        let Some(step) = template.module_step_at(current_index) else {
            current_index += 1;
            continue;
        };

        if let Some(_reason) = skip_reason(
            step.tracks.as_deref(),
            options.selected_track.as_deref(),
            step.conditions.as_deref(),
            options.selected_conditions.as_deref(),
            step.execute_once,
            index.get_step_data(current_index).is_some_and(|d| d.is_complete()),
            &step.agent_id,
            state.active_loop.as_ref(),
        ) {
            state.statuses.insert(current_index, AgentStatus::Skipped);
            current_index += 1;
            continue;
        }

        let engine = select_engine(&registry, &auth_cache, step.engine_override.as_deref())
            .await
            .ok_or(WorkflowError::NoAuthenticatedEngine)?;

        state.statuses.insert(current_index, AgentStatus::Running);
        bus.publish(Event::WorkflowRunning { run_id, module_index: current_index, agent_id: step.agent_id });
        bus.publish(Event::WorkflowStatus {
            run_id,
            module_index: current_index,
            agent_id: step.agent_id,
            status: AgentStatus::Running,
        });

        let chained_prompts =
            filter_chained_prompts(template.chained_prompts_for(current_index), options.selected_track.as_deref(), options.selected_conditions.as_deref());

        let is_recovering_this_step = recovering_index == Some(current_index)
            && index.get_step_data(current_index).is_some_and(|d| d.session_id.is_some() && !d.is_complete());
        let start_chain = if recovering_index == Some(current_index) { recovering_from_chain } else { 0 };
        index.init_queue(chained_prompts, start_chain);
        recovering_index = None;

        let mut chain_turn = start_chain;
        let mut stdin_payload: Option<String> = None;
        let mut skip_next_invocation = is_recovering_this_step;

        'chain: loop {
            if let Some(outcome) = check_stop(&mut signals, &signal_manager, &bus, run_id, &mut fsm) {
                break 'scheduler outcome;
            }

            if skip_next_invocation {
                skip_next_invocation = false;
            } else {
                let monitoring_id = MonitoringId::new();
                reset_directive(&directive_path)?;
                index.step_started(current_index)?;

                let cancel = signal_manager.begin_step();
                let invocation = StepInvocation {
                    step,
                    engine: engine.clone(),
                    cwd: options.cwd.clone(),
                    stdin_payload: stdin_payload.take(),
                    timeout: codemachine_adapters::DEFAULT_AGENT_TIMEOUT,
                    cancel,
                };
                let result = execute_step(invocation, step.agent_id, monitoring_id, &bus).await?;

                if let Some(session_id) = result.session_id {
                    let session_id = codemachine_core::SessionId::from_string(session_id);
                    index.step_session_initialized(current_index, session_id, monitoring_id)?;
                    sessions.record(current_index, session_id, monitoring_id);
                }

                let directive = read_directive(&directive_path)?;
                match process_directive(&directive, &mut state, current_index, &current_index.to_string()) {
                    DirectiveOutcome::Advance | DirectiveOutcome::LoopExhausted => {}
                    DirectiveOutcome::Loop { new_index } => {
                        let cycle = state.loop_counters.get(&current_index.to_string()).copied().unwrap_or(1);
                        bus.publish(Event::LoopReset { run_id, from_module_index: current_index, to_module_index: new_index, cycle });
                        index.reset_queue();
                        current_index = new_index;
                        continue 'scheduler;
                    }
                    DirectiveOutcome::Error { reason } => {
                        bus.publish(Event::WorkflowError { run_id, reason: reason.unwrap_or_default() });
                        fsm.apply(RunnerEvent::StepError("directive error".into()));
                        break 'scheduler WorkflowOutcome { run_id, final_state: fsm.state().clone() };
                    }
                    DirectiveOutcome::Trigger { agent_id, reason } => {
                        run_triggered_agent(&bus, run_id, current_index, step, engine.clone(), options.cwd.clone(), agent_id, reason, &signal_manager).await?;
                    }
                    DirectiveOutcome::Checkpoint { reason } => {
                        match block_on_checkpoint(&mut signals, &signal_manager, &bus, run_id, reason).await {
                            TurnOutcome::Stopped => {
                                signal_manager.run_cleanup();
                                bus.publish(Event::WorkflowUserStop { run_id });
                                fsm.apply(RunnerEvent::Stop);
                                break 'scheduler WorkflowOutcome { run_id, final_state: fsm.state().clone() };
                            }
                            TurnOutcome::Settled => {}
                        }
                    }
                }
            }

            fsm.apply(RunnerEvent::Await);

            let next = 'await_input: loop {
                let (handler, source, warn) = scenario_for(
                    step,
                    &template,
                    current_index,
                    state.autonomous,
                    state.paused || signal_manager.is_paused(),
                    options.selected_track.as_deref(),
                    options.selected_conditions.as_deref(),
                );
                if warn {
                    tracing::warn!(module_index = current_index, ?handler, "no controller and no chained prompts in manual mode; forcing interactive/user input");
                }
                let queued = index.get_current_queued_prompt();
                let candidate = input.next_input(source, queued.as_ref().map(|p| p.content.as_str())).await;
                if candidate == SWITCH_TO_MANUAL {
                    state.autonomous = false;
                    continue 'await_input;
                }
                break candidate;
            };

            if next.is_empty() {
                fsm.apply(RunnerEvent::Resume);
                break 'chain;
            }

            fsm.apply(RunnerEvent::InputReceived(next.clone()));
            if index.is_queued_prompt(&next) {
                index.chain_completed(current_index, chain_turn)?;
                index.advance_queue();
                chain_turn += 1;
            }
            stdin_payload = Some(next);
        }

        finish_step(&index, current_index, &mut state, &bus, run_id, step)?;
        current_index += 1;
    };

    if outcome.final_state == FsmState::Completed {
        bus.publish(Event::WorkflowCompleted { run_id });
    }
    Ok(outcome)
}

/// Checks for a pending stop signal without blocking; on a stop it emits
/// the user-stop event sequence and returns the terminal outcome.
fn check_stop(
    signals: &mut mpsc::Receiver<ProcessSignal>,
    signal_manager: &SignalManager,
    bus: &EventBus,
    run_id: WorkflowRunId,
    fsm: &mut RunnerFsm,
) -> Option<WorkflowOutcome> {
    let signal = signals.try_recv().ok()?;
    match signal_manager.handle(signal) {
        SignalEffect::StopRequested | SignalEffect::ExitNow => {
            bus.publish(Event::WorkflowStopping { run_id });
            fsm.apply(RunnerEvent::Stop);
            signal_manager.run_cleanup();
            bus.publish(Event::WorkflowUserStop { run_id });
            Some(WorkflowOutcome { run_id, final_state: fsm.state().clone() })
        }
        _ => None,
    }
}

/// `trigger`: spawns a one-off invocation of the current step's engine
/// using the directive's reason as its prompt and awaits it. An error
/// during the triggered agent is swallowed — it's marked `Skipped` and the
/// outer flow continues, per §4.G.
#[allow(clippy::too_many_arguments)]
async fn run_triggered_agent(
    bus: &EventBus,
    run_id: WorkflowRunId,
    module_index: usize,
    step: &ModuleStep,
    engine: Arc<dyn codemachine_engine::EngineAdapter>,
    cwd: PathBuf,
    agent_id: AgentId,
    reason: Option<String>,
    signal_manager: &SignalManager,
) -> Result<(), WorkflowError> {
    bus.publish(Event::TriggeredAgentAdded { run_id, module_index, agent_id });
    let monitoring_id = MonitoringId::new();
    let cancel = signal_manager.begin_step();
    let invocation = StepInvocation {
        step,
        engine,
        cwd,
        stdin_payload: Some(reason.unwrap_or_default()),
        timeout: codemachine_adapters::DEFAULT_AGENT_TIMEOUT,
        cancel,
    };
    if execute_step(invocation, agent_id, monitoring_id, bus).await.is_err() {
        bus.publish(Event::WorkflowStatus { run_id, module_index, agent_id, status: AgentStatus::Skipped });
    }
    Ok(())
}

/// `checkpoint`: publishes `checkpoint:state{active: true}` and blocks on
/// the signal channel until `checkpoint:continue` (clears the gate) or
/// `checkpoint:quit`/a stop signal (ends the workflow).
async fn block_on_checkpoint(
    signals: &mut mpsc::Receiver<ProcessSignal>,
    signal_manager: &SignalManager,
    bus: &EventBus,
    run_id: WorkflowRunId,
    reason: Option<String>,
) -> TurnOutcome {
    bus.publish(Event::CheckpointState { run_id, active: true, reason });
    loop {
        match signals.recv().await {
            Some(signal) => match signal_manager.handle(signal) {
                SignalEffect::CheckpointResume => {
                    bus.publish(Event::CheckpointCleared { run_id });
                    return TurnOutcome::Settled;
                }
                SignalEffect::CheckpointQuit | SignalEffect::StopRequested | SignalEffect::ExitNow => {
                    return TurnOutcome::Stopped;
                }
                _ => continue,
            },
            None => return TurnOutcome::Stopped,
        }
    }
}

fn finish_step(
    index: &IndexManager,
    module_index: usize,
    state: &mut WorkflowState,
    bus: &EventBus,
    run_id: WorkflowRunId,
    step: &ModuleStep,
) -> Result<(), WorkflowError> {
    index.step_completed(module_index)?;
    index.reset_queue();
    state.statuses.insert(module_index, AgentStatus::Completed);
    bus.publish(Event::WorkflowStatus {
        run_id,
        module_index,
        agent_id: step.agent_id,
        status: AgentStatus::Completed,
    });
    Ok(())
}

async fn select_engine(
    registry: &EngineRegistry,
    auth_cache: &AuthCache<codemachine_core::SystemClock>,
    declared: Option<&str>,
) -> Option<Arc<dyn codemachine_engine::EngineAdapter>> {
    if let Some(id) = declared {
        if let Some(engine) = registry.get(id) {
            if is_authenticated(auth_cache, &engine).await {
                return Some(engine);
            }
            tracing::warn!(engine = id, "declared engine not authenticated, falling back");
        }
    }

    for engine in registry.iter() {
        if is_authenticated(auth_cache, engine).await {
            return Some(engine.clone());
        }
    }

    registry.default_engine()
}

async fn is_authenticated(
    auth_cache: &AuthCache<codemachine_core::SystemClock>,
    engine: &Arc<dyn codemachine_engine::EngineAdapter>,
) -> bool {
    if let Some(cached) = auth_cache.get(engine.id()) {
        return cached;
    }
    let authenticated = engine.check_auth().await;
    auth_cache.set(engine.id(), authenticated);
    authenticated
}

/// Distinguishes steps with a populated chained-prompt chain from
/// single-turn ones, feeding [`resolve_scenario`].
pub fn has_chained_prompts(template: &Template, module_index: usize, selected_track: Option<&str>, selected_conditions: Option<&[String]>) -> bool {
    !filter_chained_prompts(template.chained_prompts_for(module_index), selected_track, selected_conditions).is_empty()
}

pub fn scenario_for(
    step: &ModuleStep,
    template: &Template,
    module_index: usize,
    autonomous: bool,
    paused: bool,
    selected_track: Option<&str>,
    selected_conditions: Option<&[String]>,
) -> (ModeHandler, InputSource, bool) {
    let has_chain = has_chained_prompts(template, module_index, selected_track, selected_conditions);
    resolve_scenario(step.interactive, autonomous, has_chain, paused)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemachine_template::{ModuleStep, Step};

    fn sample_step() -> ModuleStep {
        ModuleStep {
            agent_id: AgentId::new(),
            name: "writer".into(),
            engine_override: None,
            model: None,
            tracks: None,
            conditions: None,
            execute_once: false,
            interactive: None,
            prompt_paths: vec![],
            chained_prompts_path: None,
        }
    }

    #[test]
    fn scenario_for_step_with_no_chain_is_continuous_in_auto_mode() {
        let template = Template { steps: vec![Step::Module(sample_step())], chained_prompts: Default::default() };
        let step = template.module_step_at(0).expect("step");
        let (handler, source, warn) = scenario_for(step, &template, 0, true, false, None, None);
        assert_eq!(handler, ModeHandler::Continuous);
        assert_eq!(source, InputSource::System);
        assert!(!warn);
    }
}
