// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! codemachine-runtime: the Workflow Runner — Step Executor, Signal
//! Manager, Directive Processor, and the scheduling FSM that ties them
//! together with the lower-level storage/adapter/engine crates.

pub mod cleanup;
pub mod directive;
pub mod env;
pub mod executor;
pub mod fsm;
pub mod run;
pub mod signal;

pub use directive::{process_directive, DirectiveOutcome};
pub use env::Config;
pub use executor::{execute_step, load_prompt, ExecutorError, StepInvocation};
pub use fsm::{resolve_scenario, skip_reason, FsmState, InputSource, ModeHandler, RunnerEvent, RunnerFsm, SkipReason, WorkflowState};
pub use run::{run_workflow, AutoAdvance, InputProvider, RunWorkflowOptions, WorkflowError, WorkflowOutcome};
pub use signal::{SignalEffect, SignalManager};
