// SPDX-License-Identifier: MIT

//! Drains an [`EventBus`] subscription to stdout while a workflow runs.
//!
//! Runs as its own task so a slow terminal never backpressures the
//! scheduler loop; the bus already isolates subscribers from each other
//! and from the publisher.

use codemachine_core::{Event, EventBus};

pub fn spawn(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let (mut rx, guard) = bus.subscribe();
    tokio::spawn(async move {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    })
}

fn print_event(event: &Event) {
    match event {
        Event::WorkflowRunning { module_index, .. } => {
            println!("[codemachine] step {module_index} starting");
        }
        Event::WorkflowStatus { module_index, status, .. } => {
            println!("[codemachine] step {module_index}: {status}");
        }
        Event::WorkflowError { reason, .. } => {
            eprintln!("[codemachine] error: {reason}");
        }
        Event::WorkflowStopping { .. } => {
            println!("[codemachine] stopping...");
        }
        Event::WorkflowUserStop { .. } => {
            println!("[codemachine] stopped");
        }
        Event::WorkflowCompleted { .. } => {
            println!("[codemachine] workflow completed");
        }
        Event::LoopReset { from_module_index, to_module_index, cycle, .. } => {
            println!("[codemachine] loop: step {from_module_index} -> {to_module_index} (cycle {cycle})");
        }
        Event::EngineLog { line, .. } => {
            println!("{line}");
        }
        Event::CommandStarted { tool_name, .. } => {
            println!("[codemachine] running: {tool_name}");
        }
        Event::CommandResult { tool_name, is_error, .. } => {
            if *is_error {
                eprintln!("[codemachine] {tool_name} failed");
            }
        }
        Event::CheckpointState { active, reason, .. } => {
            let reason = reason.as_deref().unwrap_or("");
            println!("[codemachine] checkpoint {}: {reason}", if *active { "open" } else { "closed" });
        }
        Event::CheckpointCleared { .. } => {
            println!("[codemachine] checkpoint cleared");
        }
        Event::TriggeredAgentAdded { module_index, .. } => {
            println!("[codemachine] step {module_index}: triggered agent spawned");
        }
        Event::HistoryTruncated { dropped } => {
            eprintln!("[codemachine] warning: {dropped} older event(s) dropped from bus history");
        }
        Event::SessionRegistered { .. } | Event::EngineTelemetry { .. } | Event::Custom => {}
    }
}
