// SPDX-License-Identifier: MIT

//! `codemachine` — drives a workflow template against an external agent
//! engine CLI, one module step at a time.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod exit_error;
mod input;
mod reporter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use codemachine_core::{EventBus, SystemClock};
use codemachine_engine::AuthCache;
use codemachine_runtime::{run_workflow, FsmState, RunWorkflowOptions};
use codemachine_wire::ProcessSignal;
use exit_error::ExitError;
use tokio::sync::mpsc;

/// Run a codemachine workflow template against a configured agent engine.
#[derive(Parser)]
#[command(name = "codemachine", version, about)]
struct Cli {
    /// Workspace directory the engine runs inside. Defaults to the
    /// current directory.
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Directory containing `template.toml`. Defaults to the workspace
    /// directory.
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Name under which progress is tracked in `.codemachine/template.json`.
    #[arg(long, default_value = "default")]
    template: String,

    /// Restrict module steps to this track.
    #[arg(long)]
    track: Option<String>,

    /// Restrict module steps to these conditions (repeatable).
    #[arg(long = "condition")]
    conditions: Vec<String>,

    /// Run without pausing for human input between chained prompts.
    #[arg(long)]
    autonomous: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        let code = err.downcast_ref::<ExitError>().map_or(1, |e| e.code);
        eprintln!("Error: {err}");
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = codemachine_runtime::Config::from_env();
    let _log_guard = setup_logging(&config, &cli.workspace);

    let template_dir = cli.template_dir.clone().unwrap_or_else(|| cli.workspace.clone());
    let selected_conditions = if cli.conditions.is_empty() { None } else { Some(cli.conditions) };

    let options = RunWorkflowOptions {
        cwd: cli.workspace,
        template_dir,
        active_template: cli.template,
        selected_track: cli.track,
        selected_conditions,
        autonomous: cli.autonomous,
    };

    let registry = Arc::new(codemachine_engine::default_registry());
    let auth_cache = Arc::new(AuthCache::new(SystemClock));
    let bus = EventBus::new();
    let reporter = reporter::spawn(&bus);

    let (signal_tx, signal_rx) = mpsc::channel(8);
    let ctrl_c_task = tokio::spawn(watch_ctrl_c(signal_tx));

    let outcome = run_workflow(options, registry, auth_cache, bus, signal_rx, Arc::new(input::StdinInput)).await;

    ctrl_c_task.abort();
    reporter.abort();

    let outcome = outcome.map_err(ExitError::from)?;
    if !matches!(outcome.final_state, FsmState::Completed) {
        return Err(ExitError::new(1, format!("workflow ended in {:?}", outcome.final_state)).into());
    }
    Ok(())
}

/// Translates repeated Ctrl-C presses into the Runner's two-stage stop:
/// the first requests a graceful stop, a second forces immediate exit.
async fn watch_ctrl_c(tx: mpsc::Sender<ProcessSignal>) {
    loop {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if tx.send(ProcessSignal::Stop).await.is_err() {
            return;
        }
    }
}

fn setup_logging(
    config: &codemachine_runtime::Config,
    workspace: &std::path::Path,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = codemachine_runtime::Config::state_dir(workspace).join("logs");
    if std::fs::create_dir_all(&log_dir).is_err() {
        return None;
    }
    let file_appender = tracing_appender::rolling::never(&log_dir, "codemachine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if config.debug_logging { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .try_init();

    Some(guard)
}
