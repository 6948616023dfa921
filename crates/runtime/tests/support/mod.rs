// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use codemachine_adapters::{AdapterError, EngineRunOptions, EngineRunResult, ParsedLine};
use codemachine_engine::EngineAdapter;
use codemachine_wire::{Directive, ProcessSignal};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A scripted engine adapter that never spawns a real subprocess; used to
/// exercise the Runner's scheduling loop deterministically.
///
/// Beyond the basic canned response, a `TestEngine` can stand in for the
/// agent side of the directive/signal protocol: it can write
/// `directive.json` as part of a `run()` call (once, or on every call, to
/// simulate a step whose agent keeps re-issuing the same directive until
/// the Runner's own counters exhaust it) and can push a `ProcessSignal`
/// onto the Runner's signal channel from inside `run()`, which lands in
/// the channel's buffer before the Runner ever blocks waiting for it.
pub struct TestEngine {
    id: &'static str,
    authenticated: AtomicBool,
    session_id: Option<&'static str>,
    invocations: Mutex<Vec<String>>,
    one_shot_directive: Mutex<Option<(PathBuf, String)>>,
    repeating_directive: Mutex<Option<(PathBuf, String)>>,
    signal_on_run: Mutex<Option<(mpsc::Sender<ProcessSignal>, ProcessSignal)>>,
}

impl TestEngine {
    pub fn new(id: &'static str, authenticated: bool) -> Arc<Self> {
        Arc::new(Self {
            id,
            authenticated: AtomicBool::new(authenticated),
            session_id: Some("sess-test"),
            invocations: Mutex::new(Vec::new()),
            one_shot_directive: Mutex::new(None),
            repeating_directive: Mutex::new(None),
            signal_on_run: Mutex::new(None),
        })
    }

    /// The stdin payload (prompt) handed to each `run()` call, in order.
    pub fn received_prompts(&self) -> Vec<String> {
        self.invocations.lock().expect("lock").clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().expect("lock").len()
    }

    /// Writes `directive` to `path` once, on this engine's next `run()`
    /// call, then reverts to writing nothing (the Runner's own
    /// `reset_directive` before the call after that observes `continue`).
    pub fn queue_directive(&self, path: PathBuf, directive: &Directive) {
        let contents = serde_json::to_string(directive).expect("serialize directive");
        *self.one_shot_directive.lock().expect("lock") = Some((path, contents));
    }

    /// Writes `directive` to `path` on every `run()` call from now on —
    /// for a step whose agent re-issues the same `loop` directive each
    /// time it runs, relying on the Directive Processor's own iteration
    /// counter to eventually exhaust it.
    pub fn set_repeating_directive(&self, path: PathBuf, directive: &Directive) {
        let contents = serde_json::to_string(directive).expect("serialize directive");
        *self.repeating_directive.lock().expect("lock") = Some((path, contents));
    }

    /// Sends `signal` on `tx` once, from inside this engine's next `run()`
    /// call — lands in the channel before the Runner can possibly be
    /// blocked waiting on it, since nothing here actually runs
    /// concurrently with the Runner's own task.
    pub fn queue_signal(&self, tx: mpsc::Sender<ProcessSignal>, signal: ProcessSignal) {
        *self.signal_on_run.lock().expect("lock") = Some((tx, signal));
    }
}

fn write_directive_file(path: &std::path::Path, contents: &str) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, contents);
}

#[async_trait]
impl EngineAdapter for TestEngine {
    fn id(&self) -> &str {
        self.id
    }
    fn name(&self) -> &str {
        self.id
    }
    fn cli_binary(&self) -> &str {
        self.id
    }
    fn install_command(&self) -> &str {
        "install"
    }
    fn default_model(&self) -> &str {
        "test-model"
    }
    async fn check_auth(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
    async fn run(
        &self,
        options: EngineRunOptions,
        events: mpsc::Sender<ParsedLine>,
    ) -> Result<EngineRunResult, AdapterError> {
        self.invocations.lock().expect("lock").push(options.stdin_payload.clone().unwrap_or_default());

        if let Some((path, contents)) = self.one_shot_directive.lock().expect("lock").take() {
            write_directive_file(&path, &contents);
        }
        if let Some((path, contents)) = self.repeating_directive.lock().expect("lock").clone() {
            write_directive_file(&path, &contents);
        }
        let queued_signal = self.signal_on_run.lock().expect("lock").take();
        if let Some((tx, signal)) = queued_signal {
            let _ = tx.send(signal).await;
        }

        let _ = events.send(ParsedLine::Text("working".into())).await;
        Ok(EngineRunResult {
            session_id: self.session_id.map(str::to_string),
            captured_error: None,
            exit_code: Some(0),
        })
    }
}

pub fn write(dir: &std::path::Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, contents).expect("write fixture");
}

/// Writes a two-module-step template with no chained prompts, matching
/// scenario S1's shape.
pub fn two_step_template(dir: &std::path::Path) {
    write(dir, "a.md", "do step a");
    write(dir, "b.md", "do step b");
    write(
        dir,
        "template.toml",
        r#"
        [[step]]
        kind = "module"
        name = "a"
        prompts = ["a.md"]
        interactive = false

        [[step]]
        kind = "module"
        name = "b"
        prompts = ["b.md"]
        interactive = false
        "#,
    );
}
