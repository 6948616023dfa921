// SPDX-License-Identifier: MIT

//! Signal Manager: translates process-level signals into cancellation of
//! the currently running step and/or an FSM-visible effect.

use codemachine_wire::ProcessSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalEffect {
    Paused,
    /// `true` if this is a duplicate skip within the same abort window,
    /// already coalesced into the first.
    Skipped { coalesced: bool },
    StopRequested,
    /// A second stop signal after the first already drove the workflow to
    /// `Stopped` — the caller should exit the process immediately.
    ExitNow,
    ModeChanged { autonomous: bool, aborted_current: bool },
    InputReceived { prompt: Option<String>, skip: bool },
    CheckpointResume,
    CheckpointQuit,
}

/// Owns the single cancellation token shared by the step lifecycle and
/// every signal handler. Replacing the token (via
/// [`SignalManager::begin_step`]) is how the manager resets cancellation
/// state between steps without the previous step's abort leaking forward.
pub struct SignalManager {
    cancel: Mutex<CancellationToken>,
    paused: AtomicBool,
    autonomous: AtomicBool,
    stop_stage: AtomicU8,
    skip_pending: AtomicBool,
    cleanup: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl SignalManager {
    pub fn new(autonomous: bool) -> Self {
        Self {
            cancel: Mutex::new(CancellationToken::new()),
            paused: AtomicBool::new(false),
            autonomous: AtomicBool::new(autonomous),
            stop_stage: AtomicU8::new(0),
            skip_pending: AtomicBool::new(false),
            cleanup: Mutex::new(None),
        }
    }

    /// Issues a fresh cancellation token for the next step invocation,
    /// clearing any skip coalescing left over from the previous one.
    pub fn begin_step(&self) -> CancellationToken {
        self.skip_pending.store(false, Ordering::SeqCst);
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_autonomous(&self) -> bool {
        self.autonomous.load(Ordering::SeqCst)
    }

    pub fn set_cleanup_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.cleanup.lock() = Some(Box::new(hook));
    }

    /// Runs the before-cleanup callback, if one is registered. Called by a
    /// Ctrl-C handler (or the second stop stage) before process exit so
    /// the last known session/monitoring ids are persisted.
    pub fn run_cleanup(&self) {
        if let Some(hook) = self.cleanup.lock().as_ref() {
            hook();
        }
    }

    fn cancel_current(&self) {
        self.cancel.lock().cancel();
    }

    pub fn handle(&self, signal: ProcessSignal) -> SignalEffect {
        match signal {
            ProcessSignal::Pause => {
                self.paused.store(true, Ordering::SeqCst);
                self.cancel_current();
                SignalEffect::Paused
            }
            ProcessSignal::Skip => {
                let coalesced = self.skip_pending.swap(true, Ordering::SeqCst);
                if !coalesced {
                    self.cancel_current();
                }
                SignalEffect::Skipped { coalesced }
            }
            ProcessSignal::Stop => {
                let prev = self.stop_stage.fetch_add(1, Ordering::SeqCst);
                self.cancel_current();
                if prev >= 1 {
                    SignalEffect::ExitNow
                } else {
                    SignalEffect::StopRequested
                }
            }
            ProcessSignal::ModeChange { autonomous } => {
                let was_autonomous = self.autonomous.swap(autonomous, Ordering::SeqCst);
                let aborted_current = was_autonomous && !autonomous;
                if aborted_current {
                    self.cancel_current();
                }
                SignalEffect::ModeChanged { autonomous, aborted_current }
            }
            ProcessSignal::Input { prompt, skip } => SignalEffect::InputReceived { prompt, skip },
            ProcessSignal::CheckpointContinue => SignalEffect::CheckpointResume,
            ProcessSignal::CheckpointQuit => SignalEffect::CheckpointQuit,
        }
    }
}
