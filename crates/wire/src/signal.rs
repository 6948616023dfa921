// SPDX-License-Identifier: MIT

//! Process-level signals the Signal Manager listens for.

use serde::{Deserialize, Serialize};

/// A signal delivered to the running workflow from outside the process
/// (a terminal handler, an IPC peer, or a test harness).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum ProcessSignal {
    Pause,
    Skip,
    Stop,
    ModeChange { autonomous: bool },
    Input { #[serde(default, skip_serializing_if = "Option::is_none")] prompt: Option<String>, #[serde(default)] skip: bool },
    CheckpointContinue,
    CheckpointQuit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_change_round_trips() {
        let signal = ProcessSignal::ModeChange { autonomous: true };
        let json = serde_json::to_value(&signal).unwrap();
        assert_eq!(json["signal"], "mode_change");
        let back: ProcessSignal = serde_json::from_value(json).unwrap();
        assert_eq!(signal, back);
    }

    #[test]
    fn input_defaults_skip_to_false() {
        let value = serde_json::json!({"signal": "input", "prompt": "go"});
        let signal: ProcessSignal = serde_json::from_value(value).unwrap();
        assert_eq!(signal, ProcessSignal::Input { prompt: Some("go".into()), skip: false });
    }
}
