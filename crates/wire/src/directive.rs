// SPDX-License-Identifier: MIT

//! `.codemachine/memory/directive.json` — the wire shape an agent writes to
//! request loop/trigger/checkpoint/error control flow. The Runner rewrites
//! this file to `{"action": "continue"}` before every step invocation so a
//! stale directive from a prior turn is never reread.

use codemachine_core::AgentId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Directive {
    Continue,
    Loop {
        steps_back: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skip: Option<Vec<AgentId>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Trigger {
        agent_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Checkpoint {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("failed to read {path}: {source}")]
    Read { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: std::path::PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse directive at {path}: {source}")]
    Parse { path: std::path::PathBuf, #[source] source: serde_json::Error },
}

/// Reads a directive file, treating a missing file as `Continue` (no
/// directive written this turn).
pub fn read_directive(path: &Path) -> Result<Directive, DirectiveError> {
    if !path.exists() {
        return Ok(Directive::Continue);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|source| DirectiveError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text).map_err(|source| DirectiveError::Parse { path: path.to_path_buf(), source })
}

/// Resets the directive file to `{"action": "continue"}`, called before
/// every step invocation so the next read never observes a stale directive.
pub fn reset_directive(path: &Path) -> Result<(), DirectiveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| DirectiveError::Write { path: path.to_path_buf(), source })?;
    }
    let contents = serde_json::to_string(&Directive::Continue)
        .map_err(|source| DirectiveError::Parse { path: path.to_path_buf(), source })?;
    std::fs::write(path, contents).map_err(|source| DirectiveError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_reads_as_continue() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("directive.json");
        assert_eq!(read_directive(&path).unwrap(), Directive::Continue);
    }

    #[test]
    fn reset_then_read_round_trips_to_continue() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("memory/directive.json");
        reset_directive(&path).expect("reset");
        assert_eq!(read_directive(&path).unwrap(), Directive::Continue);
    }

    #[test]
    fn loop_directive_round_trips() {
        let directive = Directive::Loop {
            steps_back: 2,
            max_iterations: Some(3),
            skip: Some(vec![AgentId::new()]),
            reason: Some("retry".into()),
        };
        let json = serde_json::to_string(&directive).unwrap();
        let back: Directive = serde_json::from_str(&json).unwrap();
        assert_eq!(directive, back);
    }
}
