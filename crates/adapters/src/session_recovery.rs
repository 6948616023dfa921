// SPDX-License-Identifier: MIT

//! Session-id recovery for engines (namely Mistral Vibe) that never emit
//! `session_id` inline on stdout. On exit, the newest session log file
//! written since the invocation started is assumed to be this run's.

use crate::error::AdapterError;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Scans `<vibe_home>/logs/session/session_*.json` for files with
/// `mtime >= started_at`, sorted descending, and returns
/// `metadata.session_id` from the newest.
pub fn recover_vibe_session_id(
    vibe_home: &Path,
    started_at: SystemTime,
) -> Result<Option<String>, AdapterError> {
    let session_dir = vibe_home.join("logs").join("session");
    if !session_dir.exists() {
        return Ok(None);
    }

    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&session_dir).map_err(AdapterError::SessionRecovery)? {
        let entry = entry.map_err(AdapterError::SessionRecovery)?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !(name.starts_with("session_") && name.ends_with(".json")) {
            continue;
        }
        let metadata = entry.metadata().map_err(AdapterError::SessionRecovery)?;
        let mtime = metadata.modified().map_err(AdapterError::SessionRecovery)?;
        if mtime >= started_at {
            candidates.push((mtime, path));
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let Some((_, newest)) = candidates.into_iter().next() else { return Ok(None) };
    let text = std::fs::read_to_string(&newest).map_err(AdapterError::SessionRecovery)?;
    let value: serde_json::Value = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);
    Ok(value.pointer("/metadata/session_id").and_then(|v| v.as_str()).map(str::to_string))
}
