// SPDX-License-Identifier: MIT

//! Versioned envelope `{v, seq, state}` and the migration seam for
//! upgrading an on-disk `template.json` written by an older build.

use serde_json::Value;
use thiserror::Error;

pub const CURRENT_VERSION: u32 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than this build supports ({1})")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

/// One version-to-version transform of the envelope's `state` value.
pub trait Migration: Send + Sync {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, state: &mut Value) -> Result<(), MigrationError>;
}

/// Upgrades `completed_steps: Vec<usize>` (legacy) to the record form with
/// empty session fields and a synthetic `completed_at = now`.
struct LegacyCompletedStepsList {
    now_rfc3339: String,
}

impl Migration for LegacyCompletedStepsList {
    fn source_version(&self) -> u32 {
        1
    }

    fn target_version(&self) -> u32 {
        2
    }

    fn migrate(&self, state: &mut Value) -> Result<(), MigrationError> {
        let Some(obj) = state.as_object_mut() else { return Ok(()) };
        let Some(Value::Array(legacy)) = obj.remove("completed_steps") else { return Ok(()) };

        let mut upgraded = serde_json::Map::new();
        for entry in legacy {
            if let Some(idx) = entry.as_u64() {
                upgraded.insert(
                    idx.to_string(),
                    serde_json::json!({ "completed_at": self.now_rfc3339 }),
                );
            }
        }
        obj.insert("completed_steps".into(), Value::Object(upgraded));
        Ok(())
    }
}

pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new(now_rfc3339: impl Into<String>) -> Self {
        Self {
            migrations: vec![Box::new(LegacyCompletedStepsList { now_rfc3339: now_rfc3339.into() })],
        }
    }

    /// Applies the chain of single-step migrations from `envelope`'s
    /// current version to `target`. A same-version envelope is returned
    /// unchanged.
    pub fn migrate_to(&self, mut envelope: Value, target: u32) -> Result<Value, MigrationError> {
        let mut version = envelope
            .get("v")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(1);

        if version == target {
            return Ok(envelope);
        }
        if version > target {
            return Err(MigrationError::TooNew(version, target));
        }

        while version != target {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == version)
                .ok_or(MigrationError::NoPath(version, target))?;

            if let Some(state) = envelope.get_mut("state") {
                step.migrate(state)?;
            }
            version = step.target_version();
            envelope["v"] = Value::from(version);
        }

        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> MigrationRegistry {
        MigrationRegistry::new("2026-01-01T00:00:00Z")
    }

    #[test]
    fn same_version_is_noop() {
        let envelope = json!({"v": 2, "seq": 1, "state": {}});
        let result = registry().migrate_to(envelope.clone(), 2).unwrap();
        assert_eq!(result, envelope);
    }

    #[test]
    fn too_new_errors() {
        let envelope = json!({"v": 99, "seq": 1, "state": {}});
        assert_eq!(registry().migrate_to(envelope, 2), Err(MigrationError::TooNew(99, 2)));
    }

    #[test]
    fn no_path_errors_for_unregistered_jump() {
        let envelope = json!({"v": 1, "seq": 1, "state": {}});
        assert_eq!(registry().migrate_to(envelope, 5), Err(MigrationError::NoPath(2, 5)));
    }

    #[test]
    fn legacy_completed_steps_list_upgrades_to_record_map() {
        let envelope = json!({
            "v": 1,
            "seq": 7,
            "state": { "completed_steps": [0, 2] }
        });
        let result = registry().migrate_to(envelope, 2).unwrap();
        assert_eq!(result["v"], 2);
        assert_eq!(result["seq"], 7);
        assert_eq!(result["state"]["completed_steps"]["0"]["completed_at"], "2026-01-01T00:00:00Z");
        assert_eq!(result["state"]["completed_steps"]["2"]["completed_at"], "2026-01-01T00:00:00Z");
    }
}
