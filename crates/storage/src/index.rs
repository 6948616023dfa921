// SPDX-License-Identifier: MIT

//! The Index Manager: owns `template.json` and the in-memory chained
//! prompt queue for the step currently being executed.

use crate::migration::{MigrationRegistry, CURRENT_VERSION};
use crate::model::{ControllerConfig, StepData, TemplateTracking};
use crate::resume::{compute_resume_info, ResumeInfo};
use chrono::Utc;
use codemachine_core::{MonitoringId, SessionId};
use codemachine_template::ChainedPrompt;
use parking_lot::Mutex;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, #[source] source: serde_json::Error },
    #[error("migration failed: {0}")]
    Migration(#[from] crate::migration::MigrationError),
}

struct QueueState {
    prompts: Vec<ChainedPrompt>,
    position: usize,
}

impl QueueState {
    fn empty() -> Self {
        Self { prompts: Vec::new(), position: 0 }
    }
}

/// Owns `.codemachine/template.json` and the active chained-prompt queue.
///
/// Every public mutator is a read-modify-write against the in-memory
/// snapshot followed by an atomic whole-file replacement: a crash between
/// the in-memory mutation and the write never reaches disk, so
/// [`compute_resume_info`] always recomputes the replay point from the last
/// successful write.
pub struct IndexManager {
    path: PathBuf,
    tracking: Mutex<TemplateTracking>,
    queue: Mutex<QueueState>,
}

impl IndexManager {
    /// Loads `template.json` from `state_dir` if present, upgrading a
    /// legacy envelope through [`MigrationRegistry`]; otherwise starts a
    /// fresh tracking document for `active_template`.
    pub fn load_or_init(state_dir: &Path, active_template: &str) -> Result<Self, StorageError> {
        let path = state_dir.join("template.json");
        let tracking = if path.exists() {
            Self::read_tracking(&path)?
        } else {
            TemplateTracking::new(active_template, Utc::now())
        };
        Ok(Self { path, tracking: Mutex::new(tracking), queue: Mutex::new(QueueState::empty()) })
    }

    fn read_tracking(path: &Path) -> Result<TemplateTracking, StorageError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| StorageError::Read { path: path.to_path_buf(), source })?;
        let envelope: Value = serde_json::from_str(&text)
            .map_err(|source| StorageError::Parse { path: path.to_path_buf(), source })?;

        let registry = MigrationRegistry::new(Utc::now().to_rfc3339());
        let migrated = registry.migrate_to(envelope, CURRENT_VERSION)?;

        let state = migrated.get("state").cloned().unwrap_or(Value::Null);
        serde_json::from_value(state)
            .map_err(|source| StorageError::Parse { path: path.to_path_buf(), source })
    }

    fn persist(&self, tracking: &TemplateTracking) -> Result<(), StorageError> {
        let envelope = serde_json::json!({
            "v": CURRENT_VERSION,
            "seq": 0,
            "state": tracking,
        });
        let serialized = serde_json::to_vec_pretty(&envelope)
            .map_err(|source| StorageError::Parse { path: self.path.clone(), source })?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|source| StorageError::Write { path: self.path.clone(), source })?;

        let tmp_path = parent.join(format!(
            ".template.json.tmp.{}",
            std::process::id()
        ));
        {
            let mut tmp = std::fs::File::create(&tmp_path)
                .map_err(|source| StorageError::Write { path: tmp_path.clone(), source })?;
            tmp.write_all(&serialized)
                .map_err(|source| StorageError::Write { path: tmp_path.clone(), source })?;
            tmp.sync_all().map_err(|source| StorageError::Write { path: tmp_path.clone(), source })?;
        }
        std::fs::rename(&tmp_path, &self.path)
            .map_err(|source| StorageError::Write { path: self.path.clone(), source })?;
        Ok(())
    }

    fn with_tracking<T>(
        &self,
        f: impl FnOnce(&mut TemplateTracking) -> T,
    ) -> Result<T, StorageError> {
        let mut tracking = self.tracking.lock();
        let result = f(&mut tracking);
        tracking.last_updated = Utc::now();
        self.persist(&tracking)?;
        Ok(result)
    }

    pub fn step_started(&self, module_index: usize) -> Result<(), StorageError> {
        self.with_tracking(|t| {
            t.completed_steps.entry(module_index).or_default();
            if !t.not_completed_steps.contains(&module_index) {
                t.not_completed_steps.push(module_index);
            }
        })
    }

    pub fn step_session_initialized(
        &self,
        module_index: usize,
        session_id: SessionId,
        monitoring_id: MonitoringId,
    ) -> Result<(), StorageError> {
        self.with_tracking(|t| {
            let entry = t.completed_steps.entry(module_index).or_default();
            entry.session_id = Some(session_id);
            entry.monitoring_id = Some(monitoring_id);
        })
    }

    pub fn chain_completed(&self, module_index: usize, chain_index: usize) -> Result<(), StorageError> {
        self.with_tracking(|t| {
            let entry = t.completed_steps.entry(module_index).or_default();
            let chains = entry.completed_chains.get_or_insert_with(Vec::new);
            if !chains.contains(&chain_index) {
                chains.push(chain_index);
            }
        })
    }

    pub fn step_completed(&self, module_index: usize) -> Result<(), StorageError> {
        self.with_tracking(|t| {
            let now = Utc::now();
            let entry = t.completed_steps.entry(module_index).or_default();
            entry.completed_at = Some(now);
            entry.completed_chains = None;
            t.not_completed_steps.retain(|i| *i != module_index);
        })
    }

    pub fn get_step_data(&self, module_index: usize) -> Option<StepData> {
        self.tracking.lock().completed_steps.get(&module_index).cloned()
    }

    pub fn get_resume_info(&self) -> ResumeInfo {
        compute_resume_info(&self.tracking.lock())
    }

    pub fn set_controller(&self, config: ControllerConfig) -> Result<(), StorageError> {
        self.with_tracking(|t| t.controller_config = Some(config))
    }

    pub fn snapshot(&self) -> TemplateTracking {
        self.tracking.lock().clone()
    }

    // ── Prompt queue ─────────────────────────────────────────────

    pub fn init_queue(&self, prompts: Vec<ChainedPrompt>, from_index: usize) {
        let mut queue = self.queue.lock();
        queue.prompts = prompts;
        queue.position = from_index.min(queue.prompts.len());
    }

    pub fn advance_queue(&self) {
        let mut queue = self.queue.lock();
        if queue.position < queue.prompts.len() {
            queue.position += 1;
        }
    }

    pub fn reset_queue(&self) {
        let mut queue = self.queue.lock();
        queue.prompts.clear();
        queue.position = 0;
    }

    pub fn is_queue_exhausted(&self) -> bool {
        let queue = self.queue.lock();
        queue.position >= queue.prompts.len()
    }

    pub fn get_current_queued_prompt(&self) -> Option<ChainedPrompt> {
        let queue = self.queue.lock();
        queue.prompts.get(queue.position).cloned()
    }

    pub fn is_queued_prompt(&self, input: &str) -> bool {
        self.get_current_queued_prompt().is_some_and(|p| p.content == input)
    }
}
