// SPDX-License-Identifier: MIT

//! The Mistral Vibe CLI engine adapter.
//!
//! Vibe never prints its own `session_id` on stdout; the id is recovered
//! from its on-disk session log after the process exits.

use crate::registry::EngineAdapter;
use async_trait::async_trait;
use codemachine_adapters::{
    run_engine, session_recovery::recover_vibe_session_id, AdapterError, EngineRunOptions,
    EngineRunResult, ParsedLine,
};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::mpsc;

const CLI_BINARY: &str = "vibe";

pub struct VibeEngine {
    vibe_home: PathBuf,
}

impl VibeEngine {
    pub fn new(vibe_home: PathBuf) -> Self {
        Self { vibe_home }
    }

    pub fn from_env() -> Self {
        let vibe_home = std::env::var("VIBE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::home_dir().unwrap_or_default().join(".vibe"));
        Self::new(vibe_home)
    }
}

#[async_trait]
impl EngineAdapter for VibeEngine {
    fn id(&self) -> &str {
        "vibe"
    }

    fn name(&self) -> &str {
        "Mistral Vibe"
    }

    fn cli_binary(&self) -> &str {
        CLI_BINARY
    }

    fn install_command(&self) -> &str {
        "pip install mistral-vibe"
    }

    fn default_model(&self) -> &str {
        "codestral-latest"
    }

    async fn check_auth(&self) -> bool {
        tokio::process::Command::new(CLI_BINARY)
            .arg("auth")
            .arg("status")
            .output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    async fn run(
        &self,
        options: EngineRunOptions,
        events: mpsc::Sender<ParsedLine>,
    ) -> Result<EngineRunResult, AdapterError> {
        let started_at = SystemTime::now();
        let mut result = run_engine(options, events).await?;
        if result.session_id.is_none() {
            result.session_id = recover_vibe_session_id(&self.vibe_home, started_at)?;
        }
        Ok(result)
    }
}
