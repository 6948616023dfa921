// SPDX-License-Identifier: MIT

//! The Anthropic Claude Code CLI engine adapter.

use crate::registry::EngineAdapter;
use async_trait::async_trait;
use codemachine_adapters::{run_engine, AdapterError, EngineRunOptions, EngineRunResult, ParsedLine};
use tokio::sync::mpsc;

const CLI_BINARY: &str = "claude";

pub struct ClaudeEngine {
    auth_env_vars: Vec<&'static str>,
}

impl ClaudeEngine {
    pub fn new() -> Self {
        Self { auth_env_vars: vec!["ANTHROPIC_API_KEY", "ANTHROPIC_AUTH_TOKEN", "CLAUDE_CODE_OAUTH_TOKEN"] }
    }

    fn has_credentials(&self) -> bool {
        self.auth_env_vars.iter().any(|name| std::env::var(name).is_ok_and(|v| !v.is_empty()))
    }
}

impl Default for ClaudeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineAdapter for ClaudeEngine {
    fn id(&self) -> &str {
        "claude"
    }

    fn name(&self) -> &str {
        "Claude Code"
    }

    fn cli_binary(&self) -> &str {
        CLI_BINARY
    }

    fn install_command(&self) -> &str {
        "npm install -g @anthropic-ai/claude-code"
    }

    fn default_model(&self) -> &str {
        "claude-sonnet-4-5"
    }

    async fn check_auth(&self) -> bool {
        if self.has_credentials() {
            return true;
        }
        // Covers the subscription-login path, which never sets an env var.
        tokio::process::Command::new(CLI_BINARY)
            .arg("--version")
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
        run_engine(options, events).await
    }
}
