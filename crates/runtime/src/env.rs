// SPDX-License-Identifier: MIT

//! Centralized environment-variable access, read once into a typed
//! [`Config`] at startup.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_AGENT_TIMEOUT_MS: u64 = 30 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub debug_logging: bool,
    pub home: Option<PathBuf>,
    pub claude_config_dir: Option<PathBuf>,
    pub vibe_home: Option<PathBuf>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_auth_token: Option<String>,
    pub claude_code_oauth_token: Option<String>,
    pub agent_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            debug_logging: debug_logging_enabled(),
            home: dirs::home_dir(),
            claude_config_dir: env_path("CLAUDE_CONFIG_DIR"),
            vibe_home: env_path("VIBE_HOME"),
            anthropic_api_key: env_string("ANTHROPIC_API_KEY"),
            anthropic_auth_token: env_string("ANTHROPIC_AUTH_TOKEN"),
            claude_code_oauth_token: env_string("CLAUDE_CODE_OAUTH_TOKEN"),
            agent_timeout: agent_timeout(),
        }
    }

    /// `.codemachine/` rooted at the given working directory.
    pub fn state_dir(cwd: &std::path::Path) -> PathBuf {
        cwd.join(".codemachine")
    }
}

fn debug_logging_enabled() -> bool {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_default();
    if log_level.eq_ignore_ascii_case("debug") {
        return true;
    }
    match std::env::var("DEBUG") {
        Ok(value) => is_truthy(&value),
        Err(_) => false,
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "False" | "FALSE")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_string(key).map(PathBuf::from)
}

fn agent_timeout() -> Duration {
    std::env::var("CODEMACHINE_AGENT_TIMEOUT")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(DEFAULT_AGENT_TIMEOUT_MS))
}
