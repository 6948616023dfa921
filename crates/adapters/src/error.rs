// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("engine binary not found: {binary}. {install_hint}")]
    NotInstalled { binary: String, install_hint: String },

    #[error("engine exited with code {0}")]
    NonZeroExit(i32),

    #[error("engine reported an error: {0}")]
    CapturedError(String),

    #[error("engine invocation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("engine invocation was aborted")]
    Aborted,

    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to read session recovery logs: {0}")]
    SessionRecovery(#[source] std::io::Error),
}
