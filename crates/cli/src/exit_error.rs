// SPDX-License-Identifier: MIT

//! Custom error type that carries a process exit code.
//!
//! `main()` maps any error it receives down to this type so the process
//! exits with a code distinguishing a precondition failure from a mid-run
//! workflow error, instead of the blanket `1` `anyhow` would otherwise
//! produce.

use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<codemachine_runtime::WorkflowError> for ExitError {
    fn from(err: codemachine_runtime::WorkflowError) -> Self {
        let code = match &err {
            codemachine_runtime::WorkflowError::Precondition(_) => 2,
            codemachine_runtime::WorkflowError::NoAuthenticatedEngine => 3,
            _ => 1,
        };
        Self::new(code, err.to_string())
    }
}
