// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! codemachine-adapters: the Engine Runner — spawns an engine CLI,
//! normalizes and classifies its streaming-JSON output, extracts
//! telemetry, and recovers session ids for engines that never print one.

pub mod engine;
pub mod error;
pub mod normalize;
pub mod protocol;
pub mod session_recovery;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use engine::{run_engine, EngineRunOptions, EngineRunResult, DEFAULT_AGENT_TIMEOUT};
pub use error::AdapterError;
pub use protocol::{classify_line, ParsedLine, ToolNameTracker};
