// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! codemachine-engine: the Engine Registry, its auth-check cache, and the
//! concrete engine adapters it discovers by default.

pub mod auth_cache;
pub mod claude;
pub mod registry;
pub mod vibe;

pub use auth_cache::{AuthCache, AUTH_CACHE_TTL};
pub use claude::ClaudeEngine;
pub use registry::{EngineAdapter, EngineRegistry};
pub use vibe::VibeEngine;

use std::sync::Arc;

/// Registers the built-in engines in their discovery order: Claude Code
/// first (the default when both are authenticated), then Mistral Vibe.
pub fn default_registry() -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    registry.register(Arc::new(ClaudeEngine::new()));
    registry.register(Arc::new(VibeEngine::from_env()));
    registry
}
