// SPDX-License-Identifier: MIT

//! The Engine Registry: a discovery-ordered list of engine descriptors.
//! The first-registered engine is the default.

use async_trait::async_trait;
use codemachine_adapters::{AdapterError, EngineRunOptions, EngineRunResult, ParsedLine};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Capability set every supported engine CLI satisfies.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn cli_binary(&self) -> &str;
    fn install_command(&self) -> &str;
    fn default_model(&self) -> &str;

    /// Probes whether the engine is currently authenticated. May spawn a
    /// subprocess and block for tens of seconds; callers should go through
    /// [`AuthCache`] rather than call this directly on a hot path.
    async fn check_auth(&self) -> bool;

    /// Runs the engine, forwarding each classified stdout line on `events`
    /// as it streams so the Step Executor can publish UI events live.
    async fn run(
        &self,
        options: EngineRunOptions,
        events: mpsc::Sender<ParsedLine>,
    ) -> Result<EngineRunResult, AdapterError>;

    /// Engines that support pushing configuration for additional sub-agents
    /// (most don't) override this; the default is a no-op.
    async fn sync_config(&self, _additional_agents: &[String]) -> Result<(), AdapterError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn EngineAdapter>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self { engines: Vec::new() }
    }

    /// Registers an engine. The first one ever registered becomes
    /// [`EngineRegistry::default_engine`].
    pub fn register(&mut self, engine: Arc<dyn EngineAdapter>) {
        self.engines.push(engine);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.iter().find(|e| e.id() == id).cloned()
    }

    pub fn default_engine(&self) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.first().cloned()
    }

    /// Discovery order: the order engines were registered in.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn EngineAdapter>> {
        self.engines.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemachine_adapters::EngineRunOptions;

    struct StubEngine {
        id: &'static str,
        authenticated: bool,
    }

    #[async_trait]
    impl EngineAdapter for StubEngine {
        fn id(&self) -> &str {
            self.id
        }
        fn name(&self) -> &str {
            self.id
        }
        fn cli_binary(&self) -> &str {
            self.id
        }
        fn install_command(&self) -> &str {
            "install"
        }
        fn default_model(&self) -> &str {
            "default"
        }
        async fn check_auth(&self) -> bool {
            self.authenticated
        }
        async fn run(
            &self,
            _options: EngineRunOptions,
            _events: mpsc::Sender<ParsedLine>,
        ) -> Result<EngineRunResult, AdapterError> {
            Ok(EngineRunResult::default())
        }
    }

    #[test]
    fn first_registered_is_default() {
        let mut registry = EngineRegistry::new();
        registry.register(Arc::new(StubEngine { id: "claude", authenticated: true }));
        registry.register(Arc::new(StubEngine { id: "vibe", authenticated: true }));
        assert_eq!(registry.default_engine().unwrap().id(), "claude");
    }

    #[test]
    fn lookup_by_id() {
        let mut registry = EngineRegistry::new();
        registry.register(Arc::new(StubEngine { id: "claude", authenticated: true }));
        assert!(registry.get("claude").is_some());
        assert!(registry.get("missing").is_none());
    }
}
