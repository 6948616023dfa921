// SPDX-License-Identifier: MIT

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::ids::{AgentId, MonitoringId, SessionId};
use crate::status::AgentStatus;

/// Proptest strategies for core state machine types.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    pub fn arb_agent_status() -> impl Strategy<Value = AgentStatus> {
        prop_oneof![
            Just(AgentStatus::Pending),
            Just(AgentStatus::Running),
            Just(AgentStatus::Delegated),
            Just(AgentStatus::Awaiting),
            Just(AgentStatus::Completed),
            Just(AgentStatus::Failed),
            Just(AgentStatus::Skipped),
            Just(AgentStatus::Retrying),
        ]
    }
}

pub fn session_registered_event(agent_id: AgentId) -> crate::event::Event {
    crate::event::Event::SessionRegistered {
        agent_id,
        session_id: SessionId::new(),
        monitoring_id: MonitoringId::new(),
    }
}
