// SPDX-License-Identifier: MIT

//! Before-cleanup support: persists the last known session/monitoring ids
//! for every active root agent so a crash or Ctrl-C never loses a
//! recoverable step.

use codemachine_core::{MonitoringId, SessionId};
use codemachine_storage::IndexManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Tracks which module step each active session/monitoring id pair
/// belongs to, updated as soon as the Step Executor registers a session.
#[derive(Default)]
pub struct ActiveSessionTable {
    entries: Mutex<HashMap<usize, (SessionId, MonitoringId)>>,
}

impl ActiveSessionTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, module_index: usize, session_id: SessionId, monitoring_id: MonitoringId) {
        self.entries.lock().insert(module_index, (session_id, monitoring_id));
    }

    pub fn clear(&self, module_index: usize) {
        self.entries.lock().remove(&module_index);
    }

    fn snapshot(&self) -> Vec<(usize, SessionId, MonitoringId)> {
        self.entries.lock().iter().map(|(idx, (s, m))| (*idx, *s, *m)).collect()
    }
}

/// Flushes every tracked session to `index`, swallowing individual write
/// failures — cleanup runs at shutdown and must not panic or loop forever.
pub fn persist_active_sessions(index: &IndexManager, table: &ActiveSessionTable) {
    for (module_index, session_id, monitoring_id) in table.snapshot() {
        let _ = index.step_session_initialized(module_index, session_id, monitoring_id);
    }
}
