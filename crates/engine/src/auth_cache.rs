// SPDX-License-Identifier: MIT

//! Auth-check result cache, keyed by engine id, TTL 5 minutes.
//!
//! Auth checks may block on subprocess spawns for tens of seconds; caching
//! is mandatory. A stale cache entry is acceptable — an auth failure still
//! surfaces at invocation time regardless of what the cache last reported.

use codemachine_core::Clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

pub const AUTH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    is_authenticated: bool,
    checked_at_ms: u64,
}

pub struct AuthCache<C: Clock> {
    clock: C,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<C: Clock> AuthCache<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached result for `engine_id` if present and within TTL.
    pub fn get(&self, engine_id: &str) -> Option<bool> {
        let entries = self.entries.lock();
        let entry = entries.get(engine_id)?;
        let age_ms = self.clock.epoch_ms().saturating_sub(entry.checked_at_ms);
        if age_ms > AUTH_CACHE_TTL.as_millis() as u64 {
            return None;
        }
        Some(entry.is_authenticated)
    }

    pub fn set(&self, engine_id: &str, is_authenticated: bool) {
        self.entries.lock().insert(
            engine_id.to_string(),
            CacheEntry { is_authenticated, checked_at_ms: self.clock.epoch_ms() },
        );
    }

    pub fn invalidate(&self, engine_id: &str) {
        self.entries.lock().remove(engine_id);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemachine_core::FakeClock;

    #[test]
    fn fresh_entry_is_returned() {
        let cache = AuthCache::new(FakeClock::new());
        cache.set("claude", true);
        assert_eq!(cache.get("claude"), Some(true));
    }

    #[test]
    fn expired_entry_returns_none() {
        let clock = FakeClock::new();
        let cache = AuthCache::new(clock.clone());
        cache.set("claude", true);
        clock.advance(AUTH_CACHE_TTL + Duration::from_secs(1));
        assert_eq!(cache.get("claude"), None);
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache = AuthCache::new(FakeClock::new());
        cache.set("claude", true);
        cache.set("vibe", false);
        cache.invalidate("claude");
        assert_eq!(cache.get("claude"), None);
        assert_eq!(cache.get("vibe"), Some(false));
    }

    #[test]
    fn clear_removes_everything() {
        let cache = AuthCache::new(FakeClock::new());
        cache.set("claude", true);
        cache.set("vibe", false);
        cache.clear();
        assert_eq!(cache.get("claude"), None);
        assert_eq!(cache.get("vibe"), None);
    }
}
