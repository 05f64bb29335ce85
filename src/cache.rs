//! In-process TTL cache for the availability endpoint.
//!
//! Availability is advisory; the authoritative capacity check happens in the
//! conditional reserve at purchase time, so serving a few-seconds-stale
//! snapshot is acceptable and keeps the hot read path off the database.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at: Instant,
}

#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            // Opportunistic sweep so expired entries don't accumulate
            let now = Instant::now();
            entries.retain(|_, e| e.expires_at > now);
            entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: now + ttl,
                },
            );
        }
    }

    /// Drop every entry whose key starts with the prefix. Used to invalidate
    /// an event's cached availability after a state change.
    pub fn invalidate_prefix(&self, prefix: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|k, _| !k.starts_with(prefix));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let cache = Cache::new();
        cache.set("a", serde_json::json!({"x": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("a"), Some(serde_json::json!({"x": 1})));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_expiry() {
        let cache = Cache::new();
        cache.set("a", serde_json::json!(1), Duration::from_millis(0));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_invalidate_prefix() {
        let cache = Cache::new();
        cache.set("avail:bx_evt_1", serde_json::json!(1), Duration::from_secs(60));
        cache.set("avail:bx_evt_2", serde_json::json!(2), Duration::from_secs(60));
        cache.invalidate_prefix("avail:bx_evt_1");
        assert_eq!(cache.get("avail:bx_evt_1"), None);
        assert_eq!(cache.get("avail:bx_evt_2"), Some(serde_json::json!(2)));
    }
}
