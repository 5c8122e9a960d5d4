//! The pluggable cache backend. [`executor::cache::CachingExecutor`] only
//! depends on the [`Cache`] trait, so callers can swap in a shared/remote
//! cache without touching the decorator itself.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::message::Message;

/// A key/value store keyed by [`crate::message::Query::cache_key`], values
/// expiring after their own TTL.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Message>;
    fn set(&self, key: &str, value: Message, ttl: Duration);
}

struct Entry {
    value: Message,
    expires_at: Instant,
}

/// An in-process cache good enough for a single resolver instance. Expired
/// entries are reaped lazily, on the next `get`/`set` that touches them.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Message> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Message, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry { value, expires_at: Instant::now() + ttl },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Query, RecordType};

    #[test]
    fn stores_and_retrieves() {
        let cache = MemoryCache::new();
        let message = Message::create_request(Query::new("example.com", RecordType::A));
        cache.set("k", message.clone(), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(message));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = MemoryCache::new();
        let message = Message::create_request(Query::new("example.com", RecordType::A));
        cache.set("k", message, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn missing_key_is_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("nope"), None);
    }
}
