use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Volatile key/value cache shared across requests.
pub trait Cache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V);
    /// Drops every entry whose key starts with `prefix`, returning how many went.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// In-memory cache whose entries expire a fixed time after being written.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone + Send> Cache<V> for TtlCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: V) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}
