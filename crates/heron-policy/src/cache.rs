//! Time-bounded memoization for expensive external answers.
//!
//! The fetch function decides how long its answer stays good by returning
//! `(ttl, value)`. Expired entries are swept on every miss, so memory stays
//! bounded without a background task.
//!
//! The cache is created once at startup and injected wherever it is needed.
//! One mutex serializes the lookup, the sweep and the insert. The fetch runs
//! outside the lock: two concurrent misses on the same key may both fetch,
//! and the later insert wins.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use heron_types::Clock;
use tracing::debug;

/// A cached value and the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub expires_at: DateTime<Utc>,
    pub value: V,
}

/// Process-wide TTL cache.
pub struct TtlCache<K, V> {
    label: &'static str,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(label: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            label,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `key`, or calls `fetch` and caches its
    /// answer. Failed fetches are not cached.
    pub fn get_or_fetch<E, F>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<(Duration, V), E>,
    {
        let now = self.clock.now();
        if let Some(entry) = self.lock().get(key) {
            if entry.expires_at > now {
                debug!(cache = self.label, key = %key, "cache hit");
                return Ok(entry.value.clone());
            }
        }

        debug!(cache = self.label, key = %key, "cache miss");
        let (ttl, value) = fetch()?;

        let now = self.clock.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let swept = before - entries.len();
        if swept > 0 {
            debug!(cache = self.label, swept, "swept expired entries");
        }
        entries.insert(
            key.clone(),
            CacheEntry {
                expires_at,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
