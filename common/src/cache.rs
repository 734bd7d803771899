use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// A thread-safe map whose entries expire `ttl` after they were written.
/// Concurrent writers of the same key are fine: the last write wins.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache { ttl, entries: RwLock::new(HashMap::new()) }
    }

    /// The cached value, if present and not yet expired
    pub fn get<Q>(&self, key: &Q) -> Option<V>
        where K: Borrow<Q>, Q: Hash + Eq + ?Sized
    {
        let entries = self.entries.read();

        entries.get(key)
            .filter(|(written, _)| written.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.write();
        let ttl = self.ttl;

        entries.retain(|_, (written, _)| written.elapsed() < ttl);
        entries.insert(key, (Instant::now(), value));
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}
