use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// A read/write lock per key (e.g., upload identifier).
///
/// Readers of one key run concurrently, a writer excludes everyone else on
/// that key, and distinct keys never contend.
#[derive(Debug, Clone)]
pub struct KeyedLock {
    locks: Arc<DashMap<String, Arc<RwLock<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    fn entry(&self, key: &str) -> Arc<RwLock<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .value()
            .clone()
    }

    /// Acquires the shared side of the lock for `key`.
    pub async fn read(&self, key: &str) -> OwnedRwLockReadGuard<()> {
        // The shard guard from `entry` is released before awaiting
        let lock = self.entry(key);
        lock.read_owned().await
    }

    /// Acquires the exclusive side of the lock for `key`.
    pub async fn write(&self, key: &str) -> OwnedRwLockWriteGuard<()> {
        let lock = self.entry(key);
        lock.write_owned().await
    }

    /// Drops entries nobody holds or waits on.
    pub fn cleanup(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for KeyedLock {
    fn default() -> Self {
        Self::new()
    }
}
