//! Per-key async mutexes
//!
//! Serializes work on one logical key (an account, a poll/participant pair)
//! while letting unrelated keys proceed concurrently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Number of idle entries tolerated before the table is pruned on lock.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. The lock is held until the guard
    /// is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        // Clone the Arc out so no map shard stays borrowed across the await.
        let mutex = Arc::clone(self.locks.entry(key.to_string()).or_default().value());
        mutex.lock_owned().await
    }

    /// Drop entries nobody currently holds or waits on.
    pub fn prune(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
