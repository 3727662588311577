use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::asset::AssetKey;

type LockTable = DashMap<AssetKey, Arc<Mutex<()>>>;

/// Per-key async mutexes.
///
/// Entries exist only while some task holds or waits for the key.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: Arc<LockTable>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: AssetKey) -> KeyGuard {
        let mutex = self.table.entry(key).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            table: Arc::clone(&self.table),
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Releases the key on drop and reclaims its table entry when unused.
pub struct KeyGuard {
    table: Arc<LockTable>,
    key: AssetKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
