//! Per-key locks for index mutations
//!
//! Every mutation locks the paths it touches, reads the entries, then locks
//! the identities those entries resolve to. Keys are taken in [`LockKey`]
//! order (all paths sort before all identities), so two operations can never
//! wait on each other in a cycle.

use muman_core::ContentId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table entries above which idle locks are pruned
const PRUNE_THRESHOLD: usize = 1024;

/// A lockable key. Derived `Ord` places every `Path` before every `Track`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Path(PathBuf),
    Track(ContentId),
}

/// Guards for a set of keys, released on drop
#[derive(Debug)]
pub struct KeyGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Table of lazily created async mutexes, one per key
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every key in `keys`, sorted and deduplicated
    pub async fn lock(&self, keys: impl IntoIterator<Item = LockKey>) -> KeyGuard {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self.mutex_for(key);
            guards.push(mutex.lock_owned().await);
        }
        KeyGuard { _guards: guards }
    }

    fn mutex_for(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.len() >= PRUNE_THRESHOLD {
            table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        }
        Arc::clone(table.entry(key).or_default())
    }

    /// Number of keys currently in the table
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn paths_order_before_tracks() {
        let track = LockKey::Track(ContentId::from_bytes([0; 32]));
        let path = LockKey::Path(PathBuf::from("/zzz"));
        assert!(path < track);
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let key = LockKey::Path(PathBuf::from("/music/a.mp3"));

        let guard = locks.lock([key.clone()]).await;
        let contender = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.lock([key]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_keys_do_not_self_deadlock() {
        let locks = KeyedLocks::new();
        let key = LockKey::Path(PathBuf::from("/music/a.mp3"));
        let _guard = locks.lock([key.clone(), key]).await;
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn idle_locks_are_pruned() {
        let locks = KeyedLocks::new();
        for i in 0..PRUNE_THRESHOLD + 10 {
            let _guard = locks
                .lock([LockKey::Path(PathBuf::from(format!("/music/{i}.mp3")))])
                .await;
        }
        assert!(locks.len() < PRUNE_THRESHOLD);
    }
}
