//! Per-directory mutual exclusion
//!
//! Mutation of a single directory's child list (add/remove/materialize) must
//! be mutually exclusive, while operations on different directories proceed
//! fully in parallel. Each directory gets its own async mutex because DHT
//! round trips are awaited while the directory is held; the syncer takes the
//! same locks as ordinary filesystem calls.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::types::NodeId;

/// Per-directory lock manager.
///
/// Locks are created lazily on first use and shared by `Arc`, so guards can
/// be held across await points.
pub struct DirLockManager {
    locks: RwLock<HashMap<NodeId, Arc<Mutex<()>>>>,
}

impl DirLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for a directory.
    pub fn lock_for(&self, dir: NodeId) -> Arc<Mutex<()>> {
        // Fast path: lock already exists (read lock for map lookup)
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(&dir) {
                return lock.clone();
            }
        }

        // Double-check after acquiring the write lock; another thread may
        // have created it in between.
        let mut map = self.locks.write();
        map.entry(dir)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for a directory that left the tree.
    pub fn release(&self, dir: NodeId) {
        self.locks.write().remove(&dir);
    }
}

impl Default for DirLockManager {
    fn default() -> Self {
        Self::new()
    }
}
