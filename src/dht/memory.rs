//! In-process DHT implementation
//!
//! A single-process stand-in for the replicated store, used by tests and
//! local mounts. Several trees sharing one `MemoryDht` behave like peers
//! sharing one DHT. Replica divergence and remote failures can be injected
//! to exercise the consensus and versioned strategies and the syncer's
//! fail-stop behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::types::Key;

use super::Dht;

/// In-memory DHT with simulated replicas and write counters.
pub struct MemoryDht {
    replica_count: usize,
    data: RwLock<HashMap<Key, Vec<u8>>>,
    paths: RwLock<HashMap<Key, String>>,
    /// Injected per-key replica answers for the content slot
    divergent_data: RwLock<HashMap<Key, Vec<Option<Vec<u8>>>>>,
    /// Injected per-key replica answers for the path-index slot
    divergent_paths: RwLock<HashMap<Key, Vec<Option<String>>>>,
    data_put_counts: RwLock<HashMap<Key, u64>>,
    failing: AtomicBool,
}

impl MemoryDht {
    pub fn new() -> Self {
        Self::with_replicas(3)
    }

    pub fn with_replicas(replica_count: usize) -> Self {
        Self {
            replica_count,
            data: RwLock::new(HashMap::new()),
            paths: RwLock::new(HashMap::new()),
            divergent_data: RwLock::new(HashMap::new()),
            divergent_paths: RwLock::new(HashMap::new()),
            data_put_counts: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of times `put_data` has been issued for `key`.
    pub fn data_put_count(&self, key: &Key) -> u64 {
        self.data_put_counts.read().get(key).copied().unwrap_or(0)
    }

    /// Make every subsequent operation fail with `StoreError::Remote`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Pin the replica answers returned by `path_replicas` for `key`.
    pub fn set_path_replica_answers(&self, key: Key, answers: Vec<Option<String>>) {
        self.divergent_paths.write().insert(key, answers);
    }

    /// Pin the replica answers returned by `data_replicas` for `key`.
    pub fn set_data_replica_answers(&self, key: Key, answers: Vec<Option<Vec<u8>>>) {
        self.divergent_data.write().insert(key, answers);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Remote("injected failure".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryDht {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dht for MemoryDht {
    async fn put_data(&self, key: Key, value: Vec<u8>) -> Result<(), StoreError> {
        self.check()?;
        *self.data_put_counts.write().entry(key).or_insert(0) += 1;
        self.data.write().insert(key, value);
        Ok(())
    }

    async fn get_data(&self, key: Key) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        Ok(self.data.read().get(&key).cloned())
    }

    async fn remove_data(&self, key: Key) -> Result<(), StoreError> {
        self.check()?;
        self.data.write().remove(&key);
        Ok(())
    }

    async fn data_replicas(&self, key: Key) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        self.check()?;
        if let Some(answers) = self.divergent_data.read().get(&key) {
            return Ok(answers.clone());
        }
        let value = self.data.read().get(&key).cloned();
        Ok(vec![value; self.replica_count])
    }

    async fn put_path(&self, key: Key, path: String) -> Result<(), StoreError> {
        self.check()?;
        self.paths.write().insert(key, path);
        Ok(())
    }

    async fn get_path(&self, key: Key) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.paths.read().get(&key).cloned())
    }

    async fn remove_path(&self, key: Key) -> Result<(), StoreError> {
        self.check()?;
        self.paths.write().remove(&key);
        Ok(())
    }

    async fn path_replicas(&self, key: Key) -> Result<Vec<Option<String>>, StoreError> {
        self.check()?;
        if let Some(answers) = self.divergent_paths.read().get(&key) {
            return Ok(answers.clone());
        }
        let value = self.paths.read().get(&key).cloned();
        Ok(vec![value; self.replica_count])
    }

    async fn all_paths(&self) -> Result<Vec<String>, StoreError> {
        self.check()?;
        Ok(self.paths.read().values().cloned().collect())
    }
}
