//! Direct strategy: one round trip per operation
//!
//! The first successful replica response is authoritative; no cross-replica
//! comparison takes place. This is the default for both contracts.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::dht::Dht;
use crate::error::StoreError;
use crate::types::Key;

use super::{bounded, DataStrategy, PathStrategy};

/// Direct content operations.
pub struct DirectDataOps {
    dht: Arc<dyn Dht>,
    op_timeout: Option<Duration>,
}

impl DirectDataOps {
    pub fn new(dht: Arc<dyn Dht>, op_timeout: Option<Duration>) -> Self {
        Self { dht, op_timeout }
    }
}

#[async_trait]
impl DataStrategy for DirectDataOps {
    async fn put_content(&self, key: Key, bytes: Vec<u8>) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.put_data(key, bytes)).await
    }

    async fn get_content(&self, key: Key) -> Result<Option<Vec<u8>>, StoreError> {
        bounded(self.op_timeout, self.dht.get_data(key)).await
    }

    async fn remove_content(&self, key: Key) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.remove_data(key)).await
    }
}

/// Direct path-index operations.
pub struct DirectPathOps {
    dht: Arc<dyn Dht>,
    op_timeout: Option<Duration>,
}

impl DirectPathOps {
    pub fn new(dht: Arc<dyn Dht>, op_timeout: Option<Duration>) -> Self {
        Self { dht, op_timeout }
    }
}

#[async_trait]
impl PathStrategy for DirectPathOps {
    async fn put_path_entry(&self, key: Key, path: &str) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.put_path(key, path.to_string())).await
    }

    async fn list_all_path_entries(&self) -> Result<BTreeSet<String>, StoreError> {
        let paths = bounded(self.op_timeout, self.dht.all_paths()).await?;
        Ok(paths.into_iter().collect())
    }

    async fn remove_path_entry(&self, key: Key) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.remove_path(key)).await
    }
}
