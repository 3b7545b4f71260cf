//! DHT collaborator boundary
//!
//! The network side of the distributed hash table (routing, peer discovery,
//! NAT traversal) lives behind the [`Dht`] trait. Each key owns two
//! independent slots: a content slot holding opaque bytes and a path-index
//! slot holding the literal path string. The path-index slot exists because
//! the DHT offers no prefix scan by key; enumerating it is the only way to
//! discover the namespace.
//!
//! Every operation is logically asynchronous. Callers in this crate await
//! each returned future to completion before their enclosing tree operation
//! returns; there is no timeout unless the mount configuration opts into a
//! bounded wait. An unresponsive remote peer therefore stalls the calling
//! filesystem call indefinitely by default.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::Key;

pub use memory::MemoryDht;

/// Replicated key/value store shared among cooperating peers.
///
/// Implementations must tolerate idempotent re-issue of `put_data` for a key
/// that already holds a value; the tree layer enforces the "exists, so skip"
/// rule itself and will simply not call `put_data` in that case.
#[async_trait]
pub trait Dht: Send + Sync {
    /// Store `value` in the content slot for `key`.
    async fn put_data(&self, key: Key, value: Vec<u8>) -> Result<(), StoreError>;

    /// Read the content slot for `key`. First successful replica response.
    async fn get_data(&self, key: Key) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove the content slot for `key`.
    async fn remove_data(&self, key: Key) -> Result<(), StoreError>;

    /// Read the content slot for `key` from every replica holding it.
    ///
    /// One entry per replica, `None` where the replica has no value. Used by
    /// the versioned data strategy to observe divergent version stamps.
    async fn data_replicas(&self, key: Key) -> Result<Vec<Option<Vec<u8>>>, StoreError>;

    /// Store the literal path string in the path-index slot for `key`.
    async fn put_path(&self, key: Key, path: String) -> Result<(), StoreError>;

    /// Read the path-index slot for `key`. First successful replica response.
    async fn get_path(&self, key: Key) -> Result<Option<String>, StoreError>;

    /// Remove the path-index slot for `key`.
    async fn remove_path(&self, key: Key) -> Result<(), StoreError>;

    /// Read the path-index slot for `key` from every replica holding it.
    ///
    /// Used by the consensus path strategy to compare replica answers.
    async fn path_replicas(&self, key: Key) -> Result<Vec<Option<String>>, StoreError>;

    /// Enumerate every path string currently present in the path index.
    async fn all_paths(&self) -> Result<Vec<String>, StoreError>;
}
