//! Persistence strategy layer
//!
//! Pluggable adapters over the DHT implementing two capability contracts:
//! data operations (content put/get/remove) and path-index operations
//! (register/list/remove a path string). Variants trade consistency against
//! availability:
//!
//! - [`direct`]: single round trip, first successful response is
//!   authoritative. Highest availability, weakest consistency.
//! - [`consensus`]: path reads return a value only if a quorum of replicas
//!   agree, used where a stale path entry would corrupt the namespace view.
//! - [`versioned`]: every content write carries a monotonically increasing
//!   version stamp scoped to its key; reads resolve divergent replicas by
//!   highest stamp.
//!
//! Exactly one strategy set is constructed per mount and injected into the
//! components that need it; there is no hidden global factory state.

pub mod consensus;
pub mod direct;
pub mod versioned;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dht::Dht;
use crate::error::StoreError;
use crate::types::Key;

pub use consensus::ConsensusPathOps;
pub use direct::{DirectDataOps, DirectPathOps};
pub use versioned::{VersionedDataOps, VersionedRecord};

/// Content operations against the DHT content slot.
#[async_trait]
pub trait DataStrategy: Send + Sync {
    async fn put_content(&self, key: Key, bytes: Vec<u8>) -> Result<(), StoreError>;
    async fn get_content(&self, key: Key) -> Result<Option<Vec<u8>>, StoreError>;
    async fn remove_content(&self, key: Key) -> Result<(), StoreError>;
}

/// Path-index operations against the DHT path slot.
#[async_trait]
pub trait PathStrategy: Send + Sync {
    async fn put_path_entry(&self, key: Key, path: &str) -> Result<(), StoreError>;
    async fn list_all_path_entries(&self) -> Result<BTreeSet<String>, StoreError>;
    async fn remove_path_entry(&self, key: Key) -> Result<(), StoreError>;
}

/// Selection of the data strategy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataStrategyKind {
    #[default]
    Direct,
    Versioned,
}

/// Selection of the path-index strategy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PathStrategyKind {
    #[default]
    Direct,
    Consensus,
}

/// The strategy set of one mount, built once and injected where needed.
#[derive(Clone)]
pub struct Strategies {
    pub data: Arc<dyn DataStrategy>,
    pub path: Arc<dyn PathStrategy>,
}

impl Strategies {
    /// Build a strategy set over `dht` from the selected variants.
    ///
    /// `quorum` is the absolute number of agreeing replicas a consensus read
    /// requires; `None` means majority of the responses received.
    /// `op_timeout` bounds every remote wait when set; the default `None`
    /// preserves the indefinite-block behavior.
    pub fn new(
        dht: Arc<dyn Dht>,
        data_kind: DataStrategyKind,
        path_kind: PathStrategyKind,
        quorum: Option<usize>,
        op_timeout: Option<Duration>,
    ) -> Self {
        let data: Arc<dyn DataStrategy> = match data_kind {
            DataStrategyKind::Direct => Arc::new(DirectDataOps::new(dht.clone(), op_timeout)),
            DataStrategyKind::Versioned => Arc::new(VersionedDataOps::new(dht.clone(), op_timeout)),
        };
        let path: Arc<dyn PathStrategy> = match path_kind {
            PathStrategyKind::Direct => Arc::new(DirectPathOps::new(dht, op_timeout)),
            PathStrategyKind::Consensus => Arc::new(ConsensusPathOps::new(dht, quorum, op_timeout)),
        };
        Self { data, path }
    }
}

/// Await `fut` to completion, or within `timeout` when a bounded wait is
/// configured. With `None` the caller blocks for as long as the remote peer
/// takes; this is the documented availability risk of the default mode.
pub(crate) async fn bounded<T, F>(timeout: Option<Duration>, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match timeout {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StoreError::Timeout(limit))?,
    }
}
