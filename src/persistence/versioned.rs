//! Versioned data strategy: stamp every write
//!
//! Each content write wraps the payload in a serialized envelope carrying a
//! version stamp scoped to its key. The stamp is one higher than the highest
//! stamp currently observable for that key, so stamps grow monotonically per
//! key. Reads collect the envelopes held by every replica and return the
//! winning payload.
//!
//! Conflict policy: highest stamp wins. Two envelopes with the same stamp
//! but different payloads are concurrent writes with no causal order; the
//! winner is the one whose payload hashes higher, which is deterministic
//! across peers. Conflicts are logged at `warn` and never surfaced to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dht::Dht;
use crate::error::StoreError;
use crate::types::Key;

use super::{bounded, DataStrategy};

/// Stamped content envelope stored in the DHT content slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub stamp: u64,
    pub payload: Vec<u8>,
}

impl VersionedRecord {
    pub fn new(stamp: u64, payload: Vec<u8>) -> Self {
        Self { stamp, payload }
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// True if `self` beats `other` under the conflict policy:
    /// higher stamp first, payload hash as the deterministic tie-break.
    pub fn supersedes(&self, other: &VersionedRecord) -> bool {
        let own = (self.stamp, *blake3::hash(&self.payload).as_bytes());
        let theirs = (other.stamp, *blake3::hash(&other.payload).as_bytes());
        own > theirs
    }
}

/// Content operations with per-key version stamps.
pub struct VersionedDataOps {
    dht: Arc<dyn Dht>,
    op_timeout: Option<Duration>,
}

impl VersionedDataOps {
    pub fn new(dht: Arc<dyn Dht>, op_timeout: Option<Duration>) -> Self {
        Self { dht, op_timeout }
    }

    /// Resolve the winning record among the replicas' envelopes for `key`.
    async fn latest(&self, key: Key) -> Result<Option<VersionedRecord>, StoreError> {
        let answers = bounded(self.op_timeout, self.dht.data_replicas(key)).await?;

        let mut winner: Option<VersionedRecord> = None;
        let mut conflict = false;
        for bytes in answers.iter().flatten() {
            let record = VersionedRecord::decode(bytes)?;
            match &winner {
                None => winner = Some(record),
                Some(current) => {
                    if record.stamp == current.stamp && record.payload != current.payload {
                        conflict = true;
                    }
                    if record.supersedes(current) {
                        winner = Some(record);
                    }
                }
            }
        }

        if conflict {
            let stamp = winner.as_ref().map(|w| w.stamp).unwrap_or(0);
            warn!(
                key = %hex::encode(key),
                stamp,
                "concurrent writes with equal stamp, resolved by payload hash"
            );
        }
        Ok(winner)
    }

    /// Read the payload written at a specific stamp, if any replica still
    /// holds it. Equal-stamp conflicts resolve under the same policy as
    /// `latest`.
    pub async fn get_content_at(
        &self,
        key: Key,
        stamp: u64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let answers = bounded(self.op_timeout, self.dht.data_replicas(key)).await?;

        let mut winner: Option<VersionedRecord> = None;
        for bytes in answers.iter().flatten() {
            let record = VersionedRecord::decode(bytes)?;
            if record.stamp != stamp {
                continue;
            }
            match &winner {
                None => winner = Some(record),
                Some(current) if record.supersedes(current) => winner = Some(record),
                Some(_) => {}
            }
        }
        Ok(winner.map(|record| record.payload))
    }
}

#[async_trait]
impl DataStrategy for VersionedDataOps {
    async fn put_content(&self, key: Key, bytes: Vec<u8>) -> Result<(), StoreError> {
        let stamp = match self.latest(key).await? {
            Some(current) => current.stamp + 1,
            None => 1,
        };
        let encoded = VersionedRecord::new(stamp, bytes).encode()?;
        bounded(self.op_timeout, self.dht.put_data(key, encoded)).await
    }

    async fn get_content(&self, key: Key) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.latest(key).await?.map(|record| record.payload))
    }

    async fn remove_content(&self, key: Key) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.remove_data(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dht::MemoryDht;

    #[tokio::test]
    async fn stamps_increase_per_key() {
        let dht = Arc::new(MemoryDht::new());
        let ops = VersionedDataOps::new(dht.clone(), None);
        let key = [3u8; 32];

        ops.put_content(key, b"one".to_vec()).await.unwrap();
        ops.put_content(key, b"two".to_vec()).await.unwrap();

        let raw = dht.get_data(key).await.unwrap().unwrap();
        let record = VersionedRecord::decode(&raw).unwrap();
        assert_eq!(record.stamp, 2);
        assert_eq!(record.payload, b"two");
        assert_eq!(ops.get_content(key).await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn highest_stamp_wins_across_replicas() {
        let dht = Arc::new(MemoryDht::with_replicas(3));
        let ops = VersionedDataOps::new(dht.clone(), None);
        let key = [4u8; 32];

        let old = VersionedRecord::new(1, b"old".to_vec()).encode().unwrap();
        let new = VersionedRecord::new(2, b"new".to_vec()).encode().unwrap();
        dht.set_data_replica_answers(key, vec![Some(old.clone()), Some(new), Some(old)]);

        assert_eq!(ops.get_content(key).await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn equal_stamp_conflict_resolves_deterministically() {
        let dht = Arc::new(MemoryDht::with_replicas(2));
        let ops = VersionedDataOps::new(dht.clone(), None);
        let key = [5u8; 32];

        let a = VersionedRecord::new(3, b"alpha".to_vec());
        let b = VersionedRecord::new(3, b"bravo".to_vec());
        let expected = if a.supersedes(&b) { &a } else { &b };

        dht.set_data_replica_answers(
            key,
            vec![Some(a.encode().unwrap()), Some(b.encode().unwrap())],
        );
        assert_eq!(
            ops.get_content(key).await.unwrap(),
            Some(expected.payload.clone())
        );

        // The same two records in either order resolve to the same winner.
        dht.set_data_replica_answers(
            key,
            vec![Some(b.encode().unwrap()), Some(a.encode().unwrap())],
        );
        assert_eq!(
            ops.get_content(key).await.unwrap(),
            Some(expected.payload.clone())
        );
    }

    #[tokio::test]
    async fn specific_stamp_reads_skip_newer_versions() {
        let dht = Arc::new(MemoryDht::with_replicas(2));
        let ops = VersionedDataOps::new(dht.clone(), None);
        let key = [6u8; 32];

        let v1 = VersionedRecord::new(1, b"one".to_vec()).encode().unwrap();
        let v2 = VersionedRecord::new(2, b"two".to_vec()).encode().unwrap();
        dht.set_data_replica_answers(key, vec![Some(v1), Some(v2)]);

        assert_eq!(
            ops.get_content_at(key, 1).await.unwrap(),
            Some(b"one".to_vec())
        );
        assert_eq!(ops.get_content_at(key, 7).await.unwrap(), None);
    }

    #[test]
    fn supersedes_is_a_strict_order() {
        let a = VersionedRecord::new(3, b"alpha".to_vec());
        let b = VersionedRecord::new(3, b"bravo".to_vec());
        assert_ne!(a.supersedes(&b), b.supersedes(&a));
        assert!(!a.supersedes(&a));

        let newer = VersionedRecord::new(4, b"alpha".to_vec());
        assert!(newer.supersedes(&a));
        assert!(!a.supersedes(&newer));
    }
}
