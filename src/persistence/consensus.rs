//! Consensus path strategy: replicas must agree
//!
//! Reads of the path-index slot are issued to every replica holding the key
//! and a value is returned only if at least `quorum` replicas answer with
//! the same bytes. Where no quorum is reached the entry is reported absent
//! rather than risking a stale or conflicting path corrupting the namespace
//! view. Writes and removals go through unchanged; only reads are gated.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::dht::Dht;
use crate::error::StoreError;
use crate::types::Key;

use super::{bounded, PathStrategy};

/// Path operations requiring replica agreement on reads.
pub struct ConsensusPathOps {
    dht: Arc<dyn Dht>,
    /// Absolute agreement threshold; `None` means majority of responses.
    quorum: Option<usize>,
    op_timeout: Option<Duration>,
}

impl ConsensusPathOps {
    pub fn new(dht: Arc<dyn Dht>, quorum: Option<usize>, op_timeout: Option<Duration>) -> Self {
        Self {
            dht,
            quorum,
            op_timeout,
        }
    }

    fn threshold(&self, responses: usize) -> usize {
        match self.quorum {
            Some(q) => q,
            None => responses / 2 + 1,
        }
    }

    /// Read the path entry for `key`, requiring quorum agreement.
    ///
    /// Returns `Ok(None)` when no value reaches the threshold.
    pub async fn get_path_entry(&self, key: Key) -> Result<Option<String>, StoreError> {
        let answers = bounded(self.op_timeout, self.dht.path_replicas(key)).await?;
        let responses = answers.len();
        let threshold = self.threshold(responses);

        let mut tally: HashMap<&str, usize> = HashMap::new();
        for answer in answers.iter().flatten() {
            *tally.entry(answer.as_str()).or_insert(0) += 1;
        }

        let best = tally.into_iter().max_by_key(|(_, count)| *count);
        match best {
            Some((value, count)) if count >= threshold => Ok(Some(value.to_string())),
            Some((value, count)) => {
                warn!(
                    path = %value,
                    agreeing = count,
                    responses,
                    threshold,
                    "path entry below quorum, treating as absent"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl PathStrategy for ConsensusPathOps {
    async fn put_path_entry(&self, key: Key, path: &str) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.put_path(key, path.to_string())).await
    }

    async fn list_all_path_entries(&self) -> Result<BTreeSet<String>, StoreError> {
        // Enumeration has no per-key quorum to compare against; each listed
        // entry is validated through a quorum read before being admitted.
        let paths = bounded(self.op_timeout, self.dht.all_paths()).await?;
        let mut agreed = BTreeSet::new();
        for path in paths {
            let key = crate::tree::hasher::key_for_path(&path);
            if let Some(entry) = self.get_path_entry(key).await? {
                agreed.insert(entry);
            }
        }
        Ok(agreed)
    }

    async fn remove_path_entry(&self, key: Key) -> Result<(), StoreError> {
        bounded(self.op_timeout, self.dht.remove_path(key)).await
    }
}
