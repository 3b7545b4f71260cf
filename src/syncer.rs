//! Syncer: background reconciliation
//!
//! One long-running worker per mounted tree. Each cycle lists every path
//! entry known to the DHT and materializes the ones the local tree cannot
//! resolve, through the idempotent creation protocol and with no payload
//! (the content is already present remotely). The worker never prunes: a
//! path that disappears from the remote index stays in the local tree. That
//! asymmetry is a deliberate limitation of the design, not an oversight to
//! patch here.
//!
//! The worker is fail-stop: any error during a cycle stops it permanently,
//! with no retry or backoff. `terminate` requests a stop before the next
//! cycle but does not cancel an in-flight remote wait.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::FsError;
use crate::tree::PathTree;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2);

/// Handle to a spawned syncer worker.
pub struct Syncer {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Syncer {
    /// Spawn the reconciliation worker for `tree`.
    pub fn spawn(tree: Arc<PathTree>, interval: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let task = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "syncer started");
            while flag.load(Ordering::SeqCst) {
                match run_cycle(&tree).await {
                    Ok(materialized) => {
                        if materialized > 0 {
                            debug!(materialized, "sync cycle imported remote paths");
                        }
                    }
                    Err(err) => {
                        // fail-stop: first unexpected error halts the worker
                        error!(error = %err, "sync cycle failed; syncer stopping permanently");
                        flag.store(false, Ordering::SeqCst);
                        break;
                    }
                }
                tokio::time::sleep(interval).await;
            }
            info!("syncer stopped");
        });
        Self { running, task }
    }

    /// Request a stop before the next cycle. Does not cancel an in-flight
    /// remote wait.
    pub fn terminate(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the worker is still scheduled to run further cycles.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Wait for the worker to exit after `terminate`.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// One reconciliation pass: list, diff, materialize.
async fn run_cycle(tree: &PathTree) -> Result<usize, FsError> {
    let entries = tree.strategies().path.list_all_path_entries().await?;

    let mut materialized = 0;
    for entry in &entries {
        if entry.is_empty() {
            // the root publishes the empty path; nothing to materialize
            continue;
        }
        if tree.find(entry).is_some() {
            continue;
        }
        if materialize(tree, entry, &entries).await? {
            materialized += 1;
        }
    }
    Ok(materialized)
}

/// Create the node for one remote path entry.
///
/// The entry's kind is derived from the listing itself: an entry that
/// prefixes another entry must be a directory, anything else is a file.
/// An entry whose parent is not resolvable yet is skipped; the lexicographic
/// iteration order puts ancestors first, so remaining gaps close on a later
/// cycle once the parent's own entry has been imported.
async fn materialize(
    tree: &PathTree,
    entry: &str,
    all_entries: &BTreeSet<String>,
) -> Result<bool, FsError> {
    let (parent_path, name) = match entry.rfind('/') {
        Some(ix) => (&entry[..ix], &entry[ix + 1..]),
        None => ("", entry),
    };
    if name.is_empty() {
        return Ok(false);
    }

    let Some(parent) = tree.find(parent_path) else {
        debug!(path = %entry, "parent not resolvable yet; deferring to a later cycle");
        return Ok(false);
    };

    let child_prefix = format!("{entry}/");
    let is_directory = all_entries.iter().any(|e| e.starts_with(&child_prefix));

    let result = if is_directory {
        tree.create_directory(parent, name).await
    } else {
        tree.create_file(parent, name, None).await
    };
    match result {
        Ok(_) => {
            info!(path = %entry, is_directory, "materialized remote path");
            Ok(true)
        }
        Err(FsError::NotADirectory(_)) => {
            // parent resolved to a file; nothing to attach under it
            debug!(path = %entry, "parent is not a directory; skipping entry");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
