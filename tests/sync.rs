//! Integration tests for the background syncer: convergence between peers
//! sharing a DHT, the no-removal asymmetry, and fail-stop semantics.

use std::sync::Arc;
use std::time::Duration;

use swarmfs::dht::{Dht, MemoryDht};
use swarmfs::persistence::{DataStrategyKind, PathStrategyKind, Strategies};
use swarmfs::syncer::Syncer;
use swarmfs::tree::hasher::key_for_path;
use swarmfs::tree::PathTree;

const INTERVAL: Duration = Duration::from_millis(25);

fn direct_strategies(dht: Arc<MemoryDht>) -> Strategies {
    Strategies::new(
        dht,
        DataStrategyKind::Direct,
        PathStrategyKind::Direct,
        None,
        None,
    )
}

async fn settle() {
    // a few intervals of real time; cycles use wall-clock sleeps
    tokio::time::sleep(INTERVAL * 8).await;
}

#[tokio::test]
async fn peer_trees_converge_without_rewriting_records() {
    let dht = Arc::new(MemoryDht::new());

    let writer = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);
    let dir = writer.create_directory(writer.root(), "shared").await.unwrap();
    let file = writer.create_file(dir, "notes.txt", None).await.unwrap();
    writer.write_file(file, 0, b"from the writer").await.unwrap();

    let file_key = key_for_path("/shared/notes.txt");
    let puts_before = dht.data_put_count(&file_key);

    let reader = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);
    assert!(reader.find("/shared").is_none());

    let syncer = Syncer::spawn(reader.clone(), INTERVAL);
    settle().await;

    // both entries imported: the directory is inferred from the listing,
    // the file is hydrated from the content record on first read
    let dir = reader.find("/shared").unwrap();
    assert!(reader.attr(dir).unwrap().is_directory);
    let file = reader.find("/shared/notes.txt").unwrap();
    assert!(!reader.attr(file).unwrap().is_directory);
    assert_eq!(
        reader.read_file(file, 0, 64).await.unwrap(),
        b"from the writer"
    );

    // materialization goes through the idempotent creation protocol, so
    // the existing records were observed and never overwritten
    assert_eq!(dht.data_put_count(&file_key), puts_before);

    syncer.terminate();
    syncer.join().await;
}

#[tokio::test]
async fn removals_do_not_propagate() {
    let dht = Arc::new(MemoryDht::new());

    let writer = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);
    let doomed = writer.create_file(writer.root(), "doomed", None).await.unwrap();

    let reader = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);
    let syncer = Syncer::spawn(reader.clone(), INTERVAL);
    settle().await;
    assert!(reader.find("/doomed").is_some());

    writer.delete(doomed).await.unwrap();
    assert_eq!(dht.get_path(key_for_path("/doomed")).await.unwrap(), None);

    settle().await;
    // the local copy outlives the remote records; the syncer never prunes
    assert!(reader.find("/doomed").is_some());
    assert!(syncer.is_running());

    syncer.terminate();
    syncer.join().await;
}

#[tokio::test]
async fn entries_with_unresolvable_parents_wait_for_the_parent_entry() {
    let dht = Arc::new(MemoryDht::new());

    // an orphan path entry with no entry for its parent directory
    let child_key = key_for_path("/x/y");
    dht.put_path(child_key, "/x/y".to_string()).await.unwrap();
    dht.put_data(child_key, b"orphan".to_vec()).await.unwrap();

    let reader = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);
    let syncer = Syncer::spawn(reader.clone(), INTERVAL);
    settle().await;

    // deferred, not fatal
    assert!(reader.find("/x/y").is_none());
    assert!(syncer.is_running());

    let parent_key = key_for_path("/x");
    dht.put_path(parent_key, "/x".to_string()).await.unwrap();
    dht.put_data(parent_key, Vec::new()).await.unwrap();
    settle().await;

    let parent = reader.find("/x").unwrap();
    assert!(reader.attr(parent).unwrap().is_directory);
    let child = reader.find("/x/y").unwrap();
    assert_eq!(reader.read_file(child, 0, 64).await.unwrap(), b"orphan");

    syncer.terminate();
    syncer.join().await;
}

#[tokio::test]
async fn first_cycle_error_stops_the_syncer_permanently() {
    let dht = Arc::new(MemoryDht::new());
    let reader = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);

    let syncer = Syncer::spawn(reader.clone(), INTERVAL);
    settle().await;
    assert!(syncer.is_running());

    dht.set_failing(true);
    settle().await;
    assert!(!syncer.is_running());

    // recovery of the remote side does not resurrect the worker
    dht.set_failing(false);
    dht.put_path(key_for_path("/late"), "/late".to_string())
        .await
        .unwrap();
    settle().await;
    assert!(!syncer.is_running());
    assert!(reader.find("/late").is_none());

    syncer.join().await;
}

#[tokio::test]
async fn terminate_stops_the_worker_before_the_next_cycle() {
    let dht = Arc::new(MemoryDht::new());
    let reader = Arc::new(PathTree::open(direct_strategies(dht)).await);

    let syncer = Syncer::spawn(reader, INTERVAL);
    syncer.terminate();
    assert!(!syncer.is_running());

    tokio::time::timeout(Duration::from_secs(2), syncer.join())
        .await
        .expect("worker exits promptly after terminate");
}
