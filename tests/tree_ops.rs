//! Integration tests for the path node tree and the filesystem call adapter.

use std::sync::Arc;

use swarmfs::dht::{Dht, MemoryDht};
use swarmfs::error::ListenerError;
use swarmfs::events::{EventListener, FsEvent};
use swarmfs::persistence::{DataStrategyKind, PathStrategyKind, Strategies};
use swarmfs::tree::hasher::key_for_path;
use swarmfs::tree::PathTree;
use swarmfs::vfs::{status, Errno, Filesystem};

fn direct_strategies(dht: Arc<MemoryDht>) -> Strategies {
    Strategies::new(
        dht,
        DataStrategyKind::Direct,
        PathStrategyKind::Direct,
        None,
        None,
    )
}

async fn open_fs(dht: Arc<MemoryDht>) -> Filesystem {
    let tree = Arc::new(PathTree::open(direct_strategies(dht)).await);
    Filesystem::new(tree)
}

#[tokio::test]
async fn create_then_find_returns_node_with_matching_path() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht.clone()).await;

    fs.mkdir("/docs").await.unwrap();
    fs.create("/docs/readme.txt").await.unwrap();

    let node = fs.tree().find("/docs/readme.txt").unwrap();
    assert_eq!(fs.tree().path_of(node).as_deref(), Some("/docs/readme.txt"));

    // both DHT slots exist at the derived key
    let key = key_for_path("/docs/readme.txt");
    assert!(dht.get_data(key).await.unwrap().is_some());
    assert_eq!(
        dht.get_path(key).await.unwrap().as_deref(),
        Some("/docs/readme.txt")
    );
}

#[tokio::test]
async fn creation_is_idempotent_and_never_overwrites() {
    let dht = Arc::new(MemoryDht::new());
    let key = key_for_path("/seen");
    // another peer already published this path
    dht.put_data(key, b"remote content".to_vec()).await.unwrap();
    dht.put_path(key, "/seen".to_string()).await.unwrap();
    assert_eq!(dht.data_put_count(&key), 1);

    let fs = open_fs(dht.clone()).await;
    fs.create("/seen").await.unwrap();

    // the existing record was observed and left untouched
    assert_eq!(
        dht.get_data(key).await.unwrap(),
        Some(b"remote content".to_vec())
    );
    assert_eq!(dht.data_put_count(&key), 1);
    assert!(fs.tree().find("/seen").is_some());
}

#[tokio::test]
async fn file_content_round_trip_and_truncate() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht).await;

    fs.create("/f").await.unwrap();
    let written = fs.write("/f", 0, b"hello, swarm").await.unwrap();
    assert_eq!(written, 12);
    assert_eq!(fs.read("/f", 0, 64).await.unwrap(), b"hello, swarm");

    fs.truncate("/f", 5).await.unwrap();
    assert_eq!(fs.read("/f", 0, 64).await.unwrap(), b"hello");
    assert_eq!(fs.getattr("/f").unwrap().size, 5);
}

#[tokio::test]
async fn rename_moves_both_dht_slots() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht.clone()).await;

    fs.mkdir("/a").await.unwrap();
    fs.create("/a/b").await.unwrap();
    fs.write("/a/b", 0, b"payload").await.unwrap();

    fs.rename("/a/b", "/a/c").await.unwrap();

    assert!(fs.tree().find("/a/b").is_none());
    assert!(fs.tree().find("/a/c").is_some());
    assert_eq!(fs.read("/a/c", 0, 64).await.unwrap(), b"payload");

    let old_key = key_for_path("/a/b");
    assert_eq!(dht.get_data(old_key).await.unwrap(), None);
    assert_eq!(dht.get_path(old_key).await.unwrap(), None);

    let new_key = key_for_path("/a/c");
    assert_eq!(dht.get_data(new_key).await.unwrap(), Some(b"payload".to_vec()));
    assert_eq!(dht.get_path(new_key).await.unwrap().as_deref(), Some("/a/c"));
}

#[tokio::test]
async fn moving_across_directories_relocates_records() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht.clone()).await;

    fs.mkdir("/src").await.unwrap();
    fs.mkdir("/dst").await.unwrap();
    fs.create("/src/f").await.unwrap();
    fs.write("/src/f", 0, b"moved").await.unwrap();

    fs.rename("/src/f", "/dst/g").await.unwrap();

    assert!(fs.tree().find("/src/f").is_none());
    assert_eq!(fs.read("/dst/g", 0, 64).await.unwrap(), b"moved");
    assert_eq!(fs.readdir("/src").unwrap(), Vec::<String>::new());
    assert_eq!(fs.readdir("/dst").unwrap(), vec!["g"]);

    let old_key = key_for_path("/src/f");
    assert_eq!(dht.get_data(old_key).await.unwrap(), None);
    let new_key = key_for_path("/dst/g");
    assert_eq!(dht.get_data(new_key).await.unwrap(), Some(b"moved".to_vec()));
    assert_eq!(dht.get_path(new_key).await.unwrap().as_deref(), Some("/dst/g"));
}

#[tokio::test]
async fn rename_into_own_subtree_is_rejected() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht).await;

    fs.mkdir("/a").await.unwrap();
    fs.mkdir("/a/b").await.unwrap();

    // a destination under the source would make the node its own ancestor;
    // the call must come back with a status instead of wedging the tree
    let wait = std::time::Duration::from_secs(1);
    let direct = tokio::time::timeout(wait, fs.rename("/a", "/a/b")).await;
    assert_eq!(direct.unwrap(), Err(Errno::Einval));
    let nested = tokio::time::timeout(wait, fs.rename("/a", "/a/b/c")).await;
    assert_eq!(nested.unwrap(), Err(Errno::Einval));
    let root = tokio::time::timeout(wait, fs.rename("/", "/a/r")).await;
    assert_eq!(root.unwrap(), Err(Errno::Einval));

    // the namespace is untouched and later operations still go through
    assert_eq!(fs.readdir("/a").unwrap(), vec!["b"]);
    fs.create("/a/after").await.unwrap();
    assert!(fs.tree().find("/a/after").is_some());
}

#[tokio::test]
async fn listing_preserves_insertion_order() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht).await;

    fs.mkdir("/d").await.unwrap();
    for name in ["x", "y", "z"] {
        fs.create(&format!("/d/{name}")).await.unwrap();
    }

    assert_eq!(fs.readdir("/d").unwrap(), vec!["x", "y", "z"]);
}

#[tokio::test]
async fn deleting_a_detached_node_is_a_noop() {
    let dht = Arc::new(MemoryDht::new());
    let tree = Arc::new(PathTree::open(direct_strategies(dht.clone())).await);

    let f = tree.create_file(tree.root(), "f", None).await.unwrap();
    let key = key_for_path("/f");
    tree.delete(f).await.unwrap();
    assert_eq!(dht.get_path(key).await.unwrap(), None);

    // republish out of band, then delete the already-detached node again:
    // the second delete must not touch the collaborator
    dht.put_path(key, "/f".to_string()).await.unwrap();
    tree.delete(f).await.unwrap();
    assert_eq!(dht.get_path(key).await.unwrap().as_deref(), Some("/f"));

    // the root has no parent and can never be deleted
    tree.delete(tree.root()).await.unwrap();
    assert!(tree.find("/").is_some());
}

#[tokio::test]
async fn call_adapter_reports_posix_statuses() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht).await;

    fs.mkdir("/d").await.unwrap();
    fs.create("/d/f").await.unwrap();

    assert_eq!(fs.create("/d/f").await.unwrap_err(), Errno::Eexist);
    assert_eq!(fs.create("/missing/f").await.unwrap_err(), Errno::Enoent);
    assert_eq!(fs.getattr("/nope").unwrap_err(), Errno::Enoent);
    assert_eq!(fs.read("/d", 0, 1).await.unwrap_err(), Errno::Eisdir);
    assert_eq!(fs.readdir("/d/f").unwrap_err(), Errno::Enotdir);
    assert_eq!(fs.rmdir("/d/f").await.unwrap_err(), Errno::Enotdir);
    assert_eq!(fs.truncate("/d", 0).await.unwrap_err(), Errno::Eisdir);
    // unlink does not enforce the node type
    assert!(fs.unlink("/d/f").await.is_ok());

    let result = fs.rename("/gone", "/d/elsewhere").await;
    assert_eq!(status(&result), Errno::Enoent.code());
}

struct PathRecorder {
    seen: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl EventListener for PathRecorder {
    fn event_name(&self) -> &str {
        "create"
    }

    fn handle(&self, event: &FsEvent) -> Result<(), ListenerError> {
        self.seen.lock().push(event.path.clone());
        Ok(())
    }
}

#[tokio::test]
async fn create_calls_notify_registered_listeners() {
    let dht = Arc::new(MemoryDht::new());
    let fs = open_fs(dht).await;

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    fs.register_listener(Box::new(PathRecorder { seen: seen.clone() }));

    fs.create("/hello").await.unwrap();
    fs.mkdir("/dir").await.unwrap(); // different event name, not recorded

    assert_eq!(*seen.lock(), vec!["/hello".to_string()]);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        /// After creating a chain of directories, `find` on the joined path
        /// returns a node whose recomputed path equals that path.
        #[test]
        fn derived_paths_survive_round_trips(
            segments in proptest::collection::vec("[a-z][a-z0-9]{0,7}", 1..5)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let dht = Arc::new(MemoryDht::new());
                let tree = PathTree::open(direct_strategies(dht)).await;

                let mut parent = tree.root();
                let mut path = String::new();
                for segment in &segments {
                    parent = tree.create_directory(parent, segment).await.unwrap();
                    path.push('/');
                    path.push_str(segment);
                }

                let found = tree.find(&path).unwrap();
                prop_assert_eq!(tree.path_of(found), Some(path));
                Ok(())
            })?;
        }
    }
}
