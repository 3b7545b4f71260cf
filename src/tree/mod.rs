//! Path node tree
//!
//! The in-memory hierarchical namespace, kept in lockstep with the DHT
//! through the persistence strategy layer. Nodes live in a flat arena
//! addressed by stable `NodeId`s; a directory owns its children through an
//! ordered id list and a child holds a non-owning back-reference to its
//! parent, so there are no ownership cycles.
//!
//! Every mutation mirrors itself into the DHT before or after touching the
//! in-memory structure, acknowledged failure modes included: remote write
//! failures during
//! creation are logged and swallowed (the node stays in the tree), and a
//! rename that fails midway rolls back only the in-memory name, not the
//! remote records already removed.

pub mod hasher;
pub mod node;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::concurrency::DirLockManager;
use crate::error::FsError;
use crate::persistence::Strategies;
use crate::types::{Key, NodeId};

use hasher::key_for_path;
use node::{NodeKind, PathNode};

const ROOT_ID: NodeId = 0;

/// Attributes reported for a node by `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub is_directory: bool,
    pub size: u64,
}

/// The mounted namespace of one peer.
pub struct PathTree {
    nodes: RwLock<HashMap<NodeId, PathNode>>,
    next_id: AtomicU64,
    locks: DirLockManager,
    strategies: Strategies,
}

impl PathTree {
    /// Build a tree with an empty root directory and publish the root's
    /// records through the idempotent creation protocol.
    pub async fn open(strategies: Strategies) -> Self {
        let tree = Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            locks: DirLockManager::new(),
            strategies,
        };
        tree.nodes
            .write()
            .insert(ROOT_ID, PathNode::directory("", None));
        tree.publish("", None).await;
        tree
    }

    pub fn root(&self) -> NodeId {
        ROOT_ID
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    /// Resolve an absolute path to a node.
    ///
    /// Leading separators are stripped; an empty remainder matches the
    /// current node. Directories are scanned linearly, first segment at a
    /// time.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        Self::find_from(&nodes, ROOT_ID, path)
    }

    fn find_from(nodes: &HashMap<NodeId, PathNode>, id: NodeId, path: &str) -> Option<NodeId> {
        let node = nodes.get(&id)?;
        let remaining = path.trim_start_matches('/');
        if remaining.is_empty() || remaining == node.name {
            return Some(id);
        }
        let children = match &node.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => return None,
        };
        let (first, rest) = match remaining.find('/') {
            Some(ix) => (&remaining[..ix], &remaining[ix..]),
            None => (remaining, ""),
        };
        for child_id in children {
            if let Some(child) = nodes.get(child_id) {
                if child.name == first {
                    if rest.is_empty() {
                        return Some(*child_id);
                    }
                    return Self::find_from(nodes, *child_id, rest);
                }
            }
        }
        None
    }

    /// Derived absolute path of a node; the root's path is empty.
    pub fn path_of(&self, id: NodeId) -> Option<String> {
        let nodes = self.nodes.read();
        Self::path_of_locked(&nodes, id)
    }

    fn path_of_locked(nodes: &HashMap<NodeId, PathNode>, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let node = nodes.get(&current)?;
            match node.parent {
                Some(parent) => {
                    segments.push(node.name.clone());
                    current = parent;
                }
                None => break,
            }
        }
        // only chains ending at the root have a path; detached subtrees
        // are unresolvable until re-attached
        if current != ROOT_ID {
            return None;
        }
        if segments.is_empty() {
            return Some(String::new());
        }
        segments.reverse();
        Some(format!("/{}", segments.join("/")))
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.read().get(&id).and_then(|node| node.parent)
    }

    /// Current DHT key of a node, recomputed from its derived path.
    pub fn key_of(&self, id: NodeId) -> Option<Key> {
        self.path_of(id).map(|p| key_for_path(&p))
    }

    pub fn attr(&self, id: NodeId) -> Option<NodeAttr> {
        let nodes = self.nodes.read();
        nodes.get(&id).map(|node| match &node.kind {
            NodeKind::Directory { .. } => NodeAttr {
                is_directory: true,
                size: 0,
            },
            NodeKind::File { data, .. } => NodeAttr {
                is_directory: false,
                size: data.len() as u64,
            },
        })
    }

    /// Child names of a directory in insertion order.
    pub fn list(&self, dir: NodeId) -> Result<Vec<String>, FsError> {
        let nodes = self.nodes.read();
        let node = nodes
            .get(&dir)
            .ok_or_else(|| FsError::NotFound(format!("node {dir}")))?;
        match &node.kind {
            NodeKind::Directory { children } => Ok(children
                .iter()
                .filter_map(|c| nodes.get(c).map(|n| n.name.clone()))
                .collect()),
            NodeKind::File { .. } => Err(FsError::NotADirectory(node.name.clone())),
        }
    }

    /// Create a file under `parent`. See [`PathTree::create_node`].
    pub async fn create_file(
        &self,
        parent: NodeId,
        name: &str,
        payload: Option<Vec<u8>>,
    ) -> Result<NodeId, FsError> {
        self.create_node(parent, name, false, payload).await
    }

    /// Create a directory under `parent`. See [`PathTree::create_node`].
    pub async fn create_directory(&self, parent: NodeId, name: &str) -> Result<NodeId, FsError> {
        self.create_node(parent, name, true, None).await
    }

    /// Idempotent node creation.
    ///
    /// The node joins the in-memory tree unconditionally. The DHT is only
    /// written if no content record exists at the derived key yet; an
    /// existing record means another peer or a prior run already published
    /// this path, and it is left untouched. Remote failures are logged and
    /// swallowed, which can leave the DHT records partially or fully absent
    /// while the node is usable locally.
    ///
    /// A same-named child already present under `parent` is returned as-is,
    /// keeping sibling names unique.
    async fn create_node(
        &self,
        parent: NodeId,
        name: &str,
        is_directory: bool,
        payload: Option<Vec<u8>>,
    ) -> Result<NodeId, FsError> {
        let lock = self.locks.lock_for(parent);
        let _guard = lock.lock().await;

        let (id, path) = {
            let mut nodes = self.nodes.write();
            let dir = nodes
                .get(&parent)
                .ok_or_else(|| FsError::NotFound(format!("node {parent}")))?;
            let children = match &dir.kind {
                NodeKind::Directory { children } => children.clone(),
                NodeKind::File { .. } => return Err(FsError::NotADirectory(dir.name.clone())),
            };
            for child_id in &children {
                if let Some(child) = nodes.get(child_id) {
                    if child.name == name {
                        return Ok(*child_id);
                    }
                }
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let node = if is_directory {
                PathNode::directory(name, Some(parent))
            } else {
                let hydrated = payload.is_some();
                PathNode::file(name, Some(parent), payload.clone().unwrap_or_default(), hydrated)
            };
            nodes.insert(id, node);
            if let Some(dir) = nodes.get_mut(&parent) {
                if let NodeKind::Directory { children } = &mut dir.kind {
                    children.push(id);
                }
            }
            let path = Self::path_of_locked(&nodes, id).unwrap_or_default();
            (id, path)
        };

        self.publish(&path, payload.as_deref()).await;
        Ok(id)
    }

    /// The creation protocol's DHT half: probe, then write both records.
    async fn publish(&self, path: &str, payload: Option<&[u8]>) {
        let key = key_for_path(path);
        match self.strategies.data.get_content(key).await {
            Ok(Some(_)) => {
                debug!(path, "path already published, leaving DHT records untouched");
            }
            Ok(None) => {
                let bytes = payload.map(|p| p.to_vec()).unwrap_or_default();
                let result = async {
                    self.strategies.data.put_content(key, bytes).await?;
                    self.strategies.path.put_path_entry(key, path).await
                }
                .await;
                match result {
                    Ok(()) => debug!(path, "published path node"),
                    Err(error) => {
                        warn!(path, %error, "could not publish path node; tree and DHT may diverge");
                    }
                }
            }
            Err(error) => {
                warn!(path, %error, "could not probe for existing content; skipping DHT writes");
            }
        }
    }

    /// Detach a node from its parent and remove its DHT records.
    ///
    /// Only legal on an attached node: the root and already-detached nodes
    /// are a no-op, and if the parent's child list does not actually contain
    /// the node (a second delete racing the first), no DHT removal is
    /// attempted either.
    pub async fn delete(&self, id: NodeId) -> Result<(), FsError> {
        let parent = {
            let nodes = self.nodes.read();
            match nodes.get(&id) {
                Some(node) => node.parent,
                None => return Ok(()),
            }
        };
        let Some(parent) = parent else {
            return Ok(());
        };

        let lock = self.locks.lock_for(parent);
        let _guard = lock.lock().await;

        let detached_path = {
            let mut nodes = self.nodes.write();
            // key derives from the path as attached, so compute it first
            let path = Self::path_of_locked(&nodes, id);
            let mut removed = false;
            if let Some(dir) = nodes.get_mut(&parent) {
                if let NodeKind::Directory { children } = &mut dir.kind {
                    if let Some(ix) = children.iter().position(|c| *c == id) {
                        children.remove(ix);
                        removed = true;
                    }
                }
            }
            if removed {
                if let Some(node) = nodes.get_mut(&id) {
                    node.parent = None;
                }
                path
            } else {
                None
            }
        };

        if let Some(path) = detached_path {
            let key = key_for_path(&path);
            if let Err(error) = self.strategies.data.remove_content(key).await {
                warn!(path = %path, %error, "could not remove content record");
            }
            if let Err(error) = self.strategies.path.remove_path_entry(key).await {
                warn!(path = %path, %error, "could not remove path-index record");
            }
            debug!(path = %path, "deleted path node");
        }
        Ok(())
    }

    /// Drop a detached subtree from the arena.
    ///
    /// `delete` leaves the node in the arena so a rename flow can re-attach
    /// it elsewhere; callers that will not re-attach release it here.
    /// Attached nodes are never released.
    pub fn release(&self, id: NodeId) {
        let mut nodes = self.nodes.write();
        match nodes.get(&id) {
            Some(node) if node.parent.is_none() && id != ROOT_ID => {}
            _ => return,
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = nodes.remove(&current) {
                if let NodeKind::Directory { children } = node.kind {
                    stack.extend(children);
                }
                self.locks.release(current);
            }
        }
    }

    /// Rename a node in place.
    ///
    /// Reads the old content record (directories have none and fall back to
    /// an empty placeholder), removes both old records, mutates the name,
    /// and writes both records at the new key. The protocol is not atomic: a
    /// failure after the removals leaves neither record present, and the
    /// rollback restores only the in-memory name. Descendant records are not
    /// rewritten; their keys change implicitly with the derived path.
    pub async fn rename(&self, id: NodeId, new_name: &str) {
        let new_name = new_name.trim_start_matches('/').to_string();
        let (parent, old_name, old_path) = {
            let nodes = self.nodes.read();
            let Some(node) = nodes.get(&id) else { return };
            let Some(path) = Self::path_of_locked(&nodes, id) else {
                return;
            };
            (node.parent, node.name.clone(), path)
        };
        let _guard = match parent {
            Some(p) => Some(self.locks.lock_for(p).lock_owned().await),
            None => None,
        };

        let old_key = key_for_path(&old_path);
        let result = async {
            let content = self
                .strategies
                .data
                .get_content(old_key)
                .await?
                .unwrap_or_default();
            self.strategies.data.remove_content(old_key).await?;
            self.strategies.path.remove_path_entry(old_key).await?;

            let new_path = {
                let mut nodes = self.nodes.write();
                if let Some(node) = nodes.get_mut(&id) {
                    node.name = new_name.clone();
                }
                Self::path_of_locked(&nodes, id).unwrap_or_default()
            };
            let new_key = key_for_path(&new_path);
            self.strategies.data.put_content(new_key, content).await?;
            self.strategies.path.put_path_entry(new_key, &new_path).await
        }
        .await;

        if let Err(error) = result {
            warn!(
                from = %old_name,
                to = %new_name,
                %error,
                "rename failed; rolling back in-memory name, removed remote records are not restored"
            );
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(&id) {
                node.name = old_name;
            }
        }
    }

    /// Move a node under a different directory, optionally renaming it.
    ///
    /// Composed from the single-node protocols: the content record is read
    /// up front, the node is deleted out of its old location (detaching it
    /// and removing both old records), renamed in memory, re-attached under
    /// `new_parent`, and finally both records are written at the new key
    /// with the saved content. Like `rename`, the composition is not atomic;
    /// a failure after the removals rolls back only the in-memory name.
    pub async fn move_to(
        &self,
        id: NodeId,
        new_parent: NodeId,
        new_name: &str,
    ) -> Result<(), FsError> {
        let new_name = new_name.trim_start_matches('/').to_string();
        let (old_name, old_path) = {
            let nodes = self.nodes.read();
            let node = nodes
                .get(&id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            let path = Self::path_of_locked(&nodes, id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            (node.name.clone(), path)
        };

        let content = self
            .strategies
            .data
            .get_content(key_for_path(&old_path))
            .await?
            .unwrap_or_default();

        self.delete(id).await?;
        {
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(&id) {
                node.name = new_name.clone();
            }
        }
        self.add_child(new_parent, id).await?;

        // add_child swallows a failed mirror by detaching again; in that
        // case the node has no path and nothing further can be written
        let Some(new_path) = self.path_of(id) else {
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(&id) {
                node.name = old_name;
            }
            return Ok(());
        };

        let new_key = key_for_path(&new_path);
        let result = async {
            self.strategies.data.put_content(new_key, content).await?;
            self.strategies.path.put_path_entry(new_key, &new_path).await
        }
        .await;
        if let Err(error) = result {
            warn!(
                from = %old_path,
                to = %new_path,
                %error,
                "move failed; rolling back in-memory name, removed remote records are not restored"
            );
            let mut nodes = self.nodes.write();
            if let Some(node) = nodes.get_mut(&id) {
                node.name = old_name;
            }
        }
        Ok(())
    }

    /// Reparent `child` under `dir`, re-asserting the directory's own DHT
    /// records. A failed remote write rolls the reparenting back so the tree
    /// does not diverge from a failed mirror.
    pub async fn add_child(&self, dir: NodeId, child: NodeId) -> Result<(), FsError> {
        let lock = self.locks.lock_for(dir);
        let _guard = lock.lock().await;

        let dir_path = {
            let mut nodes = self.nodes.write();
            let node = nodes
                .get(&dir)
                .ok_or_else(|| FsError::NotFound(format!("node {dir}")))?;
            if !node.is_directory() {
                return Err(FsError::NotADirectory(node.name.clone()));
            }
            match nodes.get_mut(&child) {
                Some(c) => c.parent = Some(dir),
                None => return Err(FsError::NotFound(format!("node {child}"))),
            }
            Self::path_of_locked(&nodes, dir).unwrap_or_default()
        };

        let key = key_for_path(&dir_path);
        let result = async {
            self.strategies.data.put_content(key, Vec::new()).await?;
            self.strategies.path.put_path_entry(key, &dir_path).await
        }
        .await;

        match result {
            Ok(()) => {
                let mut nodes = self.nodes.write();
                if let Some(node) = nodes.get_mut(&dir) {
                    if let NodeKind::Directory { children } = &mut node.kind {
                        children.push(child);
                    }
                }
                debug!(dir = %dir_path, "attached child");
                Ok(())
            }
            Err(error) => {
                warn!(dir = %dir_path, %error, "could not mirror directory; detaching child again");
                let mut nodes = self.nodes.write();
                if let Some(c) = nodes.get_mut(&child) {
                    c.parent = None;
                }
                Ok(())
            }
        }
    }

    fn ensure_file(&self, id: NodeId) -> Result<(), FsError> {
        let nodes = self.nodes.read();
        let node = nodes
            .get(&id)
            .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
        if node.is_directory() {
            return Err(FsError::IsADirectory(node.name.clone()));
        }
        Ok(())
    }

    /// Fetch the content record for a file materialized by the syncer, once.
    async fn hydrate(&self, id: NodeId) -> Result<(), FsError> {
        let path = {
            let nodes = self.nodes.read();
            match nodes.get(&id) {
                Some(PathNode {
                    kind: NodeKind::File { hydrated: false, .. },
                    ..
                }) => Self::path_of_locked(&nodes, id),
                _ => return Ok(()),
            }
        };
        let Some(path) = path else { return Ok(()) };

        let remote = self.strategies.data.get_content(key_for_path(&path)).await?;
        let mut nodes = self.nodes.write();
        if let Some(node) = nodes.get_mut(&id) {
            if let NodeKind::File { data, hydrated } = &mut node.kind {
                if !*hydrated {
                    *data = remote.unwrap_or_default();
                    *hydrated = true;
                }
            }
        }
        Ok(())
    }

    pub async fn read_file(
        &self,
        id: NodeId,
        offset: usize,
        size: usize,
    ) -> Result<Vec<u8>, FsError> {
        self.ensure_file(id)?;
        self.hydrate(id).await?;

        let nodes = self.nodes.read();
        let node = nodes
            .get(&id)
            .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
        match &node.kind {
            NodeKind::File { data, .. } => {
                let start = offset.min(data.len());
                let end = offset.saturating_add(size).min(data.len());
                Ok(data[start..end].to_vec())
            }
            NodeKind::Directory { .. } => Err(FsError::IsADirectory(node.name.clone())),
        }
    }

    /// Write at an offset, extending with zeros across any gap, and mirror
    /// the full payload into the content record. A failed mirror leaves the
    /// in-memory payload in place (logged, not rolled back).
    pub async fn write_file(
        &self,
        id: NodeId,
        offset: usize,
        buf: &[u8],
    ) -> Result<usize, FsError> {
        self.ensure_file(id)?;
        self.hydrate(id).await?;

        let (payload, path) = {
            let mut nodes = self.nodes.write();
            let path = Self::path_of_locked(&nodes, id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            let node = nodes
                .get_mut(&id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            match &mut node.kind {
                NodeKind::File { data, .. } => {
                    let end = offset + buf.len();
                    if data.len() < end {
                        data.resize(end, 0);
                    }
                    data[offset..end].copy_from_slice(buf);
                    (data.clone(), path)
                }
                NodeKind::Directory { .. } => {
                    return Err(FsError::IsADirectory(node.name.clone()))
                }
            }
        };

        let key = key_for_path(&path);
        if let Err(error) = self.strategies.data.put_content(key, payload).await {
            warn!(path = %path, %error, "could not mirror file content");
        }
        Ok(buf.len())
    }

    /// Resize the payload; shrinking keeps the leading bytes, growing pads
    /// with zeros. The new payload is mirrored like a write.
    pub async fn truncate_file(&self, id: NodeId, len: usize) -> Result<(), FsError> {
        self.ensure_file(id)?;
        self.hydrate(id).await?;

        let (payload, path) = {
            let mut nodes = self.nodes.write();
            let path = Self::path_of_locked(&nodes, id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            let node = nodes
                .get_mut(&id)
                .ok_or_else(|| FsError::NotFound(format!("node {id}")))?;
            match &mut node.kind {
                NodeKind::File { data, .. } => {
                    data.resize(len, 0);
                    (data.clone(), path)
                }
                NodeKind::Directory { .. } => {
                    return Err(FsError::IsADirectory(node.name.clone()))
                }
            }
        };

        let key = key_for_path(&path);
        if let Err(error) = self.strategies.data.put_content(key, payload).await {
            warn!(path = %path, %error, "could not mirror truncated content");
        }
        Ok(())
    }
}
