//! Filesystem call adapter
//!
//! Thin translation layer between host filesystem calls and the path node
//! tree. Every call resolves its absolute path through `find`, applies the
//! operation, and answers with a POSIX-style status. Remote failures never
//! escape this boundary as raw errors: they are converted to a status code
//! or absorbed by the tree layer's own rules.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::FsError;
use crate::events::{EventDispatcher, EventListener, FsEvent};
use crate::tree::{NodeAttr, PathTree};
use crate::types::NodeId;

/// POSIX-style status codes returned to the host collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    Enoent,
    Enotdir,
    Eisdir,
    Eexist,
    Einval,
    Eio,
}

impl Errno {
    /// Negative errno value, as expected by a kernel bridge.
    pub fn code(self) -> i32 {
        match self {
            Errno::Enoent => -2,
            Errno::Eio => -5,
            Errno::Eexist => -17,
            Errno::Enotdir => -20,
            Errno::Eisdir => -21,
            Errno::Einval => -22,
        }
    }
}

impl From<&FsError> for Errno {
    fn from(err: &FsError) -> Self {
        match err {
            FsError::NotFound(_) => Errno::Enoent,
            FsError::NotADirectory(_) => Errno::Enotdir,
            FsError::IsADirectory(_) => Errno::Eisdir,
            FsError::AlreadyExists(_) => Errno::Eexist,
            FsError::Store(_) => Errno::Eio,
        }
    }
}

/// Status code of a completed call: 0 on success, negative errno otherwise.
pub fn status<T>(result: &Result<T, Errno>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(errno) => errno.code(),
    }
}

fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(ix) => &path[..ix],
        None => "",
    }
}

fn last_component(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(ix) => &trimmed[ix + 1..],
        None => trimmed,
    }
}

/// The call surface consumed by the kernel bridge.
pub struct Filesystem {
    tree: Arc<PathTree>,
    events: RwLock<EventDispatcher>,
}

impl Filesystem {
    pub fn new(tree: Arc<PathTree>) -> Self {
        Self {
            tree,
            events: RwLock::new(EventDispatcher::new()),
        }
    }

    pub fn tree(&self) -> &Arc<PathTree> {
        &self.tree
    }

    pub fn register_listener(&self, listener: Box<dyn EventListener>) {
        self.events.write().register(listener);
    }

    fn dispatch(&self, name: &str, path: &str) -> Result<(), Errno> {
        self.events
            .read()
            .dispatch(name, &FsEvent::for_path(path))
            .map_err(|_| Errno::Eio)
    }

    fn resolve(&self, path: &str) -> Result<NodeId, Errno> {
        self.tree.find(path).ok_or(Errno::Enoent)
    }

    fn resolve_parent_dir(&self, path: &str) -> Result<NodeId, Errno> {
        let parent = self.tree.find(parent_path(path)).ok_or(Errno::Enoent)?;
        match self.tree.attr(parent) {
            Some(attr) if attr.is_directory => Ok(parent),
            // a file in parent position reads as "no such parent directory"
            _ => Err(Errno::Enoent),
        }
    }

    pub async fn create(&self, path: &str) -> Result<(), Errno> {
        if self.tree.find(path).is_some() {
            return Err(Errno::Eexist);
        }
        let parent = self.resolve_parent_dir(path)?;
        let name = last_component(path);
        if name.is_empty() {
            return Err(Errno::Enoent);
        }
        self.tree
            .create_file(parent, name, None)
            .await
            .map_err(|e| Errno::from(&e))?;
        self.dispatch("create", path)?;
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> Result<(), Errno> {
        if self.tree.find(path).is_some() {
            return Err(Errno::Eexist);
        }
        let parent = self.resolve_parent_dir(path)?;
        let name = last_component(path);
        if name.is_empty() {
            return Err(Errno::Enoent);
        }
        self.tree
            .create_directory(parent, name)
            .await
            .map_err(|e| Errno::from(&e))?;
        self.dispatch("mkdir", path)?;
        Ok(())
    }

    pub fn getattr(&self, path: &str) -> Result<NodeAttr, Errno> {
        let node = self.resolve(path)?;
        self.tree.attr(node).ok_or(Errno::Enoent)
    }

    pub async fn read(&self, path: &str, offset: usize, size: usize) -> Result<Vec<u8>, Errno> {
        let node = self.resolve(path)?;
        self.tree
            .read_file(node, offset, size)
            .await
            .map_err(|e| Errno::from(&e))
    }

    pub async fn write(&self, path: &str, offset: usize, buf: &[u8]) -> Result<usize, Errno> {
        let node = self.resolve(path)?;
        let written = self
            .tree
            .write_file(node, offset, buf)
            .await
            .map_err(|e| Errno::from(&e))?;
        self.dispatch("write", path)?;
        Ok(written)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<String>, Errno> {
        let node = self.resolve(path)?;
        match self.tree.attr(node) {
            Some(attr) if attr.is_directory => {}
            Some(_) => return Err(Errno::Enotdir),
            None => return Err(Errno::Enoent),
        }
        self.tree.list(node).map_err(|e| Errno::from(&e))
    }

    /// Move a node to a new absolute path. A rename within the same
    /// directory changes the name in place; moving to a different parent
    /// composes delete, rename, and attach.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), Errno> {
        let node = self.resolve(from)?;
        let new_parent = self.tree.find(parent_path(to)).ok_or(Errno::Enoent)?;
        match self.tree.attr(new_parent) {
            Some(attr) if attr.is_directory => {}
            Some(_) => return Err(Errno::Enotdir),
            None => return Err(Errno::Enoent),
        }

        // a destination inside the source's own subtree would create a
        // parent cycle; the root is an ancestor of every directory, so this
        // also rejects renaming the root itself
        let mut ancestor = Some(new_parent);
        while let Some(current) = ancestor {
            if current == node {
                return Err(Errno::Einval);
            }
            ancestor = self.tree.parent_of(current);
        }

        if self.tree.parent_of(node) == Some(new_parent) {
            self.tree.rename(node, last_component(to)).await;
        } else {
            self.tree
                .move_to(node, new_parent, last_component(to))
                .await
                .map_err(|e| Errno::from(&e))?;
        }
        self.dispatch("rename", to)?;
        Ok(())
    }

    pub async fn rmdir(&self, path: &str) -> Result<(), Errno> {
        let node = self.resolve(path)?;
        match self.tree.attr(node) {
            Some(attr) if attr.is_directory => {}
            Some(_) => return Err(Errno::Enotdir),
            None => return Err(Errno::Enoent),
        }
        self.tree.delete(node).await.map_err(|e| Errno::from(&e))?;
        self.tree.release(node);
        self.dispatch("rmdir", path)?;
        Ok(())
    }

    /// Remove a path. Type mismatch is deliberately not enforced here.
    pub async fn unlink(&self, path: &str) -> Result<(), Errno> {
        let node = self.resolve(path)?;
        self.tree.delete(node).await.map_err(|e| Errno::from(&e))?;
        self.tree.release(node);
        self.dispatch("unlink", path)?;
        Ok(())
    }

    pub async fn truncate(&self, path: &str, len: usize) -> Result<(), Errno> {
        let node = self.resolve(path)?;
        self.tree
            .truncate_file(node, len)
            .await
            .map_err(|e| Errno::from(&e))
    }
}
