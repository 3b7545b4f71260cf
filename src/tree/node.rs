//! Path node representation
//!
//! File versus directory is a sum type with shared fields. The parent link
//! is a non-owning `NodeId` back-reference used only to derive the node's
//! path and to ask the parent to detach it; the directory's child list is
//! the single owning side of the relation.

use crate::types::NodeId;

/// Variant-specific payload of a path node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Ordered child list; insertion order is preserved for listing.
    Directory { children: Vec<NodeId> },
    /// In-memory byte payload, mirrored into the DHT content slot.
    ///
    /// `hydrated` is false for nodes materialized by the syncer: their
    /// content lives remotely and is fetched on first access.
    File { data: Vec<u8>, hydrated: bool },
}

/// A node of the in-memory namespace.
#[derive(Debug, Clone)]
pub struct PathNode {
    /// Last path segment; empty for the root
    pub name: String,
    /// Back-reference to the owning directory; `None` for the root and for
    /// nodes detached by delete/rename-out
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl PathNode {
    pub fn directory(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    pub fn file(name: impl Into<String>, parent: Option<NodeId>, data: Vec<u8>, hydrated: bool) -> Self {
        Self {
            name: name.into(),
            parent,
            kind: NodeKind::File { data, hydrated },
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }
}
