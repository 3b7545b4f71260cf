//! Core types for the DHT-backed filesystem.

/// Key: deterministic 256-bit hash of a node's absolute path
pub type Key = [u8; 32];

/// NodeId: stable identifier of a node in the in-memory arena
pub type NodeId = u64;
