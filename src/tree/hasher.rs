//! Key derivation for path nodes
//!
//! Every node is addressed in the DHT by the hash of its absolute path. The
//! key is never stored; it is recomputed whenever the path is needed, so a
//! rename transparently changes the key of the node and all its descendants.

use crate::types::Key;

/// Compute the fixed-width DHT key for an absolute path.
pub fn key_for_path(path: &str) -> Key {
    *blake3::hash(path.as_bytes()).as_bytes()
}
