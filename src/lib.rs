//! Swarmfs: DHT-backed peer filesystem core
//!
//! A hierarchical filesystem namespace mirrored into a distributed hash table
//! shared among cooperating peers. Every path is bound to a deterministic key
//! derived from its absolute path, so any peer can reconstruct the tree
//! independently. The namespace is eventually consistent by construction.

pub mod concurrency;
pub mod config;
pub mod dht;
pub mod error;
pub mod events;
pub mod logging;
pub mod mount;
pub mod persistence;
pub mod syncer;
pub mod tree;
pub mod types;
pub mod vfs;
