//! Mount bootstrapping glue
//!
//! Wires one filesystem instance together: builds the strategy set from the
//! configuration, opens the tree, spawns the syncer, and optionally
//! announces this peer to a rendezvous service. Shutdown asks the syncer to
//! stop and performs exactly one best-effort deregistration; pending tree or
//! DHT operations are neither flushed nor cancelled.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::MountConfig;
use crate::dht::Dht;
use crate::error::{ConfigError, StoreError};
use crate::persistence::Strategies;
use crate::syncer::Syncer;
use crate::tree::PathTree;
use crate::vfs::Filesystem;

/// Directory of peer addresses used to find a bootstrap peer.
///
/// The service itself is external; this crate only registers this peer on
/// startup and deregisters it on shutdown, both best-effort.
#[async_trait]
pub trait Rendezvous: Send + Sync {
    async fn register(&self, addr: SocketAddr) -> Result<(), StoreError>;
    async fn deregister(&self, addr: SocketAddr) -> Result<(), StoreError>;
    async fn peers(&self) -> Result<Vec<SocketAddr>, StoreError>;
}

/// One mounted filesystem instance.
pub struct Mount {
    tree: Arc<PathTree>,
    filesystem: Arc<Filesystem>,
    syncer: Syncer,
    rendezvous: Option<(Arc<dyn Rendezvous>, SocketAddr)>,
}

impl Mount {
    /// Build the strategy set, open the tree, and start the syncer.
    pub async fn open(
        config: MountConfig,
        dht: Arc<dyn Dht>,
        rendezvous: Option<(Arc<dyn Rendezvous>, SocketAddr)>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let strategies = Strategies::new(
            dht,
            config.data_strategy,
            config.path_strategy,
            config.quorum,
            config.op_timeout(),
        );
        let tree = Arc::new(PathTree::open(strategies).await);
        let filesystem = Arc::new(Filesystem::new(tree.clone()));
        let syncer = Syncer::spawn(tree.clone(), config.sync_interval());

        if let Some((service, addr)) = &rendezvous {
            match service.register(*addr).await {
                Ok(()) => info!(%addr, "registered with rendezvous service"),
                Err(error) => warn!(%addr, %error, "could not register with rendezvous service"),
            }
        }

        Ok(Self {
            tree,
            filesystem,
            syncer,
            rendezvous,
        })
    }

    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.filesystem
    }

    pub fn tree(&self) -> &Arc<PathTree> {
        &self.tree
    }

    pub fn syncer(&self) -> &Syncer {
        &self.syncer
    }

    /// Stop the syncer and deregister from the rendezvous service.
    ///
    /// The single cleanup action on the way out; in-flight DHT operations
    /// keep running to completion or abandonment.
    pub async fn shutdown(self) {
        self.syncer.terminate();
        if let Some((service, addr)) = &self.rendezvous {
            if let Err(error) = service.deregister(*addr).await {
                warn!(%addr, %error, "could not deregister from rendezvous service");
            }
        }
        info!("mount shut down");
    }
}
