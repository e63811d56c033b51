//! The network registry: maps peer ids to endpoints and resolves dials.
//!
//! One registry per simulation. Endpoints keep a weak handle back to it, so
//! dropping every `SimNetwork` handle tears the simulation down.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use simnet_core::{Keypair, NetworkConfig, PeerId, SimnetConfig};

use crate::connection::{ConnId, Connection};
use crate::endpoint::{Endpoint, EndpointShared};
use crate::error::{Error, Result};

#[derive(Default)]
struct PeerTable {
    endpoints: HashMap<PeerId, Arc<EndpointShared>>,
    /// Registration order.
    order: Vec<PeerId>,
}

pub(crate) struct NetworkShared {
    config: NetworkConfig,
    peers: RwLock<PeerTable>,
    rng: Mutex<ChaCha8Rng>,
    next_conn: AtomicU64,
}

impl NetworkShared {
    /// Build a connected pair between two registered peers and queue the
    /// remote side at the remote endpoint.
    pub(crate) async fn dial(&self, local: PeerId, remote: PeerId) -> Result<Connection> {
        let (local_ep, remote_ep) = {
            let peers = self.peers.read();
            let local_ep = peers.endpoints.get(&local).cloned();
            let remote_ep = peers.endpoints.get(&remote).cloned();
            (
                local_ep.ok_or(Error::UnknownPeer(local))?,
                remote_ep.ok_or(Error::UnknownPeer(remote))?,
            )
        };

        if remote_ep.is_closed() {
            return Err(Error::ListenerClosed);
        }

        let id: ConnId = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (local_conn, remote_conn) =
            Connection::pair(id, &local_ep, &remote_ep, self.config.wake_policy);

        remote_ep.deliver(remote_conn).await?;
        local_ep.track(local_conn.key(), remote);

        tracing::debug!(conn = id, local = ?local, remote = ?remote, "dialed");
        Ok(local_conn)
    }
}

/// Handle to a simulated network. Cheap to clone.
#[derive(Clone)]
pub struct SimNetwork {
    shared: Arc<NetworkShared>,
}

impl SimNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };
        tracing::debug!(seed = ?config.seed, policy = ?config.wake_policy, "simulated network created");
        Self {
            shared: Arc::new(NetworkShared {
                config,
                peers: RwLock::new(PeerTable::default()),
                rng: Mutex::new(rng),
                next_conn: AtomicU64::new(0),
            }),
        }
    }

    /// Deterministic network: identities drawn from `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(NetworkConfig::seeded(seed))
    }

    pub fn from_config(config: &SimnetConfig) -> Self {
        Self::new(config.network.clone())
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.shared.config
    }

    /// Draw a keypair from the network's RNG.
    ///
    /// With a seed, the n-th call returns the same keypair on every run.
    pub fn generate_keypair(&self) -> Keypair {
        let mut rng = self.shared.rng.lock();
        Keypair::from_rng(&mut *rng)
    }

    /// Register an endpoint for `keypair`'s identity.
    ///
    /// Fails with `DuplicateRegistration` if that identity already has one;
    /// the existing endpoint is kept.
    pub fn register(&self, keypair: Keypair) -> Result<Endpoint> {
        let peer_id = keypair.peer_id();
        let mut peers = self.shared.peers.write();
        if peers.endpoints.contains_key(&peer_id) {
            tracing::warn!(peer = ?peer_id, "peer already registered");
            return Err(Error::DuplicateRegistration(peer_id));
        }

        let shared = EndpointShared::new(
            Arc::downgrade(&self.shared),
            keypair,
            self.shared.config.wake_policy,
        );
        peers.endpoints.insert(peer_id, shared.clone());
        peers.order.push(peer_id);
        drop(peers);

        let endpoint = Endpoint::from_shared(shared);
        tracing::debug!(peer = ?peer_id, addr = %endpoint.multiaddr(), "registered endpoint");
        Ok(endpoint)
    }

    /// Generate a keypair and register it.
    pub fn new_endpoint(&self) -> Result<Endpoint> {
        self.register(self.generate_keypair())
    }

    /// Snapshot of registered ids, in registration order.
    pub fn peers(&self) -> Vec<PeerId> {
        self.shared.peers.read().order.clone()
    }

    pub fn endpoint(&self, peer: &PeerId) -> Option<Endpoint> {
        self.shared
            .peers
            .read()
            .endpoints
            .get(peer)
            .cloned()
            .map(Endpoint::from_shared)
    }

    pub fn len(&self) -> usize {
        self.shared.peers.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dial `remote` on behalf of `local`. See [`Endpoint::dial`].
    pub async fn dial(&self, local: PeerId, remote: PeerId) -> Result<Connection> {
        self.shared.dial(local, remote).await
    }
}

impl std::fmt::Debug for SimNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimNetwork")
            .field("config", &self.shared.config)
            .field("peers", &self.len())
            .finish()
    }
}
