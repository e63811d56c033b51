//! Transport endpoints, one per simulated peer.
//!
//! An endpoint is both the dialer and the listener for its peer. Inbound
//! connections land in a capacity-1 queue until `accept` takes them, so at
//! most one dial per endpoint can be pending unaccepted; further dialers
//! wait for room.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex};

use simnet_core::addr::simulated_ip;
use simnet_core::{Keypair, Multiaddr, PeerId, WakePolicy};

use crate::connection::{ConnKey, Connection};
use crate::error::{Error, Result};
use crate::network::NetworkShared;
use crate::signal::CloseSignal;

const INBOUND_QUEUE_CAPACITY: usize = 1;

/// State shared between an endpoint handle, the registry, and every
/// connection that belongs to this endpoint.
pub(crate) struct EndpointShared {
    network: Weak<NetworkShared>,

    pub(crate) keypair: Arc<Keypair>,
    pub(crate) peer_id: PeerId,
    pub(crate) addr: Multiaddr,
    ip: Ipv6Addr,

    inbound_tx: mpsc::Sender<Connection>,
    inbound_rx: Mutex<mpsc::Receiver<Connection>>,
    signal: CloseSignal,

    /// Live connections of this endpoint and their remote peers.
    connections: DashMap<ConnKey, PeerId>,
}

impl EndpointShared {
    pub(crate) fn new(
        network: Weak<NetworkShared>,
        keypair: Keypair,
        policy: WakePolicy,
    ) -> Arc<Self> {
        let peer_id = keypair.peer_id();
        let addr = Multiaddr::for_peer(&peer_id);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_CAPACITY);

        Arc::new(Self {
            network,
            keypair: Arc::new(keypair),
            peer_id,
            addr,
            ip: simulated_ip(&peer_id),
            inbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            signal: CloseSignal::new(policy),
            connections: DashMap::new(),
        })
    }

    /// An endpoint with no registry behind it.
    #[cfg(test)]
    pub(crate) fn detached(keypair: Keypair, policy: WakePolicy) -> Arc<Self> {
        Self::new(Weak::new(), keypair, policy)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    /// Queue an inbound connection for `accept`.
    ///
    /// Waits while the queue is full. Fails if the endpoint is or becomes
    /// closed before there is room.
    pub(crate) async fn deliver(&self, conn: Connection) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ListenerClosed);
        }
        // Closed first: a close that drains the queue also frees room in it.
        tokio::select! {
            biased;
            _ = self.signal.closed() => Err(Error::ListenerClosed),
            sent = self.inbound_tx.send(conn) => sent.map_err(|_| Error::ListenerClosed),
        }
    }

    pub(crate) fn track(&self, key: ConnKey, remote: PeerId) {
        self.connections.insert(key, remote);
    }

    pub(crate) fn forget(&self, key: ConnKey) {
        self.connections.remove(&key);
    }
}

/// A simulated peer's presence on the network.
///
/// Cheap to clone; clones share the same queue and state.
#[derive(Clone)]
pub struct Endpoint {
    shared: Arc<EndpointShared>,
}

impl Endpoint {
    pub(crate) fn from_shared(shared: Arc<EndpointShared>) -> Self {
        Self { shared }
    }

    pub fn peer_id(&self) -> PeerId {
        self.shared.peer_id
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.shared.keypair.public
    }

    pub fn keypair(&self) -> &Keypair {
        &self.shared.keypair
    }

    pub fn multiaddr(&self) -> &Multiaddr {
        &self.shared.addr
    }

    /// The IP behind `multiaddr`.
    pub fn addr(&self) -> IpAddr {
        IpAddr::V6(self.shared.ip)
    }

    /// Dial a registered peer.
    ///
    /// Returns as soon as the connection is queued at the peer; it does not
    /// wait for the peer to `accept`.
    pub async fn dial(&self, remote: PeerId) -> Result<Connection> {
        let network = self.shared.network.upgrade().ok_or(Error::NetworkGone)?;
        network.dial(self.shared.peer_id, remote).await
    }

    /// Wait for the next inbound connection.
    ///
    /// Fails with `ListenerClosed` once this endpoint is closed, including
    /// when the wait itself is ended by `close`.
    pub async fn accept(&self) -> Result<Connection> {
        let conn = self
            .shared
            .signal
            .recv_or_closed(&self.shared.inbound_rx, Error::ListenerClosed)
            .await?;
        self.shared.track(conn.key(), conn.remote_peer());
        tracing::debug!(
            conn = conn.id(),
            local = ?self.shared.peer_id,
            remote = ?conn.remote_peer(),
            "accepted connection"
        );
        Ok(conn)
    }

    /// Stop listening.
    ///
    /// Wakes one blocked `accept` (every blocked `accept` under
    /// `WakePolicy::All`); with the default policy any other caller blocked
    /// at that moment stays blocked. Connections already accepted or dialed
    /// are untouched. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.shared.signal.close() {
            let dropped = CloseSignal::drain(&self.shared.inbound_rx);
            tracing::debug!(peer = ?self.shared.peer_id, dropped, "endpoint closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Number of live connections, dialed or accepted.
    pub fn connection_count(&self) -> usize {
        self.shared.connections.len()
    }

    /// Remote peers of the live connections, one entry per connection.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.shared
            .connections
            .iter()
            .map(|entry| *entry.value())
            .collect()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("peer", &self.shared.peer_id)
            .field("addr", &self.shared.addr.to_string())
            .field("closed", &self.is_closed())
            .finish()
    }
}
