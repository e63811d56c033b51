//! Multiplexed connections between two endpoints.
//!
//! A dial produces two `Connection` objects, one per side, cross-wired
//! through two capacity-1 stream queues: what one side pushes with
//! `open_stream`, the other side pops with `accept_stream`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, Mutex};

use simnet_core::{Keypair, Multiaddr, PeerId, WakePolicy};

use crate::endpoint::EndpointShared;
use crate::error::{Error, Result};
use crate::signal::CloseSignal;
use crate::stream::{Stream, StreamId};

/// Network-wide connection identifier. Both sides share the id.
pub type ConnId = u64;

/// Streams a connection holds for the peer before the peer must accept.
/// A second `open_stream` waits until the first has been accepted.
const STREAM_QUEUE_CAPACITY: usize = 1;

/// Which end of a dial a connection object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Dialer,
    Listener,
}

/// Key of a connection in its endpoint's live table. Unique per side, so a
/// peer that dials itself tracks both objects.
pub(crate) type ConnKey = (ConnId, Side);

/// One endpoint's identity as seen from a connection.
struct PeerInfo {
    peer_id: PeerId,
    keypair: Arc<Keypair>,
    addr: Multiaddr,
}

impl PeerInfo {
    fn of(endpoint: &EndpointShared) -> Self {
        Self {
            peer_id: endpoint.peer_id,
            keypair: endpoint.keypair.clone(),
            addr: endpoint.addr.clone(),
        }
    }
}

pub struct Connection {
    id: ConnId,
    side: Side,

    local: PeerInfo,
    /// Only for removing this connection from the endpoint's table. Weak,
    /// since unaccepted connections sit in the endpoint's own queue.
    endpoint: Weak<EndpointShared>,

    remote_peer: PeerId,
    remote_public_key: [u8; 32],
    remote_addr: Multiaddr,

    inbound: Mutex<mpsc::Receiver<Stream>>,
    outbound: mpsc::Sender<Stream>,
    signal: CloseSignal,

    /// Shared by both sides so stream ids are unique per connection.
    next_stream: Arc<AtomicU64>,
}

impl Connection {
    /// Build both sides of a connection: the dialer's (`local`) and the
    /// listener's (`remote`).
    pub(crate) fn pair(
        id: ConnId,
        local: &Arc<EndpointShared>,
        remote: &Arc<EndpointShared>,
        policy: WakePolicy,
    ) -> (Connection, Connection) {
        let (to_local, from_remote) = mpsc::channel(STREAM_QUEUE_CAPACITY);
        let (to_remote, from_local) = mpsc::channel(STREAM_QUEUE_CAPACITY);
        let next_stream = Arc::new(AtomicU64::new(0));

        let dialer = Connection {
            id,
            side: Side::Dialer,
            local: PeerInfo::of(local),
            endpoint: Arc::downgrade(local),
            remote_peer: remote.peer_id,
            remote_public_key: remote.keypair.public,
            remote_addr: remote.addr.clone(),
            inbound: Mutex::new(from_remote),
            outbound: to_remote,
            signal: CloseSignal::new(policy),
            next_stream: next_stream.clone(),
        };
        let listener = Connection {
            id,
            side: Side::Listener,
            local: PeerInfo::of(remote),
            endpoint: Arc::downgrade(remote),
            remote_peer: local.peer_id,
            remote_public_key: local.keypair.public,
            remote_addr: local.addr.clone(),
            inbound: Mutex::new(from_local),
            outbound: to_local,
            signal: CloseSignal::new(policy),
            next_stream,
        };
        (dialer, listener)
    }

    pub(crate) fn key(&self) -> ConnKey {
        (self.id, self.side)
    }

    fn forget(&self) {
        if let Some(endpoint) = self.endpoint.upgrade() {
            endpoint.forget(self.key());
        }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Open a new stream to the peer.
    ///
    /// The peer's half is queued for its `accept_stream`. If a previously
    /// opened stream is still waiting there, this waits for it to be taken.
    pub async fn open_stream(&self) -> Result<Stream> {
        if self.signal.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let stream_id: StreamId = self.next_stream.fetch_add(1, Ordering::Relaxed);
        let (local, remote) = Stream::pair(stream_id);

        tokio::select! {
            biased;
            _ = self.signal.closed() => return Err(Error::ConnectionClosed),
            sent = self.outbound.send(remote) => {
                sent.map_err(|_| Error::ConnectionClosed)?;
            }
        }

        tracing::trace!(conn = self.id, stream = stream_id, peer = ?self.remote_peer, "opened stream");
        Ok(local)
    }

    /// Wait for the next stream the peer opens.
    pub async fn accept_stream(&self) -> Result<Stream> {
        let stream = self
            .signal
            .recv_or_closed(&self.inbound, Error::ConnectionClosed)
            .await?;
        tracing::trace!(conn = self.id, stream = stream.id(), peer = ?self.remote_peer, "accepted stream");
        Ok(stream)
    }

    /// Close this side.
    ///
    /// Wakes a blocked `accept_stream` (all of them under `WakePolicy::All`)
    /// and drops streams the peer opened that were never accepted. Streams
    /// already handed out stay usable. The peer side is not told; its
    /// `is_closed` stays false. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.signal.close() {
            let dropped = CloseSignal::drain(&self.inbound);
            self.forget();
            tracing::debug!(conn = self.id, peer = ?self.remote_peer, dropped, "connection closed");
        }
        Ok(())
    }

    /// Local view only.
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    pub fn local_peer(&self) -> PeerId {
        self.local.peer_id
    }

    pub fn local_public_key(&self) -> [u8; 32] {
        self.local.keypair.public
    }

    pub fn local_private_key(&self) -> &Keypair {
        &self.local.keypair
    }

    pub fn local_multiaddr(&self) -> &Multiaddr {
        &self.local.addr
    }

    pub fn remote_peer(&self) -> PeerId {
        self.remote_peer
    }

    pub fn remote_public_key(&self) -> [u8; 32] {
        self.remote_public_key
    }

    pub fn remote_multiaddr(&self) -> &Multiaddr {
        &self.remote_addr
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.forget();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("local", &self.local.peer_id)
            .field("remote", &self.remote_peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
