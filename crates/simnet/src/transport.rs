//! Capability traits for code written against a generic transport.
//!
//! Higher-level protocol code takes a `T: Transport` (or a trait object with
//! the associated types pinned) and never sees the simulation types directly.
//! `Endpoint`, `Connection` and `Stream` implement these by delegating to
//! their inherent methods.

use std::net::IpAddr;
use std::time::Instant;

use async_trait::async_trait;

use simnet_core::addr::{Protocol, P_IP6};
use simnet_core::{Multiaddr, PeerId};

use crate::connection::Connection;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::stream::Stream;

/// Protocol codes the simulated transport handles.
const PROTOCOLS: &[u32] = &[P_IP6];

#[async_trait]
pub trait MuxedStream: Send + Sync {
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;
    async fn write(&self, buf: &[u8]) -> Result<usize>;
    fn close(&self) -> Result<()>;
    fn reset(&self) -> Result<()>;
    fn set_deadline(&self, deadline: Instant) -> Result<()>;
    fn set_read_deadline(&self, deadline: Instant) -> Result<()>;
    fn set_write_deadline(&self, deadline: Instant) -> Result<()>;
}

#[async_trait]
pub trait MuxedConn: Send + Sync {
    type Stream: MuxedStream;

    async fn open_stream(&self) -> Result<Self::Stream>;
    async fn accept_stream(&self) -> Result<Self::Stream>;
    fn close(&self) -> Result<()>;
    fn is_closed(&self) -> bool;

    fn local_peer(&self) -> PeerId;
    fn remote_peer(&self) -> PeerId;
    fn local_public_key(&self) -> [u8; 32];
    fn remote_public_key(&self) -> [u8; 32];
    fn local_multiaddr(&self) -> &Multiaddr;
    fn remote_multiaddr(&self) -> &Multiaddr;
}

#[async_trait]
pub trait Listener: Send + Sync {
    type Conn: MuxedConn;

    async fn accept(&self) -> Result<Self::Conn>;
    fn close(&self) -> Result<()>;
    fn multiaddr(&self) -> &Multiaddr;
    fn addr(&self) -> IpAddr;
}

#[async_trait]
pub trait Transport: Send + Sync {
    type Conn: MuxedConn;
    type Listener: Listener<Conn = Self::Conn>;

    fn can_dial(&self, addr: &Multiaddr) -> bool;
    async fn dial(&self, addr: &Multiaddr, peer: PeerId) -> Result<Self::Conn>;
    fn listen(&self, addr: &Multiaddr) -> Result<Self::Listener>;
    fn protocols(&self) -> &'static [u32];
    fn proxy(&self) -> bool;
}

// ── Stream ────────────────────────────────────────────────────────────────────

#[async_trait]
impl MuxedStream for Stream {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        Stream::read(self, buf).await
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        Stream::write(self, buf).await
    }

    fn close(&self) -> Result<()> {
        Stream::close(self)
    }

    fn reset(&self) -> Result<()> {
        Stream::reset(self)
    }

    fn set_deadline(&self, deadline: Instant) -> Result<()> {
        Stream::set_deadline(self, deadline)
    }

    fn set_read_deadline(&self, deadline: Instant) -> Result<()> {
        Stream::set_read_deadline(self, deadline)
    }

    fn set_write_deadline(&self, deadline: Instant) -> Result<()> {
        Stream::set_write_deadline(self, deadline)
    }
}

// ── Connection ────────────────────────────────────────────────────────────────

#[async_trait]
impl MuxedConn for Connection {
    type Stream = Stream;

    async fn open_stream(&self) -> Result<Stream> {
        Connection::open_stream(self).await
    }

    async fn accept_stream(&self) -> Result<Stream> {
        Connection::accept_stream(self).await
    }

    fn close(&self) -> Result<()> {
        Connection::close(self)
    }

    fn is_closed(&self) -> bool {
        Connection::is_closed(self)
    }

    fn local_peer(&self) -> PeerId {
        Connection::local_peer(self)
    }

    fn remote_peer(&self) -> PeerId {
        Connection::remote_peer(self)
    }

    fn local_public_key(&self) -> [u8; 32] {
        Connection::local_public_key(self)
    }

    fn remote_public_key(&self) -> [u8; 32] {
        Connection::remote_public_key(self)
    }

    fn local_multiaddr(&self) -> &Multiaddr {
        Connection::local_multiaddr(self)
    }

    fn remote_multiaddr(&self) -> &Multiaddr {
        Connection::remote_multiaddr(self)
    }
}

// ── Endpoint ──────────────────────────────────────────────────────────────────

#[async_trait]
impl Listener for Endpoint {
    type Conn = Connection;

    async fn accept(&self) -> Result<Connection> {
        Endpoint::accept(self).await
    }

    fn close(&self) -> Result<()> {
        Endpoint::close(self)
    }

    fn multiaddr(&self) -> &Multiaddr {
        Endpoint::multiaddr(self)
    }

    fn addr(&self) -> IpAddr {
        Endpoint::addr(self)
    }
}

#[async_trait]
impl Transport for Endpoint {
    type Conn = Connection;
    type Listener = Endpoint;

    /// Only bare `/ip6/<addr>` addresses are simulated.
    fn can_dial(&self, addr: &Multiaddr) -> bool {
        addr.len() == 1 && matches!(addr.iter().next(), Some(Protocol::Ip6(_)))
    }

    /// Peers are resolved by id; `addr` is only checked for shape.
    async fn dial(&self, addr: &Multiaddr, peer: PeerId) -> Result<Connection> {
        if !Transport::can_dial(self, addr) {
            return Err(Error::UnsupportedAddress(addr.clone()));
        }
        Endpoint::dial(self, peer).await
    }

    /// The endpoint is its own listener.
    fn listen(&self, addr: &Multiaddr) -> Result<Endpoint> {
        if !Transport::can_dial(self, addr) {
            return Err(Error::UnsupportedAddress(addr.clone()));
        }
        Ok(self.clone())
    }

    fn protocols(&self) -> &'static [u32] {
        PROTOCOLS
    }

    fn proxy(&self) -> bool {
        false
    }
}
