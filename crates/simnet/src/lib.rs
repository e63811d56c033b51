//! In-process simulated peer-to-peer transport.
//!
//! Many logical peers share one process: each registers an [`Endpoint`] with
//! a [`SimNetwork`], dials other peers by id, and exchanges bytes over
//! multiplexed [`Stream`]s backed by unbuffered in-memory pipes. No sockets,
//! no timers, no OS limits, so thousands of peers fit in a single test.
//!
//! ```no_run
//! # async fn demo() -> simnet::Result<()> {
//! let net = simnet::SimNetwork::seeded(7);
//! let a = net.new_endpoint()?;
//! let b = net.new_endpoint()?;
//!
//! let conn = a.dial(b.peer_id()).await?;
//! let inbound = b.accept().await?;
//! let stream = conn.open_stream().await?;
//! let remote = inbound.accept_stream().await?;
//! # drop((stream, remote));
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod network;
pub mod stream;
pub mod transport;

mod pipe;
mod signal;

pub use connection::{ConnId, Connection, Side};
pub use endpoint::Endpoint;
pub use error::{Error, Result};
pub use network::SimNetwork;
pub use stream::{Stream, StreamId};
pub use transport::{Listener, MuxedConn, MuxedStream, Transport};

pub use simnet_core::{Keypair, Multiaddr, NetworkConfig, PeerId, SimnetConfig, WakePolicy};
