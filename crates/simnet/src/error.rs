//! Errors surfaced by the simulated transport.
//!
//! Every failure is reported to the caller of the failing operation; nothing
//! retries in the background.

use simnet_core::{Multiaddr, PeerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("peer {0} is already registered")]
    DuplicateRegistration(PeerId),

    #[error("listener is closed")]
    ListenerClosed,

    #[error("connection is closed")]
    ConnectionClosed,

    #[error("stream reset")]
    StreamReset,

    #[error("write on closed stream")]
    StreamClosed,

    #[error("address {0} is not dialable on the simulated network")]
    UnsupportedAddress(Multiaddr),

    #[error("the simulated network this endpoint belongs to has been dropped")]
    NetworkGone,
}

impl Error {
    /// True for the errors a closed listener, connection or stream produces.
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            Error::ListenerClosed | Error::ConnectionClosed | Error::StreamClosed
        )
    }
}

impl From<Error> for std::io::Error {
    fn from(e: Error) -> Self {
        let kind = match e {
            Error::StreamReset => std::io::ErrorKind::ConnectionReset,
            Error::StreamClosed => std::io::ErrorKind::BrokenPipe,
            Error::ListenerClosed | Error::ConnectionClosed => std::io::ErrorKind::NotConnected,
            Error::UnknownPeer(_) | Error::NetworkGone => std::io::ErrorKind::NotFound,
            Error::DuplicateRegistration(_) => std::io::ErrorKind::AlreadyExists,
            Error::UnsupportedAddress(_) => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, e)
    }
}
