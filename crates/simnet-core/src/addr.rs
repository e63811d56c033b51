//! Structured network addresses.
//!
//! A `Multiaddr` is an ordered list of protocol components, rendered as
//! `/ip6/fd00::1/tcp/4001`. Only the handful of protocols the simulation
//! needs are understood; anything else fails to parse.
//!
//! Simulated peers live on a single address family: a one-component
//! `/ip6` address in the unique-local `fd00::/8` range whose remaining
//! 15 bytes are the tail of the peer id. See [`Multiaddr::for_peer`].

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use thiserror::Error;

use crate::crypto::PeerId;

/// Multiformats protocol codes.
pub const P_IP4: u32 = 4;
pub const P_TCP: u32 = 6;
pub const P_IP6: u32 = 41;
pub const P_UDP: u32 = 273;

/// First byte of every simulated address (IPv6 unique-local prefix).
pub const SIM_PREFIX: u8 = 0xfd;

/// The IPv6 address behind [`Multiaddr::for_peer`].
pub fn simulated_ip(peer: &PeerId) -> Ipv6Addr {
    let id = peer.as_bytes();
    let mut octets = [0u8; 16];
    octets[0] = SIM_PREFIX;
    octets[1..].copy_from_slice(&id[id.len() - 15..]);
    Ipv6Addr::from(octets)
}

/// One component of a multiaddr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Tcp(u16),
    Udp(u16),
}

impl Protocol {
    pub fn code(&self) -> u32 {
        match self {
            Protocol::Ip4(_) => P_IP4,
            Protocol::Ip6(_) => P_IP6,
            Protocol::Tcp(_) => P_TCP,
            Protocol::Udp(_) => P_UDP,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Protocol::Ip4(_) => "ip4",
            Protocol::Ip6(_) => "ip6",
            Protocol::Tcp(_) => "tcp",
            Protocol::Udp(_) => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ip4(ip) => write!(f, "/ip4/{ip}"),
            Protocol::Ip6(ip) => write!(f, "/ip6/{ip}"),
            Protocol::Tcp(port) => write!(f, "/tcp/{port}"),
            Protocol::Udp(port) => write!(f, "/udp/{port}"),
        }
    }
}

/// An ordered sequence of protocol components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Multiaddr(Vec<Protocol>);

impl Multiaddr {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Append a component, builder style.
    pub fn with(mut self, proto: Protocol) -> Self {
        self.0.push(proto);
        self
    }

    /// The simulated address of a peer.
    ///
    /// Pure function of the id: `fd` followed by the last 15 id bytes.
    pub fn for_peer(peer: &PeerId) -> Self {
        Self::from(Protocol::Ip6(simulated_ip(peer)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Protocol> {
        self.0.iter()
    }

    /// Protocol codes of every component, in order.
    pub fn protocols(&self) -> Vec<u32> {
        self.0.iter().map(Protocol::code).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The IP of the first component, if it is an IP component.
    pub fn ip(&self) -> Option<IpAddr> {
        match self.0.first()? {
            Protocol::Ip4(ip) => Some(IpAddr::V4(*ip)),
            Protocol::Ip6(ip) => Some(IpAddr::V6(*ip)),
            _ => None,
        }
    }
}

impl From<Protocol> for Multiaddr {
    fn from(proto: Protocol) -> Self {
        Self(vec![proto])
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for proto in &self.0 {
            write!(f, "{proto}")?;
        }
        Ok(())
    }
}

impl FromStr for Multiaddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| AddrError::MissingSlash(s.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::empty());
        }

        let mut parts = rest.split('/');
        let mut out = Vec::new();
        while let Some(tag) = parts.next() {
            let value = parts
                .next()
                .ok_or_else(|| AddrError::MissingValue(tag.to_string()))?;
            let bad = || AddrError::BadValue(tag.to_string(), value.to_string());
            let proto = match tag {
                "ip4" => Protocol::Ip4(value.parse().map_err(|_| bad())?),
                "ip6" => Protocol::Ip6(value.parse().map_err(|_| bad())?),
                "tcp" => Protocol::Tcp(value.parse().map_err(|_| bad())?),
                "udp" => Protocol::Udp(value.parse().map_err(|_| bad())?),
                other => return Err(AddrError::UnknownProtocol(other.to_string())),
            };
            out.push(proto);
        }
        Ok(Self(out))
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AddrError {
    #[error("multiaddr {0:?} must start with '/'")]
    MissingSlash(String),
    #[error("protocol {0} is missing its value")]
    MissingValue(String),
    #[error("invalid value {1:?} for protocol {0}")]
    BadValue(String, String),
    #[error("unsupported protocol {0:?}")]
    UnknownProtocol(String),
}
