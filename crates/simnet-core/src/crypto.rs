//! Identity primitives for simulated peers.
//!
//! Provides two things:
//!   1. BLAKE3 hashing: peer id derivation from public keys
//!   2. X25519 keypairs: the long-term identity of an endpoint
//!
//! Keypairs are managed via x25519-dalek. They can be drawn from OS entropy
//! or from any caller-supplied CSPRNG, which is how a seeded simulation
//! reproduces the same identities on every run.
//!
//! Private key material derives ZeroizeOnDrop and is wiped when dropped.

use std::fmt;
use std::str::FromStr;

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

// ── PeerId ────────────────────────────────────────────────────────────────────

/// Stable identifier of a simulated peer.
///
///   peer_id = BLAKE3(public_key)
///
/// Anyone holding a public key can compute the id without a lookup.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId([u8; 32]);

impl PeerId {
    pub fn from_public_key(public: &[u8; 32]) -> Self {
        Self(hash(public))
    }

    /// Wrap raw id bytes. Used when ids come from somewhere other than a key.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.short())
    }
}

impl FromStr for PeerId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::BadPeerId(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::BadPeerId(s.to_string()))?;
        Ok(Self(bytes))
    }
}

// ── Keypair ───────────────────────────────────────────────────────────────────

/// A peer's long-term static X25519 keypair.
///
/// Owned by exactly one endpoint. The public key is handed to every remote
/// peer that connects; the private key never leaves this struct.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    /// Zeroized on drop.
    private: Zeroizing<[u8; 32]>,
    /// Shared with remote peers on connection.
    pub public: [u8; 32],
}

impl Keypair {
    /// Generate a new random X25519 keypair from OS entropy.
    pub fn generate() -> Self {
        Self::from_rng(rand::thread_rng())
    }

    /// Generate a keypair from a caller-supplied CSPRNG.
    ///
    /// With a seeded RNG the resulting keypair (and so the peer id and
    /// address) is fully reproducible.
    pub fn from_rng<R: RngCore + CryptoRng>(rng: R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(secret.to_bytes()),
            public: *public.as_bytes(),
        }
    }

    /// Reconstruct a keypair from stored private key bytes.
    /// The public key is derived deterministically from the private key.
    pub fn from_private(private_bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private_bytes);
        let public = PublicKey::from(&secret);
        Self {
            private: Zeroizing::new(private_bytes),
            public: *public.as_bytes(),
        }
    }

    /// Serialize the private key for persistent storage.
    pub fn private_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(*self.private)
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.public)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public))
            .finish_non_exhaustive()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid peer id {0:?} (expected 64 hex characters)")]
    BadPeerId(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
