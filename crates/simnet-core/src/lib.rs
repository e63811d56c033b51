//! simnet-core: identities, addresses and configuration shared by the
//! simulated transport. Nothing in here blocks or spawns.

pub mod addr;
pub mod config;
pub mod crypto;

pub use addr::{Multiaddr, Protocol};
pub use config::{NetworkConfig, SimnetConfig, WakePolicy};
pub use crypto::{Keypair, PeerId};
