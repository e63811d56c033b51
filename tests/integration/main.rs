//! simnet integration test harness.
//!
//! Every scenario runs entirely in-process against a fresh `SimNetwork`:
//!
//!   cargo test --test integration
//!
//! Set `RUST_LOG=simnet=debug` to see dials, accepts and closes.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use simnet::{Connection, Endpoint, NetworkConfig, SimNetwork};
use tracing_subscriber::EnvFilter;

mod close;
mod streams;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Upper bound for any single step that is expected to complete.
pub const STEP: Duration = Duration::from_secs(5);

/// How long to watch a task that is expected to stay blocked.
pub const SETTLE: Duration = Duration::from_millis(100);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A network with `n` registered endpoints, in registration order.
pub fn network(config: NetworkConfig, n: usize) -> Result<(SimNetwork, Vec<Endpoint>)> {
    init_tracing();
    let net = SimNetwork::new(config);
    let endpoints = (0..n)
        .map(|i| net.new_endpoint().with_context(|| format!("register endpoint {i}")))
        .collect::<Result<Vec<_>>>()?;
    Ok((net, endpoints))
}

/// Fail instead of hanging when a step does not complete.
pub async fn within<F: Future>(what: &str, fut: F) -> Result<F::Output> {
    tokio::time::timeout(STEP, fut)
        .await
        .with_context(|| format!("timed out: {what}"))
}

/// Dial `b` from `a` and accept on `b`. Returns (dialer side, listener side).
pub async fn connect(a: &Endpoint, b: &Endpoint) -> Result<(Connection, Connection)> {
    let out = within("dial", a.dial(b.peer_id())).await??;
    let inbound = within("accept", b.accept()).await??;
    Ok((out, inbound))
}
