use std::sync::Arc;

use simnet::{Endpoint, Error, NetworkConfig, Stream, WakePolicy};
use tokio::task::JoinHandle;

use crate::*;

fn blocked_accept(ep: &Endpoint) -> JoinHandle<simnet::Result<Connection>> {
    let ep = ep.clone();
    tokio::spawn(async move { ep.accept().await })
}

fn blocked_accept_stream(conn: &Arc<Connection>) -> JoinHandle<simnet::Result<Stream>> {
    let conn = conn.clone();
    tokio::spawn(async move { conn.accept_stream().await })
}

/// Default policy: closing wakes exactly one of two blocked accepts.
#[tokio::test]
async fn test_close_wakes_one_accept() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(10), 1)?;
    let ep = &eps[0];

    let first = blocked_accept(ep);
    let second = blocked_accept(ep);
    tokio::time::sleep(SETTLE).await;
    assert!(!first.is_finished() && !second.is_finished());

    ep.close()?;
    tokio::time::sleep(SETTLE).await;

    let (woken, still_blocked) = match (first.is_finished(), second.is_finished()) {
        (true, false) => (first, second),
        (false, true) => (second, first),
        other => panic!("expected exactly one accept to wake, got {other:?}"),
    };
    assert_eq!(woken.await?.unwrap_err(), Error::ListenerClosed);

    // Closing again is a no-op and wakes nobody.
    ep.close()?;
    tokio::time::sleep(SETTLE).await;
    assert!(!still_blocked.is_finished());
    still_blocked.abort();

    // New callers see the closed state immediately.
    assert_eq!(within("accept", ep.accept()).await?.unwrap_err(), Error::ListenerClosed);
    Ok(())
}

/// Wake-all policy: closing releases every blocked accept.
#[tokio::test]
async fn test_close_wakes_all_accepts() -> Result<()> {
    let config = NetworkConfig::seeded(11).with_wake_policy(WakePolicy::All);
    let (_net, eps) = network(config, 1)?;
    let ep = &eps[0];

    let waiters: Vec<_> = (0..3).map(|_| blocked_accept(ep)).collect();
    tokio::time::sleep(SETTLE).await;

    ep.close()?;
    for waiter in waiters {
        assert_eq!(within("woken accept", waiter).await??.unwrap_err(), Error::ListenerClosed);
    }
    Ok(())
}

/// A closed endpoint refuses dials but keeps its existing connections.
#[tokio::test]
async fn test_closed_endpoint_keeps_connections() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(12), 3)?;
    let (a, b, c) = (&eps[0], &eps[1], &eps[2]);

    let (ab, ba) = connect(a, b).await?;
    b.close()?;
    assert!(b.is_closed());

    assert_eq!(within("dial closed", c.dial(b.peer_id())).await?.unwrap_err(), Error::ListenerClosed);

    // a <-> b still works in both directions.
    let s = within("open", ab.open_stream()).await??;
    let r = within("accept", ba.accept_stream()).await??;
    let writer = tokio::spawn(async move {
        s.write(b"still here").await?;
        s.close()?;
        Ok::<_, Error>(s)
    });
    assert_eq!(within("read", r.read_to_end()).await??, b"still here");
    within("writer", writer).await???;

    // b can still dial out.
    let (_bc, _cb) = connect(b, c).await?;
    Ok(())
}

/// A dialer waiting on a full inbound queue is released by close.
#[tokio::test]
async fn test_close_releases_waiting_dialer() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(13), 3)?;
    let (a, b, c) = (&eps[0], &eps[1], &eps[2]);

    // Fills c's inbound queue; nobody accepts it.
    let _pending = within("first dial", a.dial(c.peer_id())).await??;

    let waiting = {
        let b = b.clone();
        let target = c.peer_id();
        tokio::spawn(async move { b.dial(target).await })
    };
    tokio::time::sleep(SETTLE).await;
    assert!(!waiting.is_finished(), "queue holds one connection");

    c.close()?;
    assert_eq!(within("released dialer", waiting).await??.unwrap_err(), Error::ListenerClosed);
    Ok(())
}

/// Closing a connection fails further stream operations on that side only.
#[tokio::test]
async fn test_connection_close() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(14), 2)?;
    let (a, b) = (&eps[0], &eps[1]);
    let (ab, ba) = connect(a, b).await?;
    assert_eq!(a.connection_count(), 1);
    assert_eq!(b.connection_count(), 1);

    ab.close()?;
    ab.close()?;
    assert!(ab.is_closed());
    assert!(!ba.is_closed());
    assert_eq!(a.connection_count(), 0);
    assert_eq!(b.connection_count(), 1);

    assert_eq!(within("open", ab.open_stream()).await?.unwrap_err(), Error::ConnectionClosed);
    assert_eq!(within("accept", ab.accept_stream()).await?.unwrap_err(), Error::ConnectionClosed);

    drop(ba);
    assert_eq!(b.connection_count(), 0);
    Ok(())
}

/// Connection close follows the same wake rule for blocked `accept_stream`.
#[tokio::test]
async fn test_connection_close_wakes_one_accept_stream() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(15), 2)?;
    let (ab, _ba) = connect(&eps[0], &eps[1]).await?;
    let ab = Arc::new(ab);

    let first = blocked_accept_stream(&ab);
    let second = blocked_accept_stream(&ab);
    tokio::time::sleep(SETTLE).await;
    assert!(!first.is_finished() && !second.is_finished());

    ab.close()?;
    tokio::time::sleep(SETTLE).await;

    let (woken, still_blocked) = match (first.is_finished(), second.is_finished()) {
        (true, false) => (first, second),
        (false, true) => (second, first),
        other => panic!("expected exactly one accept_stream to wake, got {other:?}"),
    };
    assert_eq!(woken.await?.unwrap_err(), Error::ConnectionClosed);
    assert!(!still_blocked.is_finished());
    still_blocked.abort();
    Ok(())
}

#[tokio::test]
async fn test_connection_close_wakes_all_accept_streams() -> Result<()> {
    let config = NetworkConfig::seeded(16).with_wake_policy(WakePolicy::All);
    let (_net, eps) = network(config, 2)?;
    let (ab, _ba) = connect(&eps[0], &eps[1]).await?;
    let ab = Arc::new(ab);

    let waiters: Vec<_> = (0..3).map(|_| blocked_accept_stream(&ab)).collect();
    tokio::time::sleep(SETTLE).await;

    ab.close()?;
    for waiter in waiters {
        assert_eq!(within("woken accept_stream", waiter).await??.unwrap_err(), Error::ConnectionClosed);
    }
    Ok(())
}

/// A peer dialing itself holds two live connections, one per side.
#[tokio::test]
async fn test_self_dial_counts_both_sides() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(17), 1)?;
    let a = &eps[0];

    let (out, inbound) = connect(a, a).await?;
    assert_eq!(a.connection_count(), 2);

    out.close()?;
    assert_eq!(a.connection_count(), 1);
    assert!(!inbound.is_closed());
    drop(inbound);
    assert_eq!(a.connection_count(), 0);
    Ok(())
}
