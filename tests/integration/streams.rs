use std::sync::Arc;

use simnet::{Error, NetworkConfig};

use crate::*;

/// Two peers open a stream, trade ping/pong, and close.
#[tokio::test]
async fn test_ping_pong() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(1), 2)?;
    let (a, b) = (&eps[0], &eps[1]);
    let (ab, ba) = connect(a, b).await?;

    assert_eq!(ab.remote_peer(), b.peer_id());
    assert_eq!(ba.remote_peer(), a.peer_id());
    assert_eq!(ab.remote_multiaddr(), b.multiaddr());
    assert_eq!(ba.remote_public_key(), a.public_key());

    let ping = within("open stream", ab.open_stream()).await??;

    let responder = tokio::spawn(async move {
        let pong = ba.accept_stream().await?;
        let mut buf = [0u8; 16];
        let n = pong.read(&mut buf).await?;
        assert_eq!(&buf[..n], b"ping");
        pong.write(b"pong").await?;
        pong.close()?;
        Ok::<_, Error>((ba, pong))
    });

    assert_eq!(within("write ping", ping.write(b"ping")).await??, 4);
    let mut buf = [0u8; 16];
    let n = within("read pong", ping.read(&mut buf)).await??;
    assert_eq!(&buf[..n], b"pong");

    // Remote closed its write side: end-of-stream.
    assert_eq!(within("read eof", ping.read(&mut buf)).await??, 0);

    let (_ba, pong) = within("responder", responder).await???;

    // And the other way round.
    ping.close()?;
    assert_eq!(within("remote eof", pong.read(&mut buf)).await??, 0);
    Ok(())
}

/// Streams are accepted in the order they were opened.
#[tokio::test]
async fn test_stream_ordering() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(2), 2)?;
    let (ab, ba) = connect(&eps[0], &eps[1]).await?;
    let ab = Arc::new(ab);

    let s1 = within("open s1", ab.open_stream()).await??;
    // The queue holds one stream, so s2 waits until s1 is accepted.
    let opener = {
        let ab = ab.clone();
        tokio::spawn(async move { ab.open_stream().await })
    };

    let r1 = within("accept s1", ba.accept_stream()).await??;
    let s2 = within("open s2", opener).await???;
    let r2 = within("accept s2", ba.accept_stream()).await??;

    assert_eq!(r1.id(), s1.id());
    assert_eq!(r2.id(), s2.id());

    let tag = |s: simnet::Stream, msg: &'static [u8]| async move {
        s.write(msg).await?;
        s.close()?;
        Ok::<_, Error>(s)
    };
    let w1 = tokio::spawn(tag(s1, b"first"));
    let w2 = tokio::spawn(tag(s2, b"second"));
    assert_eq!(within("read r1", r1.read_to_end()).await??, b"first");
    assert_eq!(within("read r2", r2.read_to_end()).await??, b"second");
    within("writer 1", w1).await???;
    within("writer 2", w2).await???;
    Ok(())
}

/// Half-close keeps the reverse direction usable.
#[tokio::test]
async fn test_half_close() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(3), 2)?;
    let (ab, ba) = connect(&eps[0], &eps[1]).await?;

    let local = within("open", ab.open_stream()).await??;
    let remote = within("accept", ba.accept_stream()).await??;

    let sender = tokio::spawn(async move {
        local.write(b"request").await?;
        local.close()?;
        let reply = local.read_to_end().await?;
        Ok::<_, Error>(reply)
    });

    assert_eq!(within("request", remote.read_to_end()).await??, b"request");
    assert_eq!(
        within("write after peer close", remote.write(b"reply")).await?,
        Ok(5),
        "reverse direction stays open"
    );
    remote.close()?;
    assert_eq!(within("sender", sender).await???, b"reply");
    Ok(())
}

/// Reset fails pending and later operations on both sides.
#[tokio::test]
async fn test_reset() -> Result<()> {
    let (_net, eps) = network(NetworkConfig::seeded(4), 2)?;
    let (ab, ba) = connect(&eps[0], &eps[1]).await?;

    let local = within("open", ab.open_stream()).await??;
    let remote = Arc::new(within("accept", ba.accept_stream()).await??);

    let blocked_reader = {
        let remote = remote.clone();
        tokio::spawn(async move {
            let mut buf = [0u8; 8];
            remote.read(&mut buf).await
        })
    };
    tokio::time::sleep(SETTLE).await;
    assert!(!blocked_reader.is_finished());

    local.reset()?;

    assert_eq!(within("blocked read", blocked_reader).await??, Err(Error::StreamReset));
    let mut buf = [0u8; 8];
    assert_eq!(remote.read(&mut buf).await, Err(Error::StreamReset));
    assert_eq!(remote.write(b"x").await, Err(Error::StreamReset));
    assert_eq!(local.read(&mut buf).await, Err(Error::StreamReset));
    assert_eq!(local.write(b"x").await, Err(Error::StreamReset));

    // The connection itself is unaffected.
    let again = within("open after reset", ab.open_stream()).await??;
    let again_remote = within("accept after reset", ba.accept_stream()).await??;
    assert_eq!(again.id(), again_remote.id());
    Ok(())
}
