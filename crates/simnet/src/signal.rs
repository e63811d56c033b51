//! Close signalling for listeners and connections.
//!
//! A closed flag (a `watch` channel, so producers can await it) plus a
//! `Notify` that wakes blocked consumers. A woken consumer always re-reads
//! the flag and reports the closed error; it never hands out an item it
//! received after close.

use tokio::sync::{mpsc, watch, Mutex, Notify};

use simnet_core::WakePolicy;

use crate::error::{Error, Result};

pub(crate) struct CloseSignal {
    closed: watch::Sender<bool>,
    wake: Notify,
    policy: WakePolicy,
}

impl CloseSignal {
    pub(crate) fn new(policy: WakePolicy) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            closed,
            wake: Notify::new(),
            policy,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Set the flag and wake consumers per the policy.
    /// Returns false if this was already closed; nothing is woken then.
    pub(crate) fn close(&self) -> bool {
        if self.closed.send_replace(true) {
            return false;
        }
        match self.policy {
            WakePolicy::One => self.wake.notify_one(),
            WakePolicy::All => self.wake.notify_waiters(),
        }
        true
    }

    /// Resolves once closed. Producers race this against a full queue.
    pub(crate) async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives in `self`, so the channel cannot disconnect here.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Receive the next queued item, or `err` once closed.
    ///
    /// Under `WakePolicy::One` a close releases a single waiter; others
    /// blocked at the same moment keep waiting on the queue.
    pub(crate) async fn recv_or_closed<T>(
        &self,
        queue: &Mutex<mpsc::Receiver<T>>,
        err: Error,
    ) -> Result<T> {
        if self.is_closed() {
            return Err(err);
        }

        let woken = self.wake.notified();
        tokio::pin!(woken);
        // Register before the second check so a close in between is not missed.
        woken.as_mut().enable();
        if self.is_closed() {
            return Err(err);
        }

        tokio::select! {
            _ = &mut woken => Err(err),
            item = async { queue.lock().await.recv().await } => match item {
                Some(item) if !self.is_closed() => Ok(item),
                _ => Err(err),
            },
        }
    }

    /// Drop whatever is still queued, if no consumer currently holds the queue.
    pub(crate) fn drain<T>(queue: &Mutex<mpsc::Receiver<T>>) -> usize {
        let Ok(mut rx) = queue.try_lock() else {
            return 0;
        };
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
