//! Lossless, non-blocking event queue

use tokio::sync::mpsc;

/// Producer half. Cloneable so several background tasks can report.
#[derive(Debug)]
pub struct RelaySender<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for RelaySender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> RelaySender<T> {
    /// Enqueue without waiting for the consumer. Returns `false` once the
    /// presentation side has gone away.
    pub fn send(&self, item: T) -> bool {
        self.tx.send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the presentation loop.
#[derive(Debug)]
pub struct RelayReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> RelayReceiver<T> {
    /// Take everything queued right now, in enqueue order.
    ///
    /// Never blocks; items enqueued while draining are left for the next
    /// call so the cost stays proportional to what was queued on entry.
    pub fn drain(&mut self) -> Vec<T> {
        let pending = self.rx.len();
        let mut items = Vec::with_capacity(pending);
        for _ in 0..pending {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        items
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Wait for the next item. Used by headless callers and tests.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Create a connected sender/receiver pair.
pub fn relay<T>() -> (RelaySender<T>, RelayReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelaySender { tx }, RelayReceiver { rx })
}
