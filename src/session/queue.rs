//! Message rendezvous queue
//!
//! Three concurrent contexts meet here: the background reader task that
//! continuously pulls inbound protocol messages off the wire, the
//! user-input task that hands over a collected secret, and the driver
//! executing the phases. All coordination goes through one bounded
//! channel of [`QueuedItem`]s; the only other shared state is the
//! session's atomic abort flag.
//!
//! The consumer never blocks indefinitely: every wait is bounded by
//! [`QUEUE_POLL_INTERVAL`] so an abort requested by `teardown()` is
//! observed within one interval even while no message arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::message::{MessageSource, PairingMessage};
use crate::PairingError;

/// Upper bound on abort latency: the driver re-checks the abort flag at
/// least this often while waiting on the queue, and the reader observes
/// a shutdown signal at the same granularity or better.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Queue capacity. Generous for a protocol that is strictly
/// request/response; a full queue only ever rejects a redundant
/// `set_secret`.
pub(crate) const QUEUE_CAPACITY: usize = 16;

/// One item flowing through the rendezvous queue. The enum guarantees
/// exactly one populated variant per item.
#[derive(Debug)]
pub(crate) enum QueuedItem {
    /// Inbound protocol message delivered by the reader.
    Message(PairingMessage),
    /// Secret captured from the user via `SessionHandle::set_secret`.
    Secret(Vec<u8>),
    /// Propagated transport/protocol failure; the producer stops after
    /// enqueueing one of these.
    Failure(PairingError),
}

/// Consumer side of the rendezvous queue, owned by the session driver.
pub(crate) struct Rendezvous {
    rx: mpsc::Receiver<QueuedItem>,
    abort: Arc<AtomicBool>,
}

impl Rendezvous {
    /// Create the queue; returns the consumer and the shared producer
    /// handle.
    pub(crate) fn new(abort: Arc<AtomicBool>) -> (Self, mpsc::Sender<QueuedItem>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        (Self { rx, abort }, tx)
    }

    /// Dequeue the next item.
    ///
    /// Waits at most [`QUEUE_POLL_INTERVAL`] at a time before re-checking
    /// the abort flag. `None` means the session was torn down (or every
    /// producer is gone) and no further progress is possible.
    pub(crate) async fn next(&mut self) -> Option<QueuedItem> {
        loop {
            if self.abort.load(Ordering::SeqCst) {
                debug!("queue consumer observed abort");
                return None;
            }
            match timeout(QUEUE_POLL_INTERVAL, self.rx.recv()).await {
                Ok(Some(item)) => return Some(item),
                Ok(None) => return None,
                Err(_) => trace!("queue poll interval elapsed, re-checking abort"),
            }
        }
    }
}

/// Spawn the background reader: pulls one message at a time from the
/// wire and enqueues it; on any read failure enqueues the wrapped error
/// and stops. The `shutdown` signal cancels a read in progress and a
/// blocked enqueue alike.
pub(crate) fn spawn_reader(
    mut source: Box<dyn MessageSource>,
    tx: mpsc::Sender<QueuedItem>,
    shutdown: Arc<Notify>,
    abort: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if abort.load(Ordering::SeqCst) {
                debug!("reader observed abort, stopping");
                return;
            }
            let item = tokio::select! {
                _ = shutdown.notified() => {
                    debug!("reader received shutdown signal");
                    return;
                }
                result = source.next_message() => match result {
                    Ok(message) => {
                        trace!(kind = %message.kind(), "reader enqueueing message");
                        QueuedItem::Message(message)
                    }
                    Err(error) => {
                        debug!(%error, "reader stopping on wire failure");
                        enqueue(&tx, &shutdown, QueuedItem::Failure(error)).await;
                        return;
                    }
                },
            };
            if !enqueue(&tx, &shutdown, item).await {
                return;
            }
        }
    })
}

/// Enqueue one item, giving up on shutdown. The queue is bounded, so a
/// send can block while the consumer is not draining; the reader must
/// still observe a teardown in that state. Returns false when the reader
/// should stop.
async fn enqueue(
    tx: &mpsc::Sender<QueuedItem>,
    shutdown: &Arc<Notify>,
    item: QueuedItem,
) -> bool {
    tokio::select! {
        _ = shutdown.notified() => {
            debug!("reader received shutdown signal while enqueueing");
            false
        }
        sent = tx.send(item) => {
            if sent.is_err() {
                debug!("queue consumer gone, reader stopping");
            }
            sent.is_ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Instant;

    struct SilentSource;

    #[async_trait]
    impl MessageSource for SilentSource {
        async fn next_message(&mut self) -> crate::Result<PairingMessage> {
            // Never yields a message, like an idle transport.
            std::future::pending().await
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MessageSource for FailingSource {
        async fn next_message(&mut self) -> crate::Result<PairingMessage> {
            Err(PairingError::Transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )))
        }
    }

    #[tokio::test]
    async fn test_abort_observed_within_one_poll_interval() {
        let abort = Arc::new(AtomicBool::new(false));
        let (mut queue, _tx) = Rendezvous::new(abort.clone());

        let waiter = tokio::spawn(async move { queue.next().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let start = Instant::now();
        abort.store(true, Ordering::SeqCst);

        let item = waiter.await.unwrap();
        assert!(item.is_none());
        assert!(start.elapsed() <= QUEUE_POLL_INTERVAL + Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_items_flow_through() {
        let abort = Arc::new(AtomicBool::new(false));
        let (mut queue, tx) = Rendezvous::new(abort);

        tx.send(QueuedItem::Secret(vec![1, 2, 3])).await.unwrap();
        match queue.next().await {
            Some(QueuedItem::Secret(secret)) => assert_eq!(secret, vec![1, 2, 3]),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reader_enqueues_failure_and_stops() {
        let abort = Arc::new(AtomicBool::new(false));
        let (mut queue, tx) = Rendezvous::new(abort.clone());
        let shutdown = Arc::new(Notify::new());

        let reader = spawn_reader(Box::new(FailingSource), tx, shutdown, abort);

        match queue.next().await {
            Some(QueuedItem::Failure(PairingError::Transport(_))) => {}
            other => panic!("unexpected item: {other:?}"),
        }
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_stops_reader_blocked_on_full_queue() {
        struct FloodingSource;

        #[async_trait]
        impl MessageSource for FloodingSource {
            async fn next_message(&mut self) -> crate::Result<PairingMessage> {
                Ok(PairingMessage::ConfigurationAck)
            }
        }

        let abort = Arc::new(AtomicBool::new(false));
        // The consumer is kept alive but never drains, so the reader
        // fills the queue and blocks inside the enqueue.
        let (_queue, tx) = Rendezvous::new(abort.clone());
        let shutdown = Arc::new(Notify::new());

        let reader = spawn_reader(Box::new(FloodingSource), tx, shutdown.clone(), abort.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        abort.store(true, Ordering::SeqCst);
        shutdown.notify_one();

        tokio::time::timeout(QUEUE_POLL_INTERVAL + Duration::from_millis(200), reader)
            .await
            .expect("reader did not stop after teardown while the queue was full")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_blocked_reader() {
        let abort = Arc::new(AtomicBool::new(false));
        let (_queue, tx) = Rendezvous::new(abort.clone());
        let shutdown = Arc::new(Notify::new());

        let reader = spawn_reader(Box::new(SilentSource), tx, shutdown.clone(), abort);

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.notify_one();

        // The reader must exit promptly even though the transport never
        // produced a message.
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader did not stop on shutdown")
            .unwrap();
    }
}
