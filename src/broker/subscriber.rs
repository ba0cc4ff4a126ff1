//! Per-subscriber delivery queue and fan-out task.
//!
//! A subscriber's lifecycle is split in two so the session layer controls
//! exactly when delivery starts: [`new_handle`] only allocates the bounded
//! queue and registers the subscriber with its topic; [`delivery_loop`] is a
//! plain `async fn` the caller spawns once it is safe for events to start
//! hitting the wire. The session uses this to guarantee a subscribe's `ack`
//! is written before any replayed or live event for that subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::ServerEnvelope;
use super::sink::Sink;

/// A subscriber's outbound queue is non-blocking from the publisher's side:
/// `try_send` either enqueues or the subscriber is evicted. There is no
/// backpressure on the publish path.
#[derive(Debug, Clone, Copy)]
pub struct SubscriberConfig {
    pub queue_capacity: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// A single subscriber's handle into its topic: holds the sending half of its
/// delivery queue and a flag the owning topic flips once the subscriber has
/// been evicted, so a racing publish doesn't resurrect a dead entry.
///
/// The delivery loop never clones this handle, only [`terminated_flag`]; the
/// only strong owner of `tx` is whatever holds this `Arc` (the topic's
/// subscriber map). That way dropping the topic's entry on unsubscribe/delete
/// closes the queue and the delivery loop exits on its own.
pub struct SubscriberHandle {
    pub client_id: String,
    tx: mpsc::Sender<ServerEnvelope>,
    terminated: Arc<AtomicBool>,
}

impl SubscriberHandle {
    /// Enqueue an envelope without blocking. Returns `false` if the queue was
    /// full or the subscriber already terminated; the caller (the topic) is
    /// responsible for evicting on `false`.
    pub fn try_deliver(&self, envelope: ServerEnvelope) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            return false;
        }
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    /// A clone of the termination flag, for [`delivery_loop`] to flip on exit
    /// without holding this handle (and therefore `tx`) alive.
    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        self.terminated.clone()
    }
}

/// Allocate a fresh bounded queue and its handle. The returned receiver must
/// be handed to [`delivery_loop`] for the subscriber to ever receive anything.
pub fn new_handle(
    client_id: String,
    config: SubscriberConfig,
) -> (Arc<SubscriberHandle>, mpsc::Receiver<ServerEnvelope>) {
    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let handle = Arc::new(SubscriberHandle {
        client_id,
        tx,
        terminated: Arc::new(AtomicBool::new(false)),
    });
    (handle, rx)
}

/// Drain `rx` into `sink` in order until the queue closes or a write fails.
/// On exit, marks the subscriber terminated and closes the sink.
pub async fn delivery_loop(
    client_id: String,
    topic: String,
    terminated: Arc<AtomicBool>,
    sink: Arc<dyn Sink>,
    mut rx: mpsc::Receiver<ServerEnvelope>,
) {
    while let Some(envelope) = rx.recv().await {
        if let Err(err) = sink.write_envelope(&envelope).await {
            debug!(%client_id, %topic, %err, "sink write failed, dropping subscriber");
            break;
        }
    }
    terminated.store(true, Ordering::Release);
    sink.close().await;
}

/// Evict a subscriber after its queue overflowed: mark it terminated so no
/// further publishes race onto it, then best-effort notify the client before
/// the transport is torn down.
pub async fn evict_slow_consumer(client_id: &str, topic: &str, handle: &SubscriberHandle, sink: &dyn Sink) {
    warn!(%client_id, %topic, "evicting slow consumer");
    handle.mark_terminated();
    let _ = sink.write_envelope(&ServerEnvelope::slow_consumer()).await;
    sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::super::sink::test_sink::RecordingSink;
    use super::*;

    fn envelope() -> ServerEnvelope {
        ServerEnvelope::event(
            "t",
            super::super::message::Message::admit(None, serde_json::json!({"v": 1})).unwrap(),
        )
    }

    #[tokio::test]
    async fn delivers_enqueued_envelope() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let (handle, rx) = new_handle("c1".into(), SubscriberConfig::default());
        assert!(handle.try_deliver(envelope()));
        let flag = handle.terminated_flag();
        let join = tokio::spawn(delivery_loop("c1".into(), "t".into(), flag, sink.clone(), rx));
        drop(handle);
        let _ = join.await;
        assert_eq!(sink.written.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn try_deliver_fails_once_terminated() {
        let (handle, _rx) = new_handle("c1".into(), SubscriberConfig { queue_capacity: 1 });
        handle.mark_terminated();
        assert!(!handle.try_deliver(envelope()));
    }

    #[tokio::test]
    async fn try_deliver_fails_once_queue_is_full() {
        let (handle, _rx) = new_handle("c1".into(), SubscriberConfig { queue_capacity: 1 });
        // Nobody drains `_rx` here, so the second send overflows the queue.
        assert!(handle.try_deliver(envelope()));
        assert!(!handle.try_deliver(envelope()));
    }

    #[tokio::test]
    async fn evict_marks_terminated_and_closes() {
        let sink = Arc::new(RecordingSink::default());
        let (handle, _rx) = new_handle("c1".into(), SubscriberConfig::default());
        evict_slow_consumer("c1", "t", &handle, sink.as_ref()).await;
        assert!(handle.is_terminated());
        assert!(sink.closed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropping_handle_closes_the_queue_for_the_delivery_loop() {
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let (handle, rx) = new_handle("c1".into(), SubscriberConfig::default());
        let flag = handle.terminated_flag();
        let join = tokio::spawn(delivery_loop("c1".into(), "t".into(), flag, sink.clone(), rx));
        drop(handle);
        tokio::time::timeout(std::time::Duration::from_millis(200), join)
            .await
            .expect("delivery loop should exit once its queue is closed")
            .unwrap();
        assert!(sink.closed.load(std::sync::atomic::Ordering::SeqCst));
    }
}
