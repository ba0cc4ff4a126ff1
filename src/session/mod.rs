//! Per-connection WebSocket session: reads [`ClientEnvelope`] requests off the
//! socket, dispatches them onto the [`Broker`], and writes the resulting
//! [`ServerEnvelope`] responses back, interleaved with a periodic heartbeat.
//!
//! Dispatch itself (`handle_*`) only depends on [`Sink`], not on the concrete
//! WebSocket transport, so it can be exercised directly in tests against the
//! broker's in-memory [`RecordingSink`](crate::broker::sink::test_sink::RecordingSink).
//! [`Session::run`] is the thin websocket-specific entry point that wires a
//! real socket into that dispatch loop.

pub mod ws_sink;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::stream::StreamExt;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::broker::subscriber;
use crate::broker::{Broker, ClientEnvelope, ErrorCode, InvalidId, Message, PublishMessage, ServerEnvelope, Sink, TopicError};

pub use ws_sink::WsSink;

/// Per-connection driver. Stateless beyond the broker handle, the heartbeat
/// cadence, and the process-wide shutdown signal; all per-connection state
/// (subscriptions, the connection's own local shutdown fan-out) lives on the
/// stack of [`Session::run`].
pub struct Session {
    broker: Arc<Broker>,
    heartbeat_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Session {
    pub fn new(broker: Arc<Broker>, heartbeat_interval: Duration, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            broker,
            heartbeat_interval,
            shutdown_rx,
        }
    }

    /// Drive one WebSocket connection to completion. Returns once the socket
    /// closes, a read error occurs, a close frame is received, or the
    /// process-wide shutdown signal fires; by then every subscription this
    /// session registered has been torn down.
    pub async fn run(self, socket: WebSocket) {
        let (sender, mut receiver) = socket.split();
        let sink: Arc<dyn Sink> = Arc::new(WsSink::new(sender));
        let (local_shutdown_tx, local_shutdown_rx) = watch::channel(false);

        let heartbeat = tokio::spawn(Self::heartbeat_loop(
            sink.clone(),
            self.heartbeat_interval,
            local_shutdown_rx,
        ));

        let mut subscriptions: Vec<(String, String)> = Vec::new();
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        debug!("process shutdown signaled, closing session");
                        break;
                    }
                }
                frame = receiver.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.handle_text(&text, &sink, &mut subscriptions).await;
                        }
                        Some(Ok(WsMessage::Close(_))) => break,
                        Some(Ok(_)) => {
                            // Binary/ping/pong frames carry no meaning in this protocol.
                        }
                        Some(Err(err)) => {
                            debug!(%err, "websocket read error, closing session");
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        let _ = local_shutdown_tx.send(true);
        let _ = heartbeat.await;

        for (topic_name, client_id) in subscriptions {
            if let Ok(topic) = self.broker.get_topic(&topic_name) {
                topic.unsubscribe(&client_id);
            }
        }
        sink.close().await;
    }

    async fn heartbeat_loop(sink: Arc<dyn Sink>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    if sink.write_envelope(&ServerEnvelope::heartbeat()).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str, sink: &Arc<dyn Sink>, subscriptions: &mut Vec<(String, String)>) {
        let envelope: ClientEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to parse client envelope");
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(None, ErrorCode::BadRequest, "Invalid message type"))
                    .await;
                return;
            }
        };

        match envelope {
            ClientEnvelope::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => {
                self.handle_subscribe(topic, client_id, last_n, request_id, sink, subscriptions)
                    .await;
            }
            ClientEnvelope::Unsubscribe {
                topic,
                client_id,
                request_id,
            } => {
                self.handle_unsubscribe(topic, client_id, request_id, sink, subscriptions).await;
            }
            ClientEnvelope::Publish {
                topic,
                message,
                request_id,
            } => {
                self.handle_publish(topic, message, request_id, sink).await;
            }
            ClientEnvelope::Ping { request_id } => {
                let _ = sink.write_envelope(&ServerEnvelope::pong(request_id)).await;
            }
        }
    }

    async fn handle_subscribe(
        &self,
        topic: String,
        client_id: String,
        last_n: Option<i64>,
        request_id: Option<String>,
        sink: &Arc<dyn Sink>,
        subscriptions: &mut Vec<(String, String)>,
    ) {
        if topic.trim().is_empty() || client_id.trim().is_empty() {
            warn!("subscribe request missing topic or client_id");
            let _ = sink
                .write_envelope(&ServerEnvelope::error(
                    request_id,
                    ErrorCode::BadRequest,
                    "topic and client_id are required",
                ))
                .await;
            return;
        }

        let topic_handle = match self.broker.get_topic(&topic) {
            Ok(t) => t,
            Err(err) => {
                warn!(%topic, %err, "subscribe to unknown topic");
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::TopicNotFound, err.to_string()))
                    .await;
                return;
            }
        };

        let last_n = last_n.map(|n| n.max(0) as usize);
        let (handle, rx) = match topic_handle.subscribe(client_id.clone(), sink.clone(), last_n) {
            Ok(pair) => pair,
            Err(err @ TopicError::AlreadySubscribed(_)) => {
                warn!(%topic, %client_id, %err, "duplicate subscribe");
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::Internal, err.to_string()))
                    .await;
                return;
            }
            Err(err @ TopicError::CapacityExceeded(_)) => {
                warn!(%topic, %client_id, %err, "subscriber capacity exceeded");
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::Internal, err.to_string()))
                    .await;
                return;
            }
        };

        // Write the ack before the delivery loop can touch the sink, so a
        // fast replay can never race ahead of it (see subscriber::delivery_loop).
        if sink
            .write_envelope(&ServerEnvelope::ack(request_id, topic.clone()))
            .await
            .is_err()
        {
            return;
        }

        let terminated = handle.terminated_flag();
        tokio::spawn(subscriber::delivery_loop(
            client_id.clone(),
            topic.clone(),
            terminated,
            sink.clone(),
            rx,
        ));
        subscriptions.push((topic, client_id));
    }

    async fn handle_unsubscribe(
        &self,
        topic: String,
        client_id: String,
        request_id: Option<String>,
        sink: &Arc<dyn Sink>,
        subscriptions: &mut Vec<(String, String)>,
    ) {
        if topic.trim().is_empty() || client_id.trim().is_empty() {
            let _ = sink
                .write_envelope(&ServerEnvelope::error(
                    request_id,
                    ErrorCode::BadRequest,
                    "topic and client_id are required",
                ))
                .await;
            return;
        }

        let topic_handle = match self.broker.get_topic(&topic) {
            Ok(t) => t,
            Err(err) => {
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::TopicNotFound, err.to_string()))
                    .await;
                return;
            }
        };

        if !topic_handle.unsubscribe(&client_id) {
            debug!(%topic, %client_id, "unsubscribe for a client that was not subscribed");
        }
        subscriptions.retain(|(t, c)| !(t == &topic && c == &client_id));
        let _ = sink.write_envelope(&ServerEnvelope::ack(request_id, topic)).await;
    }

    async fn handle_publish(&self, topic: String, message: PublishMessage, request_id: Option<String>, sink: &Arc<dyn Sink>) {
        if topic.trim().is_empty() {
            let _ = sink
                .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::BadRequest, "topic is required"))
                .await;
            return;
        }

        let message = match Message::admit(message.id, message.payload) {
            Ok(message) => message,
            Err(InvalidId(id)) => {
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(
                        request_id,
                        ErrorCode::BadRequest,
                        format!("'{id}' is not a valid UUID"),
                    ))
                    .await;
                return;
            }
        };

        let topic_handle = match self.broker.get_topic(&topic) {
            Ok(t) => t,
            Err(err) => {
                let _ = sink
                    .write_envelope(&ServerEnvelope::error(request_id, ErrorCode::TopicNotFound, err.to_string()))
                    .await;
                return;
            }
        };

        topic_handle.publish(message);
        let _ = sink.write_envelope(&ServerEnvelope::ack(request_id, topic)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::broker::TopicConfig;
    use crate::broker::sink::test_sink::RecordingSink;

    fn session(broker: Arc<Broker>) -> Session {
        let (_tx, rx) = watch::channel(false);
        Session::new(broker, Duration::from_secs(30), rx)
    }

    async fn wait_until_len(sink: &RecordingSink, n: usize) {
        for _ in 0..100 {
            if sink.written.lock().await.len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn subscribe_then_publish_delivers_ack_and_event_in_order() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        broker.create_topic("a").unwrap();
        let session = session(broker.clone());
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();
        let mut subs = Vec::new();

        session
            .handle_subscribe("a".into(), "c1".into(), None, Some("r1".into()), &dyn_sink, &mut subs)
            .await;
        assert_eq!(subs, vec![("a".to_string(), "c1".to_string())]);

        session
            .handle_publish(
                "a".into(),
                PublishMessage {
                    id: None,
                    payload: json!({"v": 1}),
                },
                Some("r2".into()),
                &dyn_sink,
            )
            .await;

        wait_until_len(&sink, 3).await;

        let written = sink.written.lock().await;
        // The subscribe ack is written before publish is even dispatched, so
        // it's first deterministically. The publish ack and the live event
        // race each other onto the shared sink (interleaving between sibling
        // tasks is unspecified), so only assert both eventually land.
        assert!(matches!(written[0], ServerEnvelope::Ack { .. }));
        assert_eq!(
            written[1..].iter().filter(|e| matches!(e, ServerEnvelope::Event { .. })).count(),
            1
        );
        assert_eq!(
            written[1..].iter().filter(|e| matches!(e, ServerEnvelope::Ack { .. })).count(),
            1
        );
    }

    #[tokio::test]
    async fn subscribe_replays_history_after_ack() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        let topic = broker.create_topic("a").unwrap();
        topic.publish(Message::admit(None, json!({"v": 1})).unwrap());
        topic.publish(Message::admit(None, json!({"v": 2})).unwrap());

        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();
        let mut subs = Vec::new();

        session
            .handle_subscribe("a".into(), "c1".into(), Some(1), None, &dyn_sink, &mut subs)
            .await;

        wait_until_len(&sink, 2).await;
        let written = sink.written.lock().await;
        assert!(matches!(written[0], ServerEnvelope::Ack { .. }));
        assert!(matches!(written[1], ServerEnvelope::Event { .. }));
    }

    #[tokio::test]
    async fn publish_to_unknown_topic_errors() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();

        session
            .handle_publish("missing".into(), PublishMessage { id: None, payload: json!(null) }, None, &dyn_sink)
            .await;

        let written = sink.written.lock().await;
        match &written[0] {
            ServerEnvelope::Error { error, .. } => assert_eq!(error.code, ErrorCode::TopicNotFound),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_with_invalid_uuid_is_bad_request() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        broker.create_topic("a").unwrap();
        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();

        session
            .handle_publish(
                "a".into(),
                PublishMessage {
                    id: Some("not-a-uuid".into()),
                    payload: json!(null),
                },
                None,
                &dyn_sink,
            )
            .await;

        let written = sink.written.lock().await;
        match &written[0] {
            ServerEnvelope::Error { error, .. } => assert_eq!(error.code, ErrorCode::BadRequest),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        broker.create_topic("a").unwrap();
        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();
        let mut subs = Vec::new();

        session
            .handle_unsubscribe("a".into(), "never-subscribed".into(), None, &dyn_sink, &mut subs)
            .await;

        let written = sink.written.lock().await;
        assert!(matches!(written[0], ServerEnvelope::Ack { .. }));
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();
        let mut subs = Vec::new();

        session
            .handle_text(r#"{"type":"ping","request_id":"r1"}"#, &dyn_sink, &mut subs)
            .await;

        let written = sink.written.lock().await;
        assert!(matches!(written[0], ServerEnvelope::Pong { .. }));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let broker = Arc::new(Broker::new(TopicConfig::default(), 10));
        let session = session(broker);
        let sink: Arc<RecordingSink> = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn Sink> = sink.clone();
        let mut subs = Vec::new();

        session.handle_text("not json", &dyn_sink, &mut subs).await;

        let written = sink.written.lock().await;
        match &written[0] {
            ServerEnvelope::Error { error, request_id, .. } => {
                assert_eq!(error.code, ErrorCode::BadRequest);
                assert_eq!(*request_id, None);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }
}
