//! [`Sink`] implementation backed by a real `axum` WebSocket.
//!
//! The broker core never touches `axum::extract::ws` directly; this is the
//! one place that bridges the transport-agnostic [`Sink`] trait onto an
//! actual socket. The send half is wrapped in a `tokio::sync::Mutex` so the
//! session's own writes (ack/pong/heartbeat) and every subscriber delivery
//! loop spawned for this connection serialize onto the same frame stream
//! without ever interleaving a partial JSON frame.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;

use crate::broker::{ServerEnvelope, Sink, SinkError};

pub struct WsSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl Sink for WsSink {
    async fn write_envelope(&self, envelope: &ServerEnvelope) -> Result<(), SinkError> {
        let text = serde_json::to_string(envelope)
            .map_err(|err| SinkError(format!("failed to serialize envelope: {err}")))?;
        self.sender
            .lock()
            .await
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| SinkError(err.to_string()))
    }

    async fn close(&self) {
        let _ = self.sender.lock().await.close().await;
    }
}
