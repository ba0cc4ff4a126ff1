//! Transport abstraction for delivering envelopes to a connected client.

use async_trait::async_trait;

use super::protocol::ServerEnvelope;

/// Capability a subscriber delivery loop needs from its transport.
///
/// The broker core never touches a WebSocket directly: it writes envelopes
/// through this trait, which lets the session handler supply a real socket
/// sink while tests use an in-memory one.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Write one envelope to the client. An error means the transport is gone.
    async fn write_envelope(&self, envelope: &ServerEnvelope) -> Result<(), SinkError>;

    /// Close the transport, e.g. after a slow-consumer eviction.
    async fn close(&self);
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("sink closed: {0}")]
pub struct SinkError(pub String);

/// In-memory sink used by broker unit tests and anything that wants to
/// assert on exactly what was written without standing up a socket.
#[cfg(test)]
pub mod test_sink {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingSink {
        pub written: Mutex<Vec<ServerEnvelope>>,
        pub closed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn write_envelope(&self, envelope: &ServerEnvelope) -> Result<(), SinkError> {
            if self.closed.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(SinkError("closed".into()));
            }
            self.written.lock().await.push(envelope.clone());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }
}
