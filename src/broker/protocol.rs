//! Wire envelope types shared by the session handler and the broker core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

/// Client -> server request envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Subscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        last_n: Option<i64>,
        #[serde(default)]
        request_id: Option<String>,
    },
    Unsubscribe {
        topic: String,
        client_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    Publish {
        topic: String,
        message: PublishMessage,
        #[serde(default)]
        request_id: Option<String>,
    },
    Ping {
        #[serde(default)]
        request_id: Option<String>,
    },
}

/// The `message` field of a publish request: an optional client-supplied id plus a payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Error codes surfaced on the wire protocol and the management API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    TopicNotFound,
    SlowConsumer,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Server -> client response/event envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    Ack {
        request_id: Option<String>,
        topic: String,
        status: &'static str,
        ts: DateTime<Utc>,
    },
    Event {
        topic: String,
        message: Message,
        ts: DateTime<Utc>,
    },
    Error {
        request_id: Option<String>,
        error: ErrorBody,
        ts: DateTime<Utc>,
    },
    Pong {
        request_id: Option<String>,
        ts: DateTime<Utc>,
    },
    Info {
        msg: &'static str,
        ts: DateTime<Utc>,
    },
}

impl ServerEnvelope {
    pub fn ack(request_id: Option<String>, topic: impl Into<String>) -> Self {
        Self::Ack {
            request_id,
            topic: topic.into(),
            status: "ok",
            ts: Utc::now(),
        }
    }

    pub fn event(topic: impl Into<String>, message: Message) -> Self {
        Self::Event {
            topic: topic.into(),
            message,
            ts: Utc::now(),
        }
    }

    pub fn error(request_id: Option<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            request_id,
            error: ErrorBody::new(code, message),
            ts: Utc::now(),
        }
    }

    pub fn slow_consumer() -> Self {
        Self::Error {
            request_id: None,
            error: ErrorBody::new(ErrorCode::SlowConsumer, "Subscriber queue overflow"),
            ts: Utc::now(),
        }
    }

    pub fn pong(request_id: Option<String>) -> Self {
        Self::Pong {
            request_id,
            ts: Utc::now(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::Info {
            msg: "ping",
            ts: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscribe_envelope() {
        let json = r#"{"type":"subscribe","topic":"a","client_id":"c1","last_n":5}"#;
        let env: ClientEnvelope = serde_json::from_str(json).unwrap();
        match env {
            ClientEnvelope::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => {
                assert_eq!(topic, "a");
                assert_eq!(client_id, "c1");
                assert_eq!(last_n, Some(5));
                assert_eq!(request_id, None);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn parses_publish_envelope_without_id() {
        let json = r#"{"type":"publish","topic":"a","message":{"payload":{"v":1}}}"#;
        let env: ClientEnvelope = serde_json::from_str(json).unwrap();
        match env {
            ClientEnvelope::Publish { topic, message, .. } => {
                assert_eq!(topic, "a");
                assert_eq!(message.id, None);
                assert_eq!(message.payload, serde_json::json!({"v": 1}));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let json = r#"{"type":"bogus"}"#;
        assert!(serde_json::from_str::<ClientEnvelope>(json).is_err());
    }

    #[test]
    fn serializes_event_envelope() {
        let msg = Message {
            id: "11111111-1111-1111-1111-111111111111".into(),
            payload: serde_json::json!({"v": 1}),
        };
        let env = ServerEnvelope::event("a", msg);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["topic"], "a");
        assert_eq!(value["message"]["id"], "11111111-1111-1111-1111-111111111111");
    }
}
