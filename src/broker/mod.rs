//! In-memory publish/subscribe broker.
//!
//! The broker owns the topic registry; each [`Topic`] owns its own
//! subscriber set and history. Registry mutations (create/delete/list) take
//! the registry lock; everything inside a single topic (publish, subscribe,
//! unsubscribe) only ever takes that topic's own lock, so activity on one
//! topic never blocks another.

pub mod error;
pub mod message;
pub mod protocol;
pub mod sink;
pub mod subscriber;
pub mod topic;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::info;

pub use error::{BrokerError, TopicError};
pub use message::{InvalidId, Message};
pub use protocol::{ClientEnvelope, ErrorCode, PublishMessage, ServerEnvelope};
pub use sink::{Sink, SinkError};
pub use topic::{Topic, TopicConfig};

/// Per-topic stats surfaced by the management API.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TopicStats {
    pub name: String,
    pub subscriber_count: usize,
    pub history_len: usize,
    pub messages_published: u64,
}

/// Broker-wide health snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BrokerHealth {
    pub uptime_sec: u64,
    pub topic_count: usize,
    pub total_subscribers: usize,
}

/// The topic registry.
///
/// Creation and deletion of topics go through a broker-wide `RwLock`;
/// publish/subscribe/unsubscribe on an existing topic only need a read lock
/// on the registry plus that topic's own internal mutex.
pub struct Broker {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    default_config: TopicConfig,
    max_topics: usize,
    started_at: Instant,
}

impl Broker {
    pub fn new(default_config: TopicConfig, max_topics: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            default_config,
            max_topics,
            started_at: Instant::now(),
        }
    }

    /// Create a topic with the broker's default config. Errors if the name
    /// is empty, already taken, or the registry is at capacity.
    pub fn create_topic(&self, name: &str) -> Result<Arc<Topic>, BrokerError> {
        self.create_topic_with_config(name, self.default_config)
    }

    pub fn create_topic_with_config(&self, name: &str, config: TopicConfig) -> Result<Arc<Topic>, BrokerError> {
        if name.trim().is_empty() {
            return Err(BrokerError::EmptyName);
        }
        let mut topics = self.topics.write();
        if topics.contains_key(name) {
            return Err(BrokerError::NameInUse(name.to_string()));
        }
        if topics.len() >= self.max_topics {
            return Err(BrokerError::CapacityExceeded(self.max_topics));
        }
        let topic = Arc::new(Topic::new(name, config));
        topics.insert(name.to_string(), topic.clone());
        info!(topic = %name, "topic created");
        Ok(topic)
    }

    pub fn get_topic(&self, name: &str) -> Result<Arc<Topic>, BrokerError> {
        self.topics
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::NotFound(name.to_string()))
    }

    /// Delete a topic. Any connected subscribers' delivery tasks observe
    /// their sender dropped and exit on their own; the broker does not wait
    /// for them.
    pub fn delete_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut topics = self.topics.write();
        if topics.remove(name).is_none() {
            return Err(BrokerError::NotFound(name.to_string()));
        }
        info!(topic = %name, "topic deleted");
        Ok(())
    }

    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self, name: &str) -> Result<TopicStats, BrokerError> {
        let topic = self.get_topic(name)?;
        Ok(topic_stats(&topic))
    }

    /// Stats for every topic currently registered, for the bulk `GET
    /// /api/v1/stats` endpoint.
    pub fn all_stats(&self) -> Vec<TopicStats> {
        self.topics.read().values().map(|t| topic_stats(t)).collect()
    }

    pub fn health(&self) -> BrokerHealth {
        let topics = self.topics.read();
        let total_subscribers = topics.values().map(|t| t.subscriber_count()).sum();
        BrokerHealth {
            uptime_sec: self.started_at.elapsed().as_secs(),
            topic_count: topics.len(),
            total_subscribers,
        }
    }
}

fn topic_stats(topic: &Topic) -> TopicStats {
    TopicStats {
        name: topic.name.clone(),
        subscriber_count: topic.subscriber_count(),
        history_len: topic.history_len(),
        messages_published: topic.messages_published(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker() -> Broker {
        Broker::new(TopicConfig::default(), 100)
    }

    #[test]
    fn create_topic_rejects_duplicate_name() {
        let broker = broker();
        broker.create_topic("a").unwrap();
        let err = broker.create_topic("a").unwrap_err();
        assert_eq!(err, BrokerError::NameInUse("a".into()));
    }

    #[test]
    fn create_topic_rejects_empty_name() {
        let broker = broker();
        let err = broker.create_topic("  ").unwrap_err();
        assert_eq!(err, BrokerError::EmptyName);
    }

    #[test]
    fn delete_topic_then_get_is_not_found() {
        let broker = broker();
        broker.create_topic("a").unwrap();
        broker.delete_topic("a").unwrap();
        let err = broker.get_topic("a").unwrap_err();
        assert_eq!(err, BrokerError::NotFound("a".into()));
    }

    #[test]
    fn list_topics_is_sorted() {
        let broker = broker();
        broker.create_topic("b").unwrap();
        broker.create_topic("a").unwrap();
        assert_eq!(broker.list_topics(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn registry_enforces_max_topics() {
        let broker = Broker::new(TopicConfig::default(), 1);
        broker.create_topic("a").unwrap();
        let err = broker.create_topic("b").unwrap_err();
        assert_eq!(err, BrokerError::CapacityExceeded(1));
    }

    #[test]
    fn health_reports_topic_and_subscriber_counts() {
        let broker = broker();
        broker.create_topic("a").unwrap();
        let health = broker.health();
        assert_eq!(health.topic_count, 1);
        assert_eq!(health.total_subscribers, 0);
    }
}
