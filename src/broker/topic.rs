//! A single topic: its subscriber set and replay history.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::TopicError;
use super::message::Message;
use super::protocol::ServerEnvelope;
use super::sink::Sink;
use super::subscriber::{self, SubscriberHandle};

/// Immutable configuration a topic is created with.
#[derive(Debug, Clone, Copy)]
pub struct TopicConfig {
    /// Maximum number of subscribers allowed at once.
    pub max_subscribers: usize,
    /// Number of most-recent messages retained for replay on subscribe.
    pub history_len: usize,
    /// Per-subscriber queue depth before eviction.
    pub queue_capacity: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 1_000,
            history_len: 100,
            queue_capacity: 256,
        }
    }
}

struct SubscriberEntry {
    handle: Arc<SubscriberHandle>,
    sink: Arc<dyn Sink>,
}

struct TopicState {
    subscribers: HashMap<String, SubscriberEntry>,
    history: VecDeque<Message>,
}

/// A named channel: subscribers plus a bounded replay ring.
///
/// All mutable state lives behind one `parking_lot::Mutex` per topic so
/// publish/subscribe/unsubscribe never interleave for the same topic while
/// different topics proceed fully in parallel.
pub struct Topic {
    pub name: String,
    config: TopicConfig,
    state: Mutex<TopicState>,
    messages_published: AtomicU64,
}

impl Topic {
    pub fn new(name: impl Into<String>, config: TopicConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(TopicState {
                subscribers: HashMap::new(),
                history: VecDeque::with_capacity(config.history_len),
            }),
            messages_published: AtomicU64::new(0),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Total number of messages ever published, independent of the bounded
    /// replay history.
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Register a new subscriber and queue up to `last_n` retained messages
    /// for replay, without starting delivery.
    ///
    /// Returns the subscriber's handle and its receiver; the caller is
    /// responsible for spawning [`subscriber::delivery_loop`] on the
    /// receiver once it is safe for events to reach the client (after the
    /// subscribe `ack` has been written), so a fast replay can never race
    /// ahead of it.
    pub fn subscribe(
        &self,
        client_id: String,
        sink: Arc<dyn Sink>,
        last_n: Option<usize>,
    ) -> Result<(Arc<SubscriberHandle>, mpsc::Receiver<ServerEnvelope>), TopicError> {
        let mut state = self.state.lock();
        if state.subscribers.contains_key(&client_id) {
            return Err(TopicError::AlreadySubscribed(client_id));
        }
        if state.subscribers.len() >= self.config.max_subscribers {
            return Err(TopicError::CapacityExceeded(self.config.max_subscribers));
        }

        let (handle, rx) = subscriber::new_handle(
            client_id.clone(),
            super::subscriber::SubscriberConfig {
                queue_capacity: self.config.queue_capacity,
            },
        );

        if let Some(n) = last_n {
            let skip = state.history.len().saturating_sub(n);
            for msg in state.history.iter().skip(skip) {
                handle.try_deliver(ServerEnvelope::event(self.name.clone(), msg.clone()));
            }
        }

        state.subscribers.insert(
            client_id,
            SubscriberEntry {
                handle: handle.clone(),
                sink,
            },
        );
        Ok((handle, rx))
    }

    /// Remove a subscriber without affecting its in-flight sink, if present.
    pub fn unsubscribe(&self, client_id: &str) -> bool {
        let mut state = self.state.lock();
        match state.subscribers.remove(client_id) {
            Some(entry) => {
                entry.handle.mark_terminated();
                true
            }
            None => false,
        }
    }

    /// Append `message` to history and fan it out to every live subscriber.
    /// Never blocks: subscribers whose queue is full are dropped from the map
    /// immediately and their eviction (terminal error write + sink close) is
    /// handed off to a background task, so the publish call itself always
    /// returns without waiting on any subscriber's transport.
    pub fn publish(&self, message: Message) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        let envelope = ServerEnvelope::event(self.name.clone(), message.clone());
        let mut state = self.state.lock();

        if state.history.len() == self.config.history_len && self.config.history_len > 0 {
            state.history.pop_front();
        }
        if self.config.history_len > 0 {
            state.history.push_back(message);
        }

        let topic_name = self.name.clone();
        state.subscribers.retain(|client_id, entry| {
            if entry.handle.try_deliver(envelope.clone()) {
                true
            } else {
                debug!(topic = %topic_name, %client_id, "evicting slow consumer");
                let client_id = client_id.clone();
                let topic_name = topic_name.clone();
                let handle = entry.handle.clone();
                let sink = entry.sink.clone();
                tokio::spawn(async move {
                    subscriber::evict_slow_consumer(&client_id, &topic_name, &handle, sink.as_ref()).await;
                });
                false
            }
        });
    }

    /// Snapshot of current subscriber client ids, for stats reporting.
    pub fn subscriber_ids(&self) -> Vec<String> {
        self.state.lock().subscribers.keys().cloned().collect()
    }
}
