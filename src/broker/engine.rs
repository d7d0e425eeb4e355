//! Broker engine
//!
//! In-memory stand-in for a log-based broker. It exists so the pipeline has
//! something to pull deliveries from and publish to:
//! - one append-only log per topic, created on first publish or poll
//! - one cursor per consumer group, with manual acknowledgment: a polled
//!   offset stays in flight until it is acked, and a rejected offset is
//!   handed out again before newer records
//!
//! Concurrency and usage notes:
//! - The API is synchronous and designed to be held behind a lock
//!   (`Arc<Mutex<Broker>>`). Callers should not hold the lock across `.await`.
//! - Consumers that find nothing to do wait on `arrivals()`, which is
//!   notified on every publish.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

use crate::broker::message::{Message, Record};
use crate::broker::topic::Topic;
use crate::utils::AckError;

#[derive(Debug, Default)]
pub struct Broker {
    pub topics: HashMap<String, Topic>,
    arrivals: Arc<Notify>,
}

impl Broker {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            arrivals: Arc::new(Notify::new()),
        }
    }

    /// Appends `message` to `topic` and returns the assigned offset.
    pub fn publish(&mut self, topic: &str, message: Message) -> u64 {
        let offset = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .append(message);

        debug!(topic, offset, "record appended");
        self.arrivals.notify_waiters();
        offset
    }

    /// Hands the next record of `topic` to `group`, if there is one.
    pub fn poll(&mut self, topic: &str, group: &str) -> Option<Record> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .poll(group)
    }

    pub fn ack(&mut self, topic: &str, group: &str, offset: u64) -> Result<(), AckError> {
        self.topic_mut(topic)?.ack(group, offset)
    }

    pub fn reject(&mut self, topic: &str, group: &str, offset: u64) -> Result<(), AckError> {
        self.topic_mut(topic)?.reject(group, offset)
    }

    /// The group's delivery cursor: every offset below it has been acknowledged.
    pub fn committed_offset(&self, topic: &str, group: &str) -> u64 {
        self.topics
            .get(topic)
            .map_or(0, |t| t.committed_offset(group))
    }

    pub fn records(&self, topic: &str) -> &[Record] {
        self.topics
            .get(topic)
            .map(|t| t.log.as_slice())
            .unwrap_or_default()
    }

    pub fn topic_len(&self, topic: &str) -> u64 {
        self.records(topic).len() as u64
    }

    pub fn arrivals(&self) -> Arc<Notify> {
        self.arrivals.clone()
    }

    fn topic_mut(&mut self, topic: &str) -> Result<&mut Topic, AckError> {
        self.topics
            .get_mut(topic)
            .ok_or_else(|| AckError::UnknownTopic(topic.to_string()))
    }
}
