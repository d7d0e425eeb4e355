//! Deliveries and the acknowledgment capability that travels with them.
//!
//! A `Delivery` is one record handed to one consumer. It owns the right to
//! acknowledge or reject that record, and both methods consume it, so a
//! delivery can be settled once. A delivery dropped without being settled is
//! rejected back to its source and will be handed out again.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::broker::message::{Message, Record};
use crate::utils::{AckError, ConsumerError};

/// Settles a single in-flight delivery against the broker it came from.
pub trait Acknowledge: Send {
    fn acknowledge(&mut self) -> Result<(), AckError>;
    fn reject(&mut self) -> Result<(), AckError>;
}

/// A source of deliveries for one topic under one consumer group.
pub trait Inbox: Send + Sync {
    fn topic(&self) -> &str;
    fn group(&self) -> &str;

    /// Takes the next delivery, if any, without waiting.
    fn pull(&self) -> Result<Option<Delivery>, ConsumerError>;

    /// Notified whenever new records may be available.
    fn arrivals(&self) -> Arc<Notify>;
}

/// Terminal state of a handled delivery. Every variant is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processing succeeded.
    Processed,
    /// Processing failed and the message was republished with `retry`.
    Requeued { retry: u32 },
    /// Processing failed after `retries` retries; sent to the dead-letter topic.
    DeadLettered { retries: u32 },
}

/// Business handler bound to a topic in the listener registry.
pub trait DeliveryHandler: Send + Sync {
    fn handle(&self, message: &Message) -> Disposition;
}

pub struct Delivery {
    topic: String,
    record: Record,
    acker: Option<Box<dyn Acknowledge>>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, record: Record, acker: Box<dyn Acknowledge>) -> Self {
        Self {
            topic: topic.into(),
            record,
            acker: Some(acker),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn offset(&self) -> u64 {
        self.record.offset
    }

    pub fn message(&self) -> &Message {
        &self.record.message
    }

    pub fn acknowledge(mut self) -> Result<(), AckError> {
        match self.acker.take() {
            Some(mut acker) => acker.acknowledge(),
            None => Ok(()),
        }
    }

    pub fn reject(mut self) -> Result<(), AckError> {
        match self.acker.take() {
            Some(mut acker) => acker.reject(),
            None => Ok(()),
        }
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        if let Some(mut acker) = self.acker.take() {
            match acker.reject() {
                Ok(()) => debug!(
                    topic = %self.topic,
                    offset = self.record.offset,
                    "unsettled delivery returned for redelivery"
                ),
                Err(e) => warn!(
                    topic = %self.topic,
                    offset = self.record.offset,
                    "failed to return unsettled delivery: {e}"
                ),
            }
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("record", &self.record)
            .field("settled", &self.acker.is_none())
            .finish()
    }
}
