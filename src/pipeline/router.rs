//! Retry / dead-letter router
//!
//! Decides what happens to a delivery after the processor has looked at it:
//!
//! ```text
//! Received -> Processing -> Processed
//!                        -> Requeued      (failed, retries left: republish to primary)
//!                        -> DeadLettered  (failed, retries exhausted: send to DLQ)
//! ```
//!
//! Every terminal state is acknowledged by the consumer. Redelivery happens
//! through an explicit republish carrying an incremented `x-retry-count`,
//! never through broker-level redelivery, so the router keeps no state
//! between deliveries of the same logical message.
//!
//! Publishing is fire-and-forget from the router's point of view. The
//! pending result goes to the publish supervisor, and the delivery is
//! acknowledged without waiting for it. A send lost after that point drops
//! the message from its retry chain.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::broker::message::Message;
use crate::pipeline::codec;
use crate::pipeline::delivery::{DeliveryHandler, Disposition};
use crate::pipeline::processor::{ProcessingOutcome, Processor};
use crate::pipeline::publisher::Publisher;
use crate::pipeline::supervisor::{Destination, PublishContext, PublishTracker};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Topic names the two outbound destinations resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub primary: String,
    pub dead_letter: String,
}

impl Destinations {
    pub fn new(primary: impl Into<String>, dead_letter: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            dead_letter: dead_letter.into(),
        }
    }

    pub fn topic(&self, destination: Destination) -> &str {
        match destination {
            Destination::Primary => &self.primary,
            Destination::DeadLetter => &self.dead_letter,
        }
    }
}

pub struct Router {
    processor: Arc<dyn Processor>,
    publisher: Arc<dyn Publisher>,
    destinations: Destinations,
    max_retries: u32,
    tracker: Option<PublishTracker>,
}

impl Router {
    pub fn new(
        processor: Arc<dyn Processor>,
        publisher: Arc<dyn Publisher>,
        destinations: Destinations,
    ) -> Self {
        Self {
            processor,
            publisher,
            destinations,
            max_retries: DEFAULT_MAX_RETRIES,
            tracker: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Reports publish results to a supervisor instead of discarding them.
    pub fn with_tracker(mut self, tracker: PublishTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn submit(&self, destination: Destination, message: Message, retry: u32) {
        let topic = self.destinations.topic(destination);
        let key = message.key.clone();
        let pending = self.publisher.send(topic, message);

        match &self.tracker {
            Some(tracker) => tracker.track(
                PublishContext {
                    destination,
                    topic: topic.to_string(),
                    key,
                    retry,
                },
                pending,
            ),
            None => debug!(topic, key = %key, "publish submitted untracked"),
        }
    }
}

impl DeliveryHandler for Router {
    fn handle(&self, message: &Message) -> Disposition {
        let retries = codec::decode(&message.headers);
        let key = message.key.as_str();

        let reason = match self.processor.process(key, &message.payload) {
            ProcessingOutcome::Success => {
                debug!(key, retries, "processed");
                return Disposition::Processed;
            }
            ProcessingOutcome::Failure(reason) => reason,
        };

        warn!(key, retries, "processing failed: {reason}");

        if retries < self.max_retries {
            let retry = retries + 1;
            info!(
                key,
                topic = %self.destinations.primary,
                "re-publishing with retry={retry}"
            );
            let republished = Message {
                key: message.key.clone(),
                payload: message.payload.clone(),
                headers: codec::encode(&message.headers, retry),
            };
            self.submit(Destination::Primary, republished, retry);
            Disposition::Requeued { retry }
        } else {
            warn!(
                key,
                topic = %self.destinations.dead_letter,
                "max retries reached, sending to dead-letter topic"
            );
            self.submit(Destination::DeadLetter, message.clone(), retries);
            Disposition::DeadLettered { retries }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("destinations", &self.destinations)
            .field("max_retries", &self.max_retries)
            .field("tracked", &self.tracker.is_some())
            .finish()
    }
}
