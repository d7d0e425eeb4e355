//! The `error` module defines the error types used within `redrive`.
//!
//! Business-level processing failures are not errors here: they are a
//! `ProcessingOutcome` and drive the retry decision. The types below cover the
//! broker-facing failures (acknowledgment, publishing) and the dead-letter
//! archive.

use thiserror::Error;

/// Failure to acknowledge or reject a delivery.
///
/// Fatal to the handling of that one delivery; the consumer logs it and
/// keeps pulling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AckError {
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    #[error("consumer group '{group}' has never polled topic '{topic}'")]
    UnknownGroup { topic: String, group: String },
    #[error("offset {offset} of '{topic}' is not in flight for group '{group}'")]
    NotInFlight {
        topic: String,
        group: String,
        offset: u64,
    },
    #[error("broker lock poisoned")]
    Poisoned,
}

/// Failure of an outbound send (republish or dead-letter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("broker lock poisoned")]
    Poisoned,
    #[error("publish completion dropped before a result was reported")]
    Dropped,
}

/// Errors surfaced by the intake consumer loop.
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("failed to pull from '{topic}': broker lock poisoned")]
    Poll { topic: String },
    #[error(transparent)]
    Ack(#[from] AckError),
}

/// Errors from the sled-backed dead-letter archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("archive serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
