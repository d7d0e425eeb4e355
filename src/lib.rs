//! # redrive
//!
//! `redrive` is a bounded-retry, dead-letter-routing message consumer. It
//! processes deliveries under manual acknowledgment, carries each message's
//! retry count in an `x-retry-count` header, republishes failures until the
//! retry limit and then routes them to a dead-letter topic.
//!
//! ## Core Modules
//!
//! - `pipeline`: the retry codec, processor hook, router, publisher, intake
//!   consumer and the registry/runner that wires them to topics.
//! - `broker`: an in-memory log broker with consumer groups and manual
//!   acknowledgment, used as the message source and sink.
//! - `persistence`: a `sled` archive of dead-lettered messages.
//! - `config`: loading and validating settings.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod persistence;
pub mod pipeline;
pub mod utils;

#[cfg(test)]
mod tests;
