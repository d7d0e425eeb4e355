//! The `persistence` module keeps dead-lettered messages for inspection.
//!
//! Retry state is never stored here: it travels in the message headers. Only
//! messages that exhausted their retries end up in the archive, which uses
//! `sled` as an embedded key-value store.

pub mod sled_store;

pub use sled_store::{ArchivedMessage, DeadLetterArchive};
