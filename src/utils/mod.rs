//! The `utils` module provides shared definitions used across `redrive`:
//! the error types and the tracing subscriber setup.

pub mod error;
pub mod logging;

pub use error::{AckError, ArchiveError, ConsumerError, PublishError};
