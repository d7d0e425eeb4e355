//! Message definitions for the broker
//!
//! `Message` is the unit that travels through the pipeline: a key used as an
//! ordering hint, an opaque payload and an ordered list of headers. Headers
//! may repeat a name; lookups return the last occurrence, the same way a
//! Kafka record's `lastHeader` does.
//!
//! `Record` is a `Message` once the broker has appended it to a topic log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

/// Ordered metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a header, keeping any earlier entries with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.push(name, value);
        self
    }

    /// Value of the last header called `name`.
    pub fn last(&self, name: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .rev()
            .find(|h| h.name == name)
            .map(|h| h.value.as_slice())
    }

    /// Copy of these headers with every entry called `name` removed.
    pub fn without(&self, name: &str) -> Self {
        Self(self.0.iter().filter(|h| h.name != name).cloned().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub key: String,
    pub payload: String,
    #[serde(default)]
    pub headers: Headers,
}

impl Message {
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push(name, value);
        self
    }
}

/// A message stored in a topic log.
///
/// - `offset`: position in the topic log, starting at 0
/// - `timestamp`: milliseconds since UNIX epoch; set by the broker on append
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub offset: u64,
    pub timestamp: i64,
    pub message: Message,
}
