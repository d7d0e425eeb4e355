//! Dead-letter archive backed by `sled`
//!
//! Keeps the messages that reached the dead-letter topic so an operator can
//! inspect them after the fact. Each topic gets its own tree; keys are a
//! zero-padded millisecond timestamp followed by a UUID, so iteration yields
//! entries in arrival order.
//!
//! Retention options:
//! - `ttl_seconds`: entries older than this are removed on load
//! - `max_entries`: cap per topic; the oldest entries are removed on store

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::warn;
use uuid::Uuid;

use crate::broker::message::{Headers, Message};
use crate::pipeline::codec;
use crate::utils::ArchiveError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchivedMessage {
    pub key: String,
    pub payload: String,
    pub retry_count: u32,
    pub headers: Headers,
    pub archived_at: i64,
}

#[derive(Clone)]
pub struct DeadLetterArchive {
    db: Db,
    ttl_seconds: Option<i64>,
    max_entries: Option<usize>,
}

impl DeadLetterArchive {
    /// Open or create a sled database at `path` with the given retention.
    pub fn open(
        path: &str,
        ttl_seconds: Option<i64>,
        max_entries: Option<usize>,
    ) -> Result<Self, ArchiveError> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            ttl_seconds,
            max_entries,
        })
    }

    pub fn store(&self, topic: &str, message: &Message) -> Result<(), ArchiveError> {
        let entry = ArchivedMessage {
            key: message.key.clone(),
            payload: message.payload.clone(),
            retry_count: codec::decode(&message.headers),
            headers: message.headers.clone(),
            archived_at: Utc::now().timestamp_millis(),
        };

        let serialized = serde_json::to_vec(&entry)?;
        let tree = self.db.open_tree(topic)?;
        let key = format!("{:020}_{}", entry.archived_at, Uuid::new_v4());
        tree.insert(key.as_bytes(), serialized)?;

        if let Some(max) = self.max_entries {
            let total = tree.len();
            if total > max {
                let excess: Vec<_> = tree
                    .iter()
                    .take(total - max)
                    .filter_map(|entry| entry.ok().map(|(k, _)| k))
                    .collect();
                for key in excess {
                    tree.remove(key)?;
                }
            }
        }

        Ok(())
    }

    /// Entries for `topic` in arrival order, after applying the TTL.
    pub fn load(&self, topic: &str) -> Result<Vec<ArchivedMessage>, ArchiveError> {
        self.expire(topic)?;
        let tree = self.db.open_tree(topic)?;

        let mut entries = Vec::new();
        for item in tree.iter() {
            let (key, value) = item?;
            match serde_json::from_slice(&value) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    topic,
                    key = %String::from_utf8_lossy(&key),
                    "skipping unreadable archive entry: {e}"
                ),
            }
        }
        Ok(entries)
    }

    pub fn len(&self, topic: &str) -> Result<usize, ArchiveError> {
        Ok(self.db.open_tree(topic)?.len())
    }

    pub fn flush(&self) -> Result<(), ArchiveError> {
        self.db.flush()?;
        Ok(())
    }

    fn expire(&self, topic: &str) -> Result<(), ArchiveError> {
        let Some(ttl) = self.ttl_seconds else {
            return Ok(());
        };
        let expiry = Utc::now()
            .timestamp_millis()
            .saturating_sub(ttl.saturating_mul(1000));

        let tree = self.db.open_tree(topic)?;
        let expired: Vec<_> = tree
            .iter()
            .filter_map(|res| res.ok())
            .filter_map(|(key, _)| {
                let ts = std::str::from_utf8(&key)
                    .ok()?
                    .split_once('_')?
                    .0
                    .parse::<i64>()
                    .ok()?;
                (ts < expiry).then_some(key)
            })
            .collect();

        for key in expired {
            tree.remove(key)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DeadLetterArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterArchive")
            .field("db", &"sled::Db")
            .field("ttl_seconds", &self.ttl_seconds)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
