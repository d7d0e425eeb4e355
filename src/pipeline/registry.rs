//! Explicit listener registration.
//!
//! Which handler consumes which topic is decided once at startup by
//! registering it here; the pipeline then spawns the workers for every entry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::delivery::DeliveryHandler;

pub struct Registration {
    pub topic: String,
    pub group: String,
    pub client_id_prefix: String,
    pub concurrency: usize,
    pub handler: Arc<dyn DeliveryHandler>,
}

impl Registration {
    pub fn new(
        topic: impl Into<String>,
        group: impl Into<String>,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        let topic = topic.into();
        Self {
            client_id_prefix: format!("{topic}-"),
            topic,
            group: group.into(),
            concurrency: 1,
            handler,
        }
    }

    /// Number of workers pulling for this listener; at least one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_id_prefix = prefix.into();
        self
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("topic", &self.topic)
            .field("group", &self.group)
            .field("client_id_prefix", &self.client_id_prefix)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

/// Registrations keyed by `(topic, group)`.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    registrations: BTreeMap<(String, String), Registration>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener, returning the one it replaced for the same topic and group.
    pub fn register(&mut self, registration: Registration) -> Option<Registration> {
        let key = (registration.topic.clone(), registration.group.clone());
        self.registrations.insert(key, registration)
    }

    pub fn get(&self, topic: &str, group: &str) -> Option<&Registration> {
        self.registrations
            .get(&(topic.to_string(), group.to_string()))
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    pub(crate) fn into_registrations(self) -> impl Iterator<Item = Registration> {
        self.registrations.into_values()
    }
}
