//! Outbound sends.
//!
//! `Publisher::send` never blocks the caller. It returns a `PendingPublish`,
//! a future that resolves to the offset the record landed at or to a
//! `PublishError`. Callers that do not care may drop it; the send still
//! happens.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::broker::Broker;
use crate::broker::message::Message;
use crate::utils::PublishError;

pub type PublishResult = Result<u64, PublishError>;

#[derive(Debug)]
pub struct PendingPublish {
    rx: oneshot::Receiver<PublishResult>,
}

/// Sending half of a `PendingPublish`, held by whoever performs the send.
#[derive(Debug)]
pub struct PublishCompletion {
    tx: oneshot::Sender<PublishResult>,
}

impl PublishCompletion {
    pub fn complete(self, result: PublishResult) {
        // The receiver may already be gone; the send itself has happened.
        let _ = self.tx.send(result);
    }
}

impl PendingPublish {
    pub fn channel() -> (PublishCompletion, PendingPublish) {
        let (tx, rx) = oneshot::channel();
        (PublishCompletion { tx }, PendingPublish { rx })
    }

    /// A handle that is already resolved.
    pub fn ready(result: PublishResult) -> Self {
        let (completion, pending) = Self::channel();
        completion.complete(result);
        pending
    }
}

impl Future for PendingPublish {
    type Output = PublishResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PublishError::Dropped)))
    }
}

pub trait Publisher: Send + Sync {
    fn send(&self, topic: &str, message: Message) -> PendingPublish;
}

/// Publishes into the in-memory broker.
///
/// Inside a tokio runtime the append runs on a spawned task so the caller
/// never waits on the broker lock; outside one it runs inline.
#[derive(Debug, Clone)]
pub struct BrokerPublisher {
    broker: Arc<Mutex<Broker>>,
}

impl BrokerPublisher {
    pub fn new(broker: Arc<Mutex<Broker>>) -> Self {
        Self { broker }
    }
}

impl Publisher for BrokerPublisher {
    fn send(&self, topic: &str, message: Message) -> PendingPublish {
        let (completion, pending) = PendingPublish::channel();
        let broker = self.broker.clone();
        let topic = topic.to_string();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    completion.complete(append(&broker, &topic, message));
                });
            }
            Err(_) => completion.complete(append(&broker, &topic, message)),
        }

        pending
    }
}

fn append(broker: &Mutex<Broker>, topic: &str, message: Message) -> PublishResult {
    let mut broker = broker.lock().map_err(|_| PublishError::Poisoned)?;
    Ok(broker.publish(topic, message))
}
