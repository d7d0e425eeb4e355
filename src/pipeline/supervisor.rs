//! Publish supervisor
//!
//! The router hands every `PendingPublish` it creates to a `PublishTracker`
//! instead of awaiting it. The `PublishSupervisor` owns the other end of that
//! channel, awaits the handles concurrently and turns their results into log
//! lines and counters. It is the only place a failed republish or dead-letter
//! send becomes visible: the original delivery has already been acknowledged
//! by then.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::pipeline::publisher::{PendingPublish, PublishResult};

/// Which outbound path a send belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Primary,
    DeadLetter,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Primary => f.write_str("primary"),
            Destination::DeadLetter => f.write_str("dead-letter"),
        }
    }
}

/// What a tracked send was for; carried along for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishContext {
    pub destination: Destination,
    pub topic: String,
    pub key: String,
    pub retry: u32,
}

#[derive(Debug, Default)]
pub struct PublishStats {
    confirmed: AtomicU64,
    failed: AtomicU64,
}

impl PublishStats {
    pub fn confirmed(&self) -> u64 {
        self.confirmed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

type Tracked = (PublishContext, PendingPublish);

#[derive(Debug, Clone)]
pub struct PublishTracker {
    tx: mpsc::UnboundedSender<Tracked>,
}

impl PublishTracker {
    pub fn track(&self, context: PublishContext, pending: PendingPublish) {
        if let Err(mpsc::error::SendError((context, _))) = self.tx.send((context, pending)) {
            warn!(
                topic = %context.topic,
                key = %context.key,
                "publish supervisor stopped; {} send result will not be reported",
                context.destination
            );
        }
    }
}

#[derive(Debug)]
pub struct PublishSupervisor {
    rx: mpsc::UnboundedReceiver<Tracked>,
    stats: Arc<PublishStats>,
}

pub fn publish_supervisor() -> (PublishTracker, PublishSupervisor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PublishTracker { tx },
        PublishSupervisor {
            rx,
            stats: Arc::new(PublishStats::default()),
        },
    )
}

impl PublishSupervisor {
    pub fn stats(&self) -> Arc<PublishStats> {
        self.stats.clone()
    }

    /// Reports tracked sends until every tracker is dropped and all
    /// outstanding sends have resolved.
    pub async fn run(mut self) {
        let mut in_flight = FuturesUnordered::new();

        loop {
            tokio::select! {
                tracked = self.rx.recv() => match tracked {
                    Some((context, pending)) => {
                        in_flight.push(async move { (context, pending.await) });
                    }
                    None => break,
                },
                Some((context, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.report(context, result);
                }
            }
        }

        while let Some((context, result)) = in_flight.next().await {
            self.report(context, result);
        }
    }

    fn report(&self, context: PublishContext, result: PublishResult) {
        match result {
            Ok(offset) => {
                self.stats.confirmed.fetch_add(1, Ordering::Relaxed);
                match context.destination {
                    Destination::Primary => info!(
                        topic = %context.topic,
                        key = %context.key,
                        offset,
                        "republished for retry={}",
                        context.retry
                    ),
                    Destination::DeadLetter => info!(
                        topic = %context.topic,
                        key = %context.key,
                        offset,
                        "dead-lettered after {} retries",
                        context.retry
                    ),
                }
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    topic = %context.topic,
                    key = %context.key,
                    "failed to send to {} destination: {e}",
                    context.destination
                );
            }
        }
    }
}
