//! Intake consumer
//!
//! Pulls one delivery at a time from its inbox, lets the handler decide the
//! delivery's fate and then acknowledges it. Several consumers may share one
//! inbox and one `ConsumerStats`; they share nothing else.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::pipeline::delivery::{DeliveryHandler, Disposition, Inbox};
use crate::utils::ConsumerError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Counters for one listener, updated by all of its workers.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    processed: AtomicU64,
    requeued: AtomicU64,
    dead_lettered: AtomicU64,
    ack_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful outcomes that were acknowledged.
    pub processed: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    pub ack_failures: u64,
}

impl ConsumerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
        }
    }

    fn record(&self, disposition: Disposition) -> u64 {
        let counter = match disposition {
            Disposition::Processed => &self.processed,
            Disposition::Requeued { .. } => &self.requeued,
            Disposition::DeadLettered { .. } => &self.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct IntakeConsumer<I> {
    id: String,
    inbox: I,
    handler: Arc<dyn DeliveryHandler>,
    stats: Arc<ConsumerStats>,
    shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
}

impl<I: Inbox> IntakeConsumer<I> {
    pub fn new(
        id: impl Into<String>,
        inbox: I,
        handler: Arc<dyn DeliveryHandler>,
        stats: Arc<ConsumerStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id: id.into(),
            inbox,
            handler,
            stats,
            shutdown,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Upper bound on how long an idle worker sleeps before pulling again.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Handles at most one delivery. `Ok(None)` means the inbox was empty.
    pub fn poll_once(&self) -> Result<Option<Disposition>, ConsumerError> {
        let Some(delivery) = self.inbox.pull()? else {
            return Ok(None);
        };

        let offset = delivery.offset();
        let key = delivery.message().key.clone();
        debug!(consumer = %self.id, key = %key, offset, "received");

        let disposition = self.handler.handle(delivery.message());

        if let Err(e) = delivery.acknowledge() {
            self.stats.ack_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                consumer = %self.id,
                key = %key,
                offset,
                "acknowledgment failed after {disposition:?}: {e}"
            );
            return Err(e.into());
        }

        let count = self.stats.record(disposition);
        if disposition == Disposition::Processed {
            info!(consumer = %self.id, key = %key, "processed successfully (count={count})");
        }

        Ok(Some(disposition))
    }

    /// Pulls until the shutdown signal is raised or its sender is dropped.
    ///
    /// The signal is checked between deliveries, so a delivery being handled
    /// always reaches its acknowledgment first.
    pub async fn run(mut self) {
        let arrivals = self.inbox.arrivals();
        info!(
            consumer = %self.id,
            topic = %self.inbox.topic(),
            group = %self.inbox.group(),
            "consumer started"
        );

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Armed before pulling so an arrival during the pull is not missed.
            let notified = arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.poll_once() {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!(consumer = %self.id, "delivery handling failed: {e}"),
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(consumer = %self.id, "consumer stopped");
    }
}
