//! Spawns and stops the consumer workers for a `ListenerRegistry`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::broker::{Broker, BrokerInbox};
use crate::pipeline::consumer::{ConsumerStats, IntakeConsumer, StatsSnapshot};
use crate::pipeline::registry::ListenerRegistry;

/// A running registration and the counters its workers share.
#[derive(Debug)]
pub struct Listener {
    pub topic: String,
    pub group: String,
    pub worker_ids: Vec<String>,
    stats: Arc<ConsumerStats>,
}

impl Listener {
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

#[derive(Debug)]
pub struct Pipeline {
    listeners: Vec<Listener>,
    workers: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Pipeline {
    /// Spawns `concurrency` workers per registration. Must be called from
    /// within a tokio runtime.
    pub fn start(
        broker: Arc<Mutex<Broker>>,
        registry: ListenerRegistry,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut listeners = Vec::new();
        let mut workers = Vec::new();

        for registration in registry.into_registrations() {
            let stats = Arc::new(ConsumerStats::default());
            let mut worker_ids = Vec::with_capacity(registration.concurrency);

            for _ in 0..registration.concurrency {
                let id = format!("{}{}", registration.client_id_prefix, Uuid::new_v4());
                let inbox =
                    BrokerInbox::new(broker.clone(), &registration.topic, &registration.group);
                let consumer = IntakeConsumer::new(
                    id.clone(),
                    inbox,
                    registration.handler.clone(),
                    stats.clone(),
                    shutdown_rx.clone(),
                )
                .with_poll_interval(poll_interval);

                workers.push(tokio::spawn(consumer.run()));
                worker_ids.push(id);
            }

            info!(
                topic = %registration.topic,
                group = %registration.group,
                workers = worker_ids.len(),
                "listener started"
            );
            listeners.push(Listener {
                topic: registration.topic,
                group: registration.group,
                worker_ids,
                stats,
            });
        }

        Self {
            listeners,
            workers,
            shutdown,
        }
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn listener(&self, topic: &str, group: &str) -> Option<&Listener> {
        self.listeners
            .iter()
            .find(|l| l.topic == topic && l.group == group)
    }

    /// Stops pulling and waits for every worker to finish its current delivery.
    pub async fn shutdown(self) -> Vec<Listener> {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("consumer worker ended abnormally: {e}");
            }
        }
        info!("pipeline stopped");
        self.listeners
    }
}
