//! The retry / dead-letter consumption pipeline.
//!
//! - `codec`: the `x-retry-count` header
//! - `processor`: the business-logic hook
//! - `router`: the acknowledge / requeue / dead-letter decision
//! - `publisher`: non-blocking outbound sends
//! - `supervisor`: reporting of publish results
//! - `consumer`: pull, handle, acknowledge
//! - `registry` / `runner`: which handler consumes which topic, and the workers

pub mod archiver;
pub mod codec;
pub mod consumer;
pub mod delivery;
pub mod processor;
pub mod publisher;
pub mod registry;
pub mod router;
pub mod runner;
pub mod supervisor;

use std::sync::{Arc, Mutex};

pub use archiver::DeadLetterArchiver;
pub use consumer::{ConsumerStats, IntakeConsumer, StatsSnapshot};
pub use delivery::{Acknowledge, Delivery, DeliveryHandler, Disposition, Inbox};
pub use processor::{KeywordFailProcessor, ProcessingOutcome, Processor};
pub use publisher::{BrokerPublisher, PendingPublish, Publisher};
pub use registry::{ListenerRegistry, Registration};
pub use router::{Destinations, Router};
pub use runner::{Listener, Pipeline};
pub use supervisor::{
    Destination, PublishContext, PublishStats, PublishSupervisor, PublishTracker, publish_supervisor,
};

use crate::broker::Broker;
use crate::config::Settings;
use crate::persistence::DeadLetterArchive;

/// Registers the router on the primary topic and, given an archive, the
/// dead-letter archiver on the dead-letter topic.
pub fn build_registry(
    settings: &Settings,
    broker: &Arc<Mutex<Broker>>,
    processor: Arc<dyn Processor>,
    tracker: PublishTracker,
    archive: Option<DeadLetterArchive>,
) -> ListenerRegistry {
    let topics = &settings.topics;
    let consumer = &settings.consumer;

    let router = Router::new(
        processor,
        Arc::new(BrokerPublisher::new(broker.clone())),
        Destinations::new(&topics.primary, &topics.dead_letter),
    )
    .with_max_retries(consumer.max_retries)
    .with_tracker(tracker);

    let mut registry = ListenerRegistry::new();
    registry.register(
        Registration::new(&topics.primary, &consumer.group_id, Arc::new(router))
            .with_concurrency(consumer.concurrency)
            .with_client_id_prefix(&consumer.client_id_prefix),
    );

    if let Some(archive) = archive {
        registry.register(Registration::new(
            &topics.dead_letter,
            &settings.archive.group_id,
            Arc::new(DeadLetterArchiver::new(&topics.dead_letter, archive)),
        ));
    }

    registry
}
