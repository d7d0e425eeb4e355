use tracing::{error, warn};

use crate::broker::message::Message;
use crate::persistence::DeadLetterArchive;
use crate::pipeline::codec;
use crate::pipeline::delivery::{DeliveryHandler, Disposition};

/// Listener for the dead-letter topic: logs each arrival and keeps it in the
/// archive for manual inspection.
///
/// Archive failures are logged and the delivery is still acknowledged, so a
/// broken archive cannot stall the dead-letter topic.
#[derive(Debug, Clone)]
pub struct DeadLetterArchiver {
    topic: String,
    archive: DeadLetterArchive,
}

impl DeadLetterArchiver {
    pub fn new(topic: impl Into<String>, archive: DeadLetterArchive) -> Self {
        Self {
            topic: topic.into(),
            archive,
        }
    }
}

impl DeliveryHandler for DeadLetterArchiver {
    fn handle(&self, message: &Message) -> Disposition {
        warn!(
            key = %message.key,
            retries = codec::decode(&message.headers),
            "dead letter received: {}",
            message.payload
        );

        if let Err(e) = self.archive.store(&self.topic, message) {
            error!(key = %message.key, "failed to archive dead letter: {e}");
        }

        Disposition::Processed
    }
}
