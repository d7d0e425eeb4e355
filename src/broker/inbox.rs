use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::broker::Broker;
use crate::pipeline::delivery::{Acknowledge, Delivery, Inbox};
use crate::utils::{AckError, ConsumerError};

/// One consumer group's view of one broker topic.
#[derive(Debug, Clone)]
pub struct BrokerInbox {
    broker: Arc<Mutex<Broker>>,
    arrivals: Arc<Notify>,
    topic: String,
    group: String,
}

impl BrokerInbox {
    pub fn new(broker: Arc<Mutex<Broker>>, topic: &str, group: &str) -> Self {
        let arrivals = match broker.lock() {
            Ok(b) => b.arrivals(),
            Err(poisoned) => poisoned.into_inner().arrivals(),
        };
        Self {
            broker,
            arrivals,
            topic: topic.to_string(),
            group: group.to_string(),
        }
    }
}

impl Inbox for BrokerInbox {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn pull(&self) -> Result<Option<Delivery>, ConsumerError> {
        let record = {
            let mut broker = self.broker.lock().map_err(|_| ConsumerError::Poll {
                topic: self.topic.clone(),
            })?;
            broker.poll(&self.topic, &self.group)
        };

        Ok(record.map(|record| {
            let acker = BrokerAck {
                broker: self.broker.clone(),
                topic: self.topic.clone(),
                group: self.group.clone(),
                offset: record.offset,
            };
            Delivery::new(self.topic.clone(), record, Box::new(acker))
        }))
    }

    fn arrivals(&self) -> Arc<Notify> {
        self.arrivals.clone()
    }
}

struct BrokerAck {
    broker: Arc<Mutex<Broker>>,
    topic: String,
    group: String,
    offset: u64,
}

impl Acknowledge for BrokerAck {
    fn acknowledge(&mut self) -> Result<(), AckError> {
        self.broker
            .lock()
            .map_err(|_| AckError::Poisoned)?
            .ack(&self.topic, &self.group, self.offset)
    }

    fn reject(&mut self) -> Result<(), AckError> {
        self.broker
            .lock()
            .map_err(|_| AckError::Poisoned)?
            .reject(&self.topic, &self.group, self.offset)
    }
}
