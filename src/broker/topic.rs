use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::broker::message::{Message, Record};
use crate::utils::AckError;

pub type GroupId = String;

/// Delivery state of one consumer group on one topic.
///
/// `next` is the first offset never handed out. Offsets handed out but not
/// yet acknowledged sit in `in_flight`; rejected ones wait in `redeliver`
/// and are handed out again before anything new.
#[derive(Debug, Default)]
pub struct GroupCursor {
    next: u64,
    in_flight: BTreeSet<u64>,
    redeliver: VecDeque<u64>,
}

impl GroupCursor {
    /// Lowest offset the group has not acknowledged yet.
    pub fn committed(&self) -> u64 {
        let in_flight = self.in_flight.first().copied().unwrap_or(self.next);
        let redeliver = self.redeliver.iter().min().copied().unwrap_or(self.next);
        self.next.min(in_flight).min(redeliver)
    }
}

/// A named, append-only log plus the cursors of the groups reading it.
#[derive(Debug, Default)]
pub struct Topic {
    pub name: String,
    pub log: Vec<Record>,
    pub groups: HashMap<GroupId, GroupCursor>,
}

impl Topic {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            log: Vec::new(),
            groups: HashMap::new(),
        }
    }

    /// Appends `message` and returns its offset.
    pub fn append(&mut self, message: Message) -> u64 {
        let offset = self.log.len() as u64;
        self.log.push(Record {
            offset,
            timestamp: chrono::Utc::now().timestamp_millis(),
            message,
        });
        offset
    }

    /// Hands the next record to `group` and marks it in flight.
    pub fn poll(&mut self, group: &str) -> Option<Record> {
        let cursor = self.groups.entry(group.to_string()).or_default();

        let offset = match cursor.redeliver.pop_front() {
            Some(offset) => offset,
            None if (cursor.next as usize) < self.log.len() => {
                let offset = cursor.next;
                cursor.next += 1;
                offset
            }
            None => return None,
        };

        cursor.in_flight.insert(offset);
        self.log.get(offset as usize).cloned()
    }

    pub fn ack(&mut self, group: &str, offset: u64) -> Result<(), AckError> {
        let cursor = self.cursor_mut(group)?;
        if cursor.in_flight.remove(&offset) {
            Ok(())
        } else {
            Err(self.not_in_flight(group, offset))
        }
    }

    /// Returns an in-flight offset to the group for redelivery.
    pub fn reject(&mut self, group: &str, offset: u64) -> Result<(), AckError> {
        let cursor = self.cursor_mut(group)?;
        if cursor.in_flight.remove(&offset) {
            cursor.redeliver.push_back(offset);
            Ok(())
        } else {
            Err(self.not_in_flight(group, offset))
        }
    }

    /// Lowest unacknowledged offset for `group`; 0 for a group that never polled.
    pub fn committed_offset(&self, group: &str) -> u64 {
        self.groups.get(group).map_or(0, GroupCursor::committed)
    }

    fn cursor_mut(&mut self, group: &str) -> Result<&mut GroupCursor, AckError> {
        let topic = &self.name;
        self.groups
            .get_mut(group)
            .ok_or_else(|| AckError::UnknownGroup {
                topic: topic.clone(),
                group: group.to_string(),
            })
    }

    fn not_in_flight(&self, group: &str, offset: u64) -> AckError {
        AckError::NotInFlight {
            topic: self.name.clone(),
            group: group.to_string(),
            offset,
        }
    }
}
