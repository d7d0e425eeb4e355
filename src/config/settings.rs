use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub topics: TopicSettings,
    pub consumer: ConsumerSettings,
    pub archive: ArchiveSettings,
    pub logging: LoggingSettings,
}

/// Topic names for the retry pipeline.
///
/// Failed messages are republished to `primary`; exhausted ones go to `dead_letter`.
#[derive(Debug, Deserialize, Clone)]
pub struct TopicSettings {
    pub primary: String,
    pub dead_letter: String,
}

/// How offsets are acknowledged. The retry pipeline only runs with `Manual`.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    Manual,
    Auto,
}

/// Configuration for the primary-topic consumer.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerSettings {
    pub group_id: String,
    pub client_id_prefix: String,
    pub ack_mode: AckMode,
    pub concurrency: usize,
    pub max_retries: u32,
    pub poll_interval_ms: u64,
}

impl ConsumerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Where and for how long dead letters are kept.
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveSettings {
    pub path: String,
    pub group_id: String,
    pub ttl_secs: i64,
    pub max_entries: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub topics: Option<PartialTopicSettings>,
    pub consumer: Option<PartialConsumerSettings>,
    pub archive: Option<PartialArchiveSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialTopicSettings {
    pub primary: Option<String>,
    pub dead_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialConsumerSettings {
    pub group_id: Option<String>,
    pub client_id_prefix: Option<String>,
    pub ack_mode: Option<AckMode>,
    pub concurrency: Option<usize>,
    pub max_retries: Option<u32>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialArchiveSettings {
    pub path: Option<String>,
    pub group_id: Option<String>,
    pub ttl_secs: Option<i64>,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            topics: TopicSettings {
                primary: "topic-two".to_string(),
                dead_letter: "topic-dlq".to_string(),
            },
            consumer: ConsumerSettings {
                group_id: "group-two".to_string(),
                client_id_prefix: "consumer-two-".to_string(),
                ack_mode: AckMode::Manual,
                concurrency: 1,
                max_retries: 3,
                poll_interval_ms: 250,
            },
            archive: ArchiveSettings {
                path: "redrive_dlq".to_string(),
                group_id: "group-dlq".to_string(),
                ttl_secs: 7 * 24 * 3600,
                max_entries: 10_000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Overlays the values present here on top of `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let topics = self.topics;
        let consumer = self.consumer;
        let archive = self.archive;
        let logging = self.logging;

        Settings {
            topics: TopicSettings {
                primary: topics
                    .as_ref()
                    .and_then(|t| t.primary.clone())
                    .unwrap_or(default.topics.primary),
                dead_letter: topics
                    .as_ref()
                    .and_then(|t| t.dead_letter.clone())
                    .unwrap_or(default.topics.dead_letter),
            },
            consumer: ConsumerSettings {
                group_id: consumer
                    .as_ref()
                    .and_then(|c| c.group_id.clone())
                    .unwrap_or(default.consumer.group_id),
                client_id_prefix: consumer
                    .as_ref()
                    .and_then(|c| c.client_id_prefix.clone())
                    .unwrap_or(default.consumer.client_id_prefix),
                ack_mode: consumer
                    .as_ref()
                    .and_then(|c| c.ack_mode)
                    .unwrap_or(default.consumer.ack_mode),
                concurrency: consumer
                    .as_ref()
                    .and_then(|c| c.concurrency)
                    .unwrap_or(default.consumer.concurrency),
                max_retries: consumer
                    .as_ref()
                    .and_then(|c| c.max_retries)
                    .unwrap_or(default.consumer.max_retries),
                poll_interval_ms: consumer
                    .as_ref()
                    .and_then(|c| c.poll_interval_ms)
                    .unwrap_or(default.consumer.poll_interval_ms),
            },
            archive: ArchiveSettings {
                path: archive
                    .as_ref()
                    .and_then(|a| a.path.clone())
                    .unwrap_or(default.archive.path),
                group_id: archive
                    .as_ref()
                    .and_then(|a| a.group_id.clone())
                    .unwrap_or(default.archive.group_id),
                ttl_secs: archive
                    .as_ref()
                    .and_then(|a| a.ttl_secs)
                    .unwrap_or(default.archive.ttl_secs),
                max_entries: archive
                    .as_ref()
                    .and_then(|a| a.max_entries)
                    .unwrap_or(default.archive.max_entries),
            },
            logging: LoggingSettings {
                level: logging
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
