mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AckMode, ArchiveSettings, ConsumerSettings, LoggingSettings, PartialSettings, Settings,
    TopicSettings,
};

/// Loads the configuration from `config/default` and `REDRIVE_*` environment
/// variables, merged over the defaults and validated.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like [`load_config`], reading the optional file at `path` (extension may be omitted).
///
/// Environment variables use `__` between levels so that field names keep
/// their underscores, e.g. `REDRIVE_CONSUMER__MAX_RETRIES=5`.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("REDRIVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let settings = partial.merge(Settings::default());

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Rejects combinations the retry pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consumer.ack_mode != AckMode::Manual {
            return Err(ConfigError::Message(
                "consumer.ack_mode must be \"manual\" for the retry pipeline".to_string(),
            ));
        }
        if self.consumer.concurrency == 0 {
            return Err(ConfigError::Message(
                "consumer.concurrency must be at least 1".to_string(),
            ));
        }
        if self.archive.ttl_secs <= 0 {
            return Err(ConfigError::Message(format!(
                "archive.ttl_secs must be positive, got {}",
                self.archive.ttl_secs
            )));
        }
        if self.topics.primary == self.topics.dead_letter {
            return Err(ConfigError::Message(format!(
                "topics.primary and topics.dead_letter are both '{}'",
                self.topics.primary
            )));
        }
        Ok(())
    }
}
