use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::consumer::ReliableConfig;
use crate::persistence::LogOptions;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker, the durable log and logging.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub log: LogSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the broker.
///
/// Controls retry policy, consumer polling and topic handling.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub auto_create_topics: bool,
    pub dead_letter_suffix: String,
}

impl BrokerSettings {
    pub fn reliable_config(&self) -> ReliableConfig {
        ReliableConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration settings for the durable log.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub data_dir: String,
    pub file_name: String,
    pub verify_checksums_on_open: bool,
}

impl LogSettings {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.file_name)
    }

    pub fn options(&self) -> LogOptions {
        LogOptions {
            verify_checksums: self.verify_checksums_on_open,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows settings to be given partially. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub auto_create_topics: Option<bool>,
    pub dead_letter_suffix: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub data_dir: Option<String>,
    pub file_name: Option<String>,
    pub verify_checksums_on_open: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                max_retries: 3,
                retry_delay_ms: 1000,
                poll_interval_ms: 5,
                auto_create_topics: true,
                dead_letter_suffix: ".dlq".to_string(),
            },
            log: LogSettings {
                data_dir: "data".to_string(),
                file_name: "relaymq.log".to_string(),
                verify_checksums_on_open: false,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let broker = self.broker;
        let log = self.log;
        let logging = self.logging;

        Settings {
            broker: BrokerSettings {
                max_retries: broker
                    .as_ref()
                    .and_then(|b| b.max_retries)
                    .unwrap_or(default.broker.max_retries),
                retry_delay_ms: broker
                    .as_ref()
                    .and_then(|b| b.retry_delay_ms)
                    .unwrap_or(default.broker.retry_delay_ms),
                poll_interval_ms: broker
                    .as_ref()
                    .and_then(|b| b.poll_interval_ms)
                    .unwrap_or(default.broker.poll_interval_ms),
                auto_create_topics: broker
                    .as_ref()
                    .and_then(|b| b.auto_create_topics)
                    .unwrap_or(default.broker.auto_create_topics),
                dead_letter_suffix: broker
                    .and_then(|b| b.dead_letter_suffix)
                    .unwrap_or(default.broker.dead_letter_suffix),
            },
            log: LogSettings {
                data_dir: log
                    .as_ref()
                    .and_then(|l| l.data_dir.clone())
                    .unwrap_or(default.log.data_dir),
                file_name: log
                    .as_ref()
                    .and_then(|l| l.file_name.clone())
                    .unwrap_or(default.log.file_name),
                verify_checksums_on_open: log
                    .and_then(|l| l.verify_checksums_on_open)
                    .unwrap_or(default.log.verify_checksums_on_open),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
        }
    }
}
