//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

pub use stun_event::EventLoopConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub event: EventLoopConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub relay: RelayConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for daily-rolling log files. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            log_dir: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Relay service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Chunks buffered between the reading and the writing side.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bytes read per invocation of the reader.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Period of the heartbeat log line. Zero disables it.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            chunk_size: default_chunk_size(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    16
}

fn default_chunk_size() -> usize {
    4096
}

fn default_heartbeat_interval_ms() -> u64 {
    10_000
}

impl RelayConfig {
    pub fn heartbeat_interval(&self) -> Option<std::time::Duration> {
        (self.heartbeat_interval_ms > 0)
            .then(|| std::time::Duration::from_millis(self.heartbeat_interval_ms))
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
