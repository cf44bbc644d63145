//! Configuration for the EventLoop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// EventLoop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLoopConfig {
    /// Upper bound of the I/O wait inside one tick (in milliseconds).
    ///
    /// This is the only place the loop blocks, so it also bounds the latency
    /// of timer and signal handling.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Maximum number of action invocations inside one stabilization.
    #[serde(default = "default_max_invocations_per_tick")]
    pub max_invocations_per_tick: usize,

    /// Whether to install SIGINT/SIGTERM handlers when the loop is created.
    #[serde(default = "default_handle_termination_signals")]
    pub handle_termination_signals: bool,
}

fn default_poll_timeout_ms() -> u64 {
    1
}

fn default_max_invocations_per_tick() -> usize {
    10_000
}

fn default_handle_termination_signals() -> bool {
    true
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            max_invocations_per_tick: default_max_invocations_per_tick(),
            handle_termination_signals: default_handle_termination_signals(),
        }
    }
}

impl EventLoopConfig {
    /// Get the poll timeout as a Duration.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_invocations_per_tick == 0 {
            return Err("max_invocations_per_tick must be > 0".to_string());
        }

        if self.poll_timeout_ms > 1000 {
            return Err("poll_timeout_ms must be <= 1000".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EventLoopConfig::default();
        assert_eq!(config.poll_timeout_ms, 1);
        assert_eq!(config.max_invocations_per_tick, 10_000);
        assert!(config.handle_termination_signals);
    }

    #[test]
    fn test_poll_timeout_getter() {
        let config = EventLoopConfig {
            poll_timeout_ms: 10,
            ..Default::default()
        };
        assert_eq!(config.poll_timeout(), Duration::from_millis(10));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(EventLoopConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_invocations() {
        let config = EventLoopConfig {
            max_invocations_per_tick: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_huge_poll_timeout() {
        let config = EventLoopConfig {
            poll_timeout_ms: 5000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialization_defaults() {
        let json = r#"{"poll_timeout_ms": 5}"#;
        let config: EventLoopConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.poll_timeout_ms, 5);
        assert_eq!(config.max_invocations_per_tick, 10_000);
    }
}
