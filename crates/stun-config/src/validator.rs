//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(ConfigError::InvalidValue {
                field: error.path,
                message: error.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_event(config, &mut result);
        Self::validate_logging(config, &mut result);
        Self::validate_relay(config, &mut result);

        Ok(result)
    }

    fn validate_event(config: &Config, result: &mut ValidationResult) {
        if let Err(message) = config.event.validate() {
            result.add_error(ValidationError::new("event", message));
        }

        if config.event.poll_timeout_ms == 0 {
            result.add_warning(ValidationWarning::new(
                "event.poll_timeout_ms",
                "poll_timeout_ms is 0, the loop will busy-wait",
            ));
        }

        if !config.event.handle_termination_signals {
            result.add_warning(ValidationWarning::new(
                "event.handle_termination_signals",
                "SIGINT/SIGTERM handlers disabled, cleanup actions will not run on shutdown",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        // Plain levels only; RUST_LOG carries anything more specific.
        let level = config.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ValidationError::new(
                "logging.level",
                format!(
                    "Unknown log level '{}', valid values: {:?}",
                    config.logging.level, LOG_LEVELS
                ),
            ));
        }

        if let Some(dir) = &config.logging.log_dir {
            if dir.is_empty() {
                result.add_error(ValidationError::new(
                    "logging.log_dir",
                    "log_dir cannot be empty, omit it to log to the console only",
                ));
            }
        }
    }

    fn validate_relay(config: &Config, result: &mut ValidationResult) {
        if config.relay.queue_capacity == 0 {
            result.add_error(ValidationError::new(
                "relay.queue_capacity",
                "queue_capacity must be greater than 0",
            ));
        }

        if config.relay.chunk_size == 0 {
            result.add_error(ValidationError::new(
                "relay.chunk_size",
                "chunk_size must be greater than 0",
            ));
        }

        if config.relay.chunk_size > 1 << 20 {
            result.add_warning(ValidationWarning::new(
                "relay.chunk_size",
                "chunk_size is very large (>1 MiB), every queued chunk allocates this much",
            ));
        }

        if config.relay.heartbeat_interval_ms > 0 && config.relay.heartbeat_interval_ms < 100 {
            result.add_warning(ValidationWarning::new(
                "relay.heartbeat_interval_ms",
                "heartbeat_interval_ms is below 100ms, the log will be noisy",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
