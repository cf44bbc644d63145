
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_event_limits() {
        let mut config = Config::default();
        config.event.max_invocations_per_tick = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.path == "event"));
    }

    #[test]
    fn test_validate_zero_poll_timeout_warning() {
        let mut config = Config::default();
        config.event.poll_timeout_ms = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.path == "event.poll_timeout_ms"));
    }

    #[test]
    fn test_validate_signals_disabled_warning() {
        let mut config = Config::default();
        config.event.handle_termination_signals = false;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.logging.level = "WARN".to_string();
        assert!(ConfigValidator::validate(&config).unwrap().is_valid());

        config.logging.level = "verbose".to_string();
        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.errors.iter().any(|e| e.path == "logging.level"));
    }

    #[test]
    fn test_validate_empty_log_dir() {
        let mut config = Config::default();
        config.logging.log_dir = Some(String::new());

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(!result.is_valid());
    }

    #[test]
    fn test_validate_relay() {
        let mut config = Config::default();
        config.relay.queue_capacity = 0;
        config.relay.chunk_size = 0;

        let result = ConfigValidator::validate(&config).unwrap();
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_validate_relay_warnings() {
        let mut config = Config::default();
        config.relay.chunk_size = 4 << 20;
        config.relay.heartbeat_interval_ms = 10;

        let result = ConfigValidator::validate(&config).unwrap();
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_into_result() {
        let mut config = Config::default();
        config.relay.chunk_size = 0;

        let err = ConfigValidator::validate(&config)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "relay.chunk_size"));

        let warnings = ValidationResult::default().into_result().unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validation_result_default() {
        let result = ValidationResult::default();
        assert!(result.is_valid());
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }
