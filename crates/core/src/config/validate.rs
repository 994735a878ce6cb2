use super::{loader::BROKER_URL_ENV, types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Broker URL is present (normally from `RABBITMQ_URL`)
/// - Server port is not 0
/// - Broker retry budget allows at least one attempt
/// - Keep-alive interval is not 0
/// - Recent-orders window is not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.broker.url.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "broker.url is not set (export {})",
            BROKER_URL_ENV
        )));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.broker.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "broker.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.supervisor.keep_alive_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "supervisor.keep_alive_interval_secs must be at least 1".to_string(),
        ));
    }

    if config.analytics.recent_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "analytics.recent_capacity must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.broker.url = "amqp://localhost:5672".to_string();
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_broker_url_fails() {
        let config = Config::default();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("RABBITMQ_URL"));
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = valid_config();
        config.broker.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_recent_capacity_fails() {
        let mut config = valid_config();
        config.analytics.recent_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_keep_alive_fails() {
        let mut config = valid_config();
        config.supervisor.keep_alive_interval_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("keep_alive"));
    }
}
