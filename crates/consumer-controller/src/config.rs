//! Consumer controller configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default; a present but malformed value is an error rather than silently
//! falling back.

use common::config::{ObservabilityConfig, DEFAULT_LOG_LEVEL};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default capacity of each consumer actor mailbox.
pub const DEFAULT_MAILBOX_BUFFER: usize = 256;

/// Default capacity of each per-consumer notification queue.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;

/// Consumer controller configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bounded mailbox capacity of each consumer actor (default: 256).
    pub mailbox_buffer: usize,

    /// Notification queue capacity per consumer subscription (default: 1024).
    pub notification_buffer: usize,

    /// Log filter and format.
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox_buffer: DEFAULT_MAILBOX_BUFFER,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparseable or zero values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparseable or zero values.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mailbox_buffer =
            parse_capacity(vars, "CONSUMER_MAILBOX_BUFFER", DEFAULT_MAILBOX_BUFFER)?;

        let notification_buffer = parse_capacity(
            vars,
            "CONSUMER_NOTIFICATION_BUFFER",
            DEFAULT_NOTIFICATION_BUFFER,
        )?;

        let log_level = vars
            .get("CONSUMER_LOG_LEVEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let json_logs = match vars.get("CONSUMER_JSON_LOGS") {
            Some(value) => value.parse::<bool>().map_err(|e| {
                ConfigError::InvalidValue(format!("CONSUMER_JSON_LOGS={value}: {e}"))
            })?,
            None => false,
        };

        Ok(Config {
            mailbox_buffer,
            notification_buffer,
            observability: ObservabilityConfig {
                log_level,
                json_logs,
            },
        })
    }
}

fn parse_capacity(
    vars: &HashMap<String, String>,
    name: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(value) = vars.get(name) else {
        return Ok(default);
    };
    match value.parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue(format!(
            "{name} must be greater than zero"
        ))),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(ConfigError::InvalidValue(format!("{name}={value}: {e}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("defaults should load");

        assert_eq!(config.mailbox_buffer, DEFAULT_MAILBOX_BUFFER);
        assert_eq!(config.notification_buffer, DEFAULT_NOTIFICATION_BUFFER);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.json_logs);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("CONSUMER_MAILBOX_BUFFER".to_string(), "32".to_string()),
            ("CONSUMER_NOTIFICATION_BUFFER".to_string(), "64".to_string()),
            (
                "CONSUMER_LOG_LEVEL".to_string(),
                "consumer_controller=debug".to_string(),
            ),
            ("CONSUMER_JSON_LOGS".to_string(), "true".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("config should load");

        assert_eq!(config.mailbox_buffer, 32);
        assert_eq!(config.notification_buffer, 64);
        assert_eq!(config.observability.log_level, "consumer_controller=debug");
        assert!(config.observability.json_logs);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let vars = HashMap::from([("CONSUMER_MAILBOX_BUFFER".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("CONSUMER_MAILBOX_BUFFER"))
        );
    }

    #[test]
    fn test_unparseable_values_rejected() {
        let vars = HashMap::from([(
            "CONSUMER_NOTIFICATION_BUFFER".to_string(),
            "lots".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));

        let vars = HashMap::from([("CONSUMER_JSON_LOGS".to_string(), "yes".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
