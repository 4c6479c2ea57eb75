//! Relay Settings
//!
//! Environment-driven configuration. Required bus settings fail startup
//! when missing or empty; optional tuning values fall back to their
//! defaults when absent or unparseable.

use std::time::Duration;

use crate::application::services::RegistryConfig;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Port for the websocket endpoint.
    pub port: u16,
    /// Upgrade path for client connections.
    pub ws_path: String,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            ws_path: "/ws/livepricesfeed".to_string(),
            health_port: 8082,
        }
    }
}

/// Message bus settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSettings {
    /// Broker bootstrap address list.
    pub broker_url: String,
    /// Price topic.
    pub topic: String,
    /// Consumer group identifier.
    pub group_id: String,
    /// Where a new group starts reading (`earliest` or `latest`).
    pub auto_offset_reset: String,
}

/// Registry and consumer tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Deadline for one subscriber write.
    pub write_timeout: Duration,
    /// Pause after a failed bus read.
    pub read_error_backoff: Duration,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_millis(5_000),
            read_error_backoff: Duration::from_millis(250),
        }
    }
}

impl From<RegistrySettings> for RegistryConfig {
    fn from(settings: RegistrySettings) -> Self {
        Self {
            write_timeout: settings.write_timeout,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// Message bus settings.
    pub bus: BusSettings,
    /// Registry and consumer tuning.
    pub registry: RegistrySettings,
    /// Grace period for the consumer to release the bus on shutdown.
    pub shutdown_timeout: Duration,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or empty, or if
    /// the listener port or upgrade path is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bus = BusSettings {
            broker_url: require(&lookup, "KAFKA_BROKER_URL")?,
            topic: require(&lookup, "KAFKA_TOPIC")?,
            group_id: require(&lookup, "KAFKA_GROUP_ID")?,
            auto_offset_reset: lookup("KAFKA_AUTO_OFFSET_RESET")
                .filter(|v| v == "earliest" || v == "latest")
                .unwrap_or_else(|| "earliest".to_string()),
        };

        let defaults = ServerSettings::default();
        let port = match lookup("SERVER_PORT") {
            Some(raw) => parse_port("SERVER_PORT", &raw)?,
            None => defaults.port,
        };

        let ws_path = lookup("RELAY_WS_PATH").unwrap_or(defaults.ws_path);
        if !ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_WS_PATH".to_string(),
                value: ws_path,
            });
        }

        let server = ServerSettings {
            port,
            ws_path,
            health_port: parse_or(&lookup, "RELAY_HEALTH_PORT", defaults.health_port),
        };

        let registry = RegistrySettings {
            write_timeout: parse_duration_millis(
                &lookup,
                "RELAY_WRITE_TIMEOUT_MS",
                RegistrySettings::default().write_timeout,
            ),
            read_error_backoff: parse_duration_millis(
                &lookup,
                "RELAY_READ_ERROR_BACKOFF_MS",
                RegistrySettings::default().read_error_backoff,
            ),
        };

        let shutdown_timeout = lookup("RELAY_SHUTDOWN_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(Duration::from_secs(5), Duration::from_secs);

        Ok(Self {
            server,
            bus,
            registry,
            shutdown_timeout,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has a value that cannot be used.
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Rejected value.
        value: String,
    },
}

fn require<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

/// Accepts `3000` as well as the listen-address form `:3000`.
fn parse_port(key: &str, raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .trim_start_matches(':')
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("KAFKA_BROKER_URL", "kafka:9092"),
        ("KAFKA_TOPIC", "prices"),
        ("KAFKA_GROUP_ID", "relay"),
    ];

    fn with_required(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        REQUIRED.iter().copied().chain(extra.iter().copied()).collect()
    }

    #[test]
    fn defaults_apply() {
        let config = RelayConfig::from_lookup(env(&REQUIRED)).unwrap();

        assert_eq!(config.server, ServerSettings::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.ws_path, "/ws/livepricesfeed");
        assert_eq!(config.bus.broker_url, "kafka:9092");
        assert_eq!(config.bus.auto_offset_reset, "earliest");
        assert_eq!(config.registry, RegistrySettings::default());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test_case("KAFKA_BROKER_URL")]
    #[test_case("KAFKA_TOPIC")]
    #[test_case("KAFKA_GROUP_ID")]
    fn missing_required_is_fatal(key: &str) {
        let pairs: Vec<_> = REQUIRED.iter().copied().filter(|(k, _)| *k != key).collect();
        let err = RelayConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == key));
    }

    #[test]
    fn empty_required_is_fatal() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .map(|(k, v)| if *k == "KAFKA_TOPIC" { (*k, "  ") } else { (*k, *v) })
            .collect();
        let err = RelayConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(ref k) if k == "KAFKA_TOPIC"));
    }

    #[test_case("8080", 8080 ; "bare")]
    #[test_case(":8080", 8080 ; "listen address")]
    #[test_case(" 9000 ", 9000 ; "padded")]
    fn server_port_forms(raw: &'static str, expected: u16) {
        let config = RelayConfig::from_lookup(env(&with_required(&[("SERVER_PORT", raw)]))).unwrap();
        assert_eq!(config.server.port, expected);
    }

    #[test]
    fn invalid_server_port_is_rejected() {
        let err = RelayConfig::from_lookup(env(&with_required(&[("SERVER_PORT", "http")])))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SERVER_PORT"));
    }

    #[test]
    fn ws_path_must_be_absolute() {
        let err = RelayConfig::from_lookup(env(&with_required(&[("RELAY_WS_PATH", "ws")])))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RELAY_WS_PATH"));
    }

    #[test]
    fn tuning_overrides_and_fallbacks() {
        let config = RelayConfig::from_lookup(env(&with_required(&[
            ("RELAY_WRITE_TIMEOUT_MS", "750"),
            ("RELAY_READ_ERROR_BACKOFF_MS", "soon"),
            ("RELAY_HEALTH_PORT", "9191"),
            ("RELAY_SHUTDOWN_TIMEOUT_SECS", "12"),
            ("KAFKA_AUTO_OFFSET_RESET", "latest"),
        ])))
        .unwrap();

        assert_eq!(config.registry.write_timeout, Duration::from_millis(750));
        assert_eq!(config.registry.read_error_backoff, Duration::from_millis(250));
        assert_eq!(config.server.health_port, 9191);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(12));
        assert_eq!(config.bus.auto_offset_reset, "latest");

        let registry: RegistryConfig = config.registry.into();
        assert_eq!(registry.write_timeout, Duration::from_millis(750));
    }
}
