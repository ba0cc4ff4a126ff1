//! Final merged application configuration

use super::cli::CliConfig;
use super::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_HOST, DEFAULT_MAX_SUBSCRIBERS_PER_TOPIC,
    DEFAULT_MAX_TOPICS, DEFAULT_PORT, DEFAULT_SUBSCRIBER_QUEUE_SIZE, DEFAULT_TOPIC_HISTORY_SIZE,
};
use crate::broker::TopicConfig;

/// Server bind configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// CORS configuration
#[derive(Debug, Clone)]
pub enum CorsConfig {
    /// No `CORS_ALLOWED_ORIGINS` set: same-origin only, no CORS layer added.
    SameOriginOnly,
    /// `*`: reflect any origin.
    Any,
    /// Explicit allow-list.
    Origins(Vec<String>),
}

/// Broker-wide defaults applied to every topic created without explicit overrides.
#[derive(Debug, Clone, Copy)]
pub struct BrokerConfig {
    pub max_topics: usize,
    pub topic: TopicConfig,
}

/// Session/WebSocket protocol configuration
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub heartbeat_interval_secs: u64,
}

/// Final merged application configuration: defaults, overridden by environment
/// variables (wired through `clap`'s `env` attribute), overridden by explicit
/// CLI flags.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub broker: BrokerConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Build configuration from parsed CLI/env arguments plus built-in defaults.
    pub fn load(cli: &CliConfig) -> Self {
        tracing::debug!(?cli, "Loading application configuration");

        let server = ServerConfig {
            host: cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.unwrap_or(DEFAULT_PORT),
        };

        let cors = match cli.cors_allowed_origins.as_deref() {
            None => CorsConfig::SameOriginOnly,
            Some("*") => CorsConfig::Any,
            Some(origins) => CorsConfig::Origins(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        };

        let broker = BrokerConfig {
            max_topics: cli.max_topics.unwrap_or(DEFAULT_MAX_TOPICS),
            topic: TopicConfig {
                max_subscribers: cli
                    .max_subscribers_per_topic
                    .unwrap_or(DEFAULT_MAX_SUBSCRIBERS_PER_TOPIC),
                history_len: cli.topic_history_size.unwrap_or(DEFAULT_TOPIC_HISTORY_SIZE),
                queue_capacity: cli
                    .subscriber_queue_size
                    .unwrap_or(DEFAULT_SUBSCRIBER_QUEUE_SIZE),
            },
        };

        let session = SessionConfig {
            heartbeat_interval_secs: cli
                .heartbeat_interval_secs
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS),
        };

        Self {
            server,
            cors,
            broker,
            session,
        }
    }
}

/// True when `host` means "bind to all interfaces" rather than a specific one.
pub fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_applies_defaults_when_cli_is_empty() {
        let config = AppConfig::load(&CliConfig::default());
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.broker.max_topics, DEFAULT_MAX_TOPICS);
        assert!(matches!(config.cors, CorsConfig::SameOriginOnly));
    }

    #[test]
    fn load_parses_cors_origin_list() {
        let cli = CliConfig {
            cors_allowed_origins: Some("https://a.example, https://b.example".to_string()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli);
        match config.cors {
            CorsConfig::Origins(origins) => {
                assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
            }
            other => panic!("expected explicit origin list, got {other:?}"),
        }
    }

    #[test]
    fn load_treats_wildcard_origin_as_any() {
        let cli = CliConfig {
            cors_allowed_origins: Some("*".to_string()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli);
        assert!(matches!(config.cors, CorsConfig::Any));
    }

    #[test]
    fn is_all_interfaces_recognizes_wildcard_hosts() {
        assert!(is_all_interfaces("0.0.0.0"));
        assert!(is_all_interfaces("::"));
        assert!(!is_all_interfaces("127.0.0.1"));
    }
}
