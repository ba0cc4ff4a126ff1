use clap::Parser;

use super::constants::{
    ENV_CORS_ALLOWED_ORIGINS, ENV_HEARTBEAT_INTERVAL_SECS, ENV_HOST,
    ENV_MAX_SUBSCRIBERS_PER_TOPIC, ENV_MAX_TOPICS, ENV_PORT, ENV_SUBSCRIBER_QUEUE_SIZE,
    ENV_TOPIC_HISTORY_SIZE,
};

#[derive(Parser)]
#[command(name = "relay")]
#[command(version, about = "In-memory publish/subscribe broker", long_about = None)]
pub struct Cli {
    /// Server host address
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// Comma-separated list of allowed CORS origins, or `*` for all
    #[arg(long, env = ENV_CORS_ALLOWED_ORIGINS)]
    pub cors_allowed_origins: Option<String>,

    /// Maximum number of topics the registry accepts
    #[arg(long, env = ENV_MAX_TOPICS)]
    pub max_topics: Option<usize>,

    /// Maximum subscribers per topic
    #[arg(long, env = ENV_MAX_SUBSCRIBERS_PER_TOPIC)]
    pub max_subscribers_per_topic: Option<usize>,

    /// Per-subscriber outbound queue depth before eviction
    #[arg(long, env = ENV_SUBSCRIBER_QUEUE_SIZE)]
    pub subscriber_queue_size: Option<usize>,

    /// Number of retained messages per topic for replay on subscribe
    #[arg(long, env = ENV_TOPIC_HISTORY_SIZE)]
    pub topic_history_size: Option<usize>,

    /// Heartbeat ping interval in seconds
    #[arg(long, env = ENV_HEARTBEAT_INTERVAL_SECS)]
    pub heartbeat_interval_secs: Option<u64>,
}

/// Configuration derived from CLI arguments, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_allowed_origins: Option<String>,
    pub max_topics: Option<usize>,
    pub max_subscribers_per_topic: Option<usize>,
    pub subscriber_queue_size: Option<usize>,
    pub topic_history_size: Option<usize>,
    pub heartbeat_interval_secs: Option<u64>,
}

/// Parse CLI arguments into a [`CliConfig`].
pub fn parse() -> CliConfig {
    let cli = Cli::parse();
    CliConfig {
        host: cli.host,
        port: cli.port,
        cors_allowed_origins: cli.cors_allowed_origins,
        max_topics: cli.max_topics,
        max_subscribers_per_topic: cli.max_subscribers_per_topic,
        subscriber_queue_size: cli.subscriber_queue_size,
        topic_history_size: cli.topic_history_size,
        heartbeat_interval_secs: cli.heartbeat_interval_secs,
    }
}
