// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and banner)
pub const APP_NAME: &str = "Relay";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "relay";

// =============================================================================
// Environment Variables - Debug / Logging
// =============================================================================

/// Environment variable for the tracing-subscriber env filter string
pub const ENV_LOG: &str = "LOG";

/// Default tracing-subscriber filter when neither LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,relay=info";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "PORT";

/// Environment variable for allowed CORS origins (comma-separated, `*` for all)
pub const ENV_CORS_ALLOWED_ORIGINS: &str = "CORS_ALLOWED_ORIGINS";

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default body limit for management API requests (1 MB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// Broker - Topics
// =============================================================================

/// Environment variable for the maximum number of topics the registry accepts
pub const ENV_MAX_TOPICS: &str = "MAX_TOPICS";

/// Environment variable for per-topic subscriber cap
pub const ENV_MAX_SUBSCRIBERS_PER_TOPIC: &str = "MAX_SUBSCRIBERS_PER_TOPIC";

/// Environment variable for per-subscriber outbound queue depth
pub const ENV_SUBSCRIBER_QUEUE_SIZE: &str = "SUBSCRIBER_QUEUE_SIZE";

/// Environment variable for per-topic replay history length
pub const ENV_TOPIC_HISTORY_SIZE: &str = "TOPIC_HISTORY_SIZE";

/// Default maximum number of topics
pub const DEFAULT_MAX_TOPICS: usize = 100;

/// Default maximum subscribers per topic
pub const DEFAULT_MAX_SUBSCRIBERS_PER_TOPIC: usize = 100;

/// Default per-subscriber outbound queue depth before eviction
pub const DEFAULT_SUBSCRIBER_QUEUE_SIZE: usize = 100;

/// Default number of retained messages per topic for replay on subscribe
pub const DEFAULT_TOPIC_HISTORY_SIZE: usize = 100;

// =============================================================================
// Session - WebSocket Protocol
// =============================================================================

/// Environment variable for the idle heartbeat interval (seconds)
pub const ENV_HEARTBEAT_INTERVAL_SECS: &str = "HEARTBEAT_INTERVAL_SECS";

/// Default heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
