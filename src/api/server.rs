//! Axum router assembly and HTTP/WebSocket server startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::FromRef;
use axum::routing::{delete, get};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use tokio::sync::watch;

use crate::api::middleware;
use crate::api::routes::{health, topics, ws};
use crate::broker::Broker;
use crate::core::config::AppConfig;
use crate::core::shutdown::ShutdownService;

/// Shared router state. `Arc<Broker>` is reachable as a substate via
/// [`FromRef`] so the management route handlers can keep extracting
/// `State<Arc<Broker>>` directly, without knowing about the wider state.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub heartbeat_interval: Duration,
    /// Cloned into every WebSocket session so a process shutdown tears down
    /// idle, open connections instead of `axum::serve`'s graceful shutdown
    /// hanging on them forever.
    pub shutdown_rx: watch::Receiver<bool>,
}

impl FromRef<AppState> for Arc<Broker> {
    fn from_ref(state: &AppState) -> Self {
        state.broker.clone()
    }
}

pub struct ApiServer {
    broker: Arc<Broker>,
    config: AppConfig,
    shutdown: ShutdownService,
}

impl ApiServer {
    pub fn new(broker: Arc<Broker>, config: AppConfig, shutdown: ShutdownService) -> Self {
        Self {
            broker,
            config,
            shutdown,
        }
    }

    fn router(&self) -> Router {
        let state = AppState {
            broker: self.broker.clone(),
            heartbeat_interval: Duration::from_secs(self.config.session.heartbeat_interval_secs),
            shutdown_rx: self.shutdown.subscribe(),
        };

        let mut router = Router::new()
            .route("/ws", get(ws::ws_upgrade))
            .route("/api/v1/topics", get(topics::list_topics).post(topics::create_topic))
            .route("/api/v1/topics/{name}", delete(topics::delete_topic))
            .route("/api/v1/health", get(health::health))
            .route("/api/v1/stats", get(topics::stats))
            .fallback(middleware::handle_404)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new());

        if let Some(cors) = middleware::cors(&self.config.cors) {
            router = router.layer(cors);
        }

        router
    }

    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!(%addr, "listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(self.shutdown.wait())
            .await
            .context("server error")?;

        Ok(())
    }
}
