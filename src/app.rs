//! Core application

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::ApiServer;
use crate::broker::Broker;
use crate::core::banner;
use crate::core::cli::{self, CliConfig};
use crate::core::config::AppConfig;
use crate::core::constants::{DEFAULT_LOG_FILTER, ENV_LOG};
use crate::core::shutdown::ShutdownService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub broker: Arc<Broker>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing.
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let cli_config = cli::parse();
        let app = Self::init(&cli_config);
        Self::start_server(app).await
    }

    fn init(cli: &CliConfig) -> Self {
        let config = AppConfig::load(cli);
        let broker = Arc::new(Broker::new(config.broker.topic, config.broker.max_topics));
        Self {
            shutdown: ShutdownService::new(),
            config,
            broker,
        }
    }

    fn init_logging() {
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers before any blocking calls.
        app.shutdown.install_signal_handlers();

        banner::print_banner(&app.config.server.host, app.config.server.port);

        let server = ApiServer::new(app.broker.clone(), app.config.clone(), app.shutdown.clone());
        server.start().await.context("server error")?;
        app.shutdown.shutdown().await;

        Ok(())
    }
}
