//! Core application
//!
//! Bootstraps every storage-backed and broker-side component, then hands
//! the resulting `AppState` to the gateway's router. Grounded on the
//! teacher's `core::app::CoreApp`: a single struct built by `init`, run by
//! `start_server`, with `run` as the sole public entry point `main` calls.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::broker::{Broadcaster, InProcessPeerDialer, PeerDialer, ShardTable, UsageQueue};
use crate::data::cache::{build_backend, StorageBackend};
use crate::data::{GlobalRegistry, MessageBuffer, SequenceEngine};
use crate::gateway::{self, AppState};

use super::cli::{self, CliConfig};
use super::config::AppConfig;
use super::constants::{ENV_LOG, USAGE_BATCH_INTERVAL_SECS};
use super::shutdown::ShutdownService;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageBackend>,
    pub sequence: Arc<SequenceEngine>,
    pub buffer: Arc<MessageBuffer>,
    pub broadcaster: Arc<Broadcaster>,
    pub shard_table: Arc<ShardTable>,
    pub registry: Arc<GlobalRegistry>,
    pub peer_dialer: Arc<dyn PeerDialer>,
    pub usage: Arc<UsageQueue>,
}

impl CoreApp {
    /// Run the application end to end: load configuration, bootstrap every
    /// component, serve HTTP until a shutdown signal arrives.
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("application starting");

        let cli = cli::parse();
        let app = Self::init(&cli).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = Arc::new(AppConfig::load(cli)?);
        let storage = build_backend(&config.cache)
            .await
            .context("failed to initialize storage backend")?;

        tracing::debug!(backend = storage.backend_name(), "storage backend initialized");

        let sequence = Arc::new(SequenceEngine::new(storage.clone()));
        let buffer = Arc::new(MessageBuffer::new(
            storage.clone(),
            config.buffer.ttl_secs,
            config.buffer.prune_limit,
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            config.broadcast.batch_size,
            config.broadcast.backpressure_high_bytes,
            config.broadcast.backpressure_low_bytes,
        ));
        let registry = Arc::new(GlobalRegistry::new(storage.clone()));
        let shard_table = Arc::new(ShardTable::new(registry.clone(), config.server.region.clone()));
        let peer_dialer: Arc<dyn PeerDialer> = Arc::new(InProcessPeerDialer::new());
        let usage = Arc::new(UsageQueue::new(
            config.usage.webhook_url.clone(),
            config.usage.hmac_secret.clone(),
        ));

        Ok(Self {
            shutdown: ShutdownService::new(),
            config,
            storage,
            sequence,
            buffer,
            broadcaster,
            shard_table,
            registry,
            peer_dialer,
            usage,
        })
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", super::constants::APP_NAME_LOWER);
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

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
        app.shutdown.install_signal_handlers();

        let interval_secs = app.config.usage.batch_interval_secs.unwrap_or(USAGE_BATCH_INTERVAL_SECS);
        let usage_handle = app.usage.clone().spawn_drain_task(interval_secs, app.shutdown.subscribe());
        app.shutdown.register(usage_handle).await;

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let shutdown = app.shutdown.clone();

        let state = AppState::new(
            app.config.clone(),
            app.storage.clone(),
            app.sequence.clone(),
            app.buffer.clone(),
            app.broadcaster.clone(),
            app.shard_table.clone(),
            app.registry.clone(),
            app.peer_dialer.clone(),
            app.usage.clone(),
            app.shutdown.clone(),
        );

        let router = gateway::build_router(state);

        let addr = SocketAddr::new(host.parse().context("invalid bind host")?, port);
        let listener = TcpListener::bind(addr).await.context("failed to bind gateway listener")?;

        tracing::info!(%addr, "erebus gateway listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await
            .context("gateway server error")?;

        shutdown.shutdown().await;
        Ok(())
    }
}
