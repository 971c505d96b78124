//! Gateway composition root: `AppState`, broker-actor lazy spawning, and
//! route wiring. Grounded on the teacher's `core::app::CoreApp` composition
//! root and `api::server::ApiServer` router assembly (`api/server.rs`) —
//! one `Arc`-heavy state struct handed into every handler via axum's
//! `State` extractor, a single `Router` built once at startup.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::{mpsc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::broker::{
    BrokerContext, BrokerHandle, Broadcaster, ChannelBroker, PeerDialer, ShardTable, UsageQueue,
};
use crate::core::config::AppConfig;
use crate::core::constants::BROKER_COMMAND_QUEUE_CAPACITY;
use crate::core::ShutdownService;
use crate::data::cache::StorageBackend;
use crate::data::{GlobalRegistry, MessageBuffer, SequenceEngine, SubscriptionRegistry};
use crate::model::DistributedKey;

use super::types::ApiError;

/// Shared handle to every broker-wide service, cloned into each axum
/// handler. Spawning a channel's `ChannelBroker` actor is lazy and
/// idempotent — the first request that touches a (project, channel) pair
/// spawns it, every later one reuses the same `BrokerHandle`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageBackend>,
    pub sequence: Arc<SequenceEngine>,
    pub buffer: Arc<MessageBuffer>,
    pub broadcaster: Arc<Broadcaster>,
    pub shard_table: Arc<ShardTable>,
    pub registry: Arc<GlobalRegistry>,
    pub peer_dialer: Arc<dyn PeerDialer>,
    pub usage: Arc<UsageQueue>,
    pub shutdown: ShutdownService,
    spawn_lock: Arc<Mutex<()>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageBackend>,
        sequence: Arc<SequenceEngine>,
        buffer: Arc<MessageBuffer>,
        broadcaster: Arc<Broadcaster>,
        shard_table: Arc<ShardTable>,
        registry: Arc<GlobalRegistry>,
        peer_dialer: Arc<dyn PeerDialer>,
        usage: Arc<UsageQueue>,
        shutdown: ShutdownService,
    ) -> Self {
        Self {
            config,
            storage,
            sequence,
            buffer,
            broadcaster,
            shard_table,
            registry,
            peer_dialer,
            usage,
            shutdown,
            spawn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Return the locally-hosted `BrokerHandle` for `(project, channel)`,
    /// spawning a fresh `ChannelBroker` actor if this process doesn't host
    /// one yet. Double-checks under `spawn_lock` so two concurrent upgrade
    /// requests for the same never-before-seen channel can't spawn it twice.
    pub async fn get_or_spawn_broker(&self, project: &str, channel: &str) -> BrokerHandle {
        let key = DistributedKey::channel(project, channel);
        if let Some(handle) = self.shard_table.local_handle(&key) {
            return handle;
        }

        let _guard = self.spawn_lock.lock().await;
        if let Some(handle) = self.shard_table.local_handle(&key) {
            return handle;
        }

        let (command_tx, command_rx) = mpsc::channel(BROKER_COMMAND_QUEUE_CAPACITY);
        let (presence_tx, presence_rx) = crate::broker::presence::channel(BROKER_COMMAND_QUEUE_CAPACITY);

        let ctx = BrokerContext {
            project: project.to_string(),
            channel: channel.to_string(),
            region: self.config.server.region.clone(),
            sequence: self.sequence.clone(),
            buffer: self.buffer.clone(),
            subscriptions: Arc::new(SubscriptionRegistry::new(
                self.storage.clone(),
                self.config.subscriptions.max_per_topic,
            )),
            broadcaster: self.broadcaster.clone(),
            shard_table: self.shard_table.clone(),
            peer_dialer: self.peer_dialer.clone(),
            presence_tx,
            usage: self.usage.clone(),
        };

        tokio::spawn(ChannelBroker::new(ctx).run(command_rx, presence_rx));

        if let Err(err) = self.shard_table.host(&key, command_tx.clone()).await {
            warn!(project, channel, error = %err, "failed to register newly spawned broker in global registry");
        }

        command_tx
    }
}

async fn handle_404() -> ApiError {
    ApiError::not_found("NOT_FOUND", "no route matches this path")
}

/// Assemble the full axum router (spec §4.G′, §6 route table).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/healthz", get(super::health::healthz_handler))
        .route("/v1/pubsub/{project}/{channel}", get(super::ws::ws_upgrade_handler))
        .route("/v1/pubsub/topics/{topic}/history", get(super::history::history_handler))
        .route("/v1/root/command", post(super::admin::admin_command_handler))
        .fallback(handle_404)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
