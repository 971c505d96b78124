//! Health check route: `GET /v1/healthz` (SPEC_FULL §11.1). Parallels the
//! teacher's `api/routes/health.rs`, but actually probes the storage backend
//! (`CacheBackend::health_check`) rather than returning a static "ok".

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    backend: &'static str,
}

pub async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                backend: state.storage.backend_name(),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unavailable",
                backend: state.storage.backend_name(),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broadcaster, InProcessPeerDialer, PeerDialer, ShardTable, UsageQueue};
    use crate::core::config::{AppConfig, CacheConfig};
    use crate::core::ShutdownService;
    use crate::data::cache::build_backend;
    use crate::data::{GlobalRegistry, MessageBuffer, SequenceEngine};
    use axum::response::Response;
    use std::sync::Arc;

    async fn state() -> AppState {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        let registry = Arc::new(GlobalRegistry::new(storage.clone()));
        AppState::new(
            Arc::new(AppConfig::default()),
            storage.clone(),
            Arc::new(SequenceEngine::new(storage.clone())),
            Arc::new(MessageBuffer::with_defaults(storage.clone())),
            Arc::new(Broadcaster::default()),
            Arc::new(ShardTable::new(registry.clone(), "local")),
            registry,
            Arc::new(InProcessPeerDialer::new()) as Arc<dyn PeerDialer>,
            Arc::new(UsageQueue::new(None, None)),
            ShutdownService::new(),
        )
    }

    #[tokio::test]
    async fn memory_backend_reports_ok() {
        let response: Response = healthz_handler(State(state().await)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
    }
}
