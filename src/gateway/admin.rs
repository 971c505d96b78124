//! Root administrative command route: `POST /v1/root/command` (spec §4.G′,
//! §6). Pauses or unpauses every channel a project owns. The root key check
//! is constant-time, grounded on the teacher's `crypto::constant_time_eq`
//! (`utils/crypto.rs`), which wraps the same `subtle::ConstantTimeEq` call.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::broker::BrokerCommand;

use super::server::AppState;
use super::types::ApiError;

const ROOT_KEY_HEADER: &str = "x-root-api-key";

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminCommand {
    PauseProjectId,
    UnpauseProjectId,
}

#[derive(Debug, Deserialize)]
pub struct AdminCommandRequest {
    pub command: AdminCommand,
    #[serde(rename = "projectId")]
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct AdminCommandResponse {
    #[serde(rename = "channelsAffected")]
    channels_affected: usize,
}

pub async fn admin_command_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AdminCommandRequest>,
) -> Response {
    let Some(configured_key) = state.config.root_api_key.as_deref() else {
        return ApiError::unauthorized("ROOT_KEY_NOT_CONFIGURED", "no root API key is configured").into_response();
    };

    let Some(presented_key) = headers.get(ROOT_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return ApiError::unauthorized("MISSING_ROOT_KEY", "x-root-api-key header required").into_response();
    };

    if !constant_time_eq(configured_key, presented_key) {
        return ApiError::unauthorized("INVALID_ROOT_KEY", "root API key does not match").into_response();
    }

    let channels = match state.shard_table.channels_for_project(&request.project_id).await {
        Ok(channels) => channels,
        Err(err) => return ApiError::internal(err.to_string()).into_response(),
    };

    let mut affected = 0usize;
    for channel in &channels {
        let Some(handle) = state.shard_table.local_handle(channel) else {
            continue;
        };
        let command = match request.command {
            AdminCommand::PauseProjectId => BrokerCommand::Pause,
            AdminCommand::UnpauseProjectId => BrokerCommand::Resume,
        };
        if handle.send(command).await.is_err() {
            warn!(channel = %channel.as_str(), "dropped admin command, broker queue closed");
            continue;
        }
        affected += 1;
    }

    Json(AdminCommandResponse { channels_affected: affected }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broadcaster, InProcessPeerDialer, PeerDialer, ShardTable, UsageQueue};
    use crate::core::config::{AppConfig, CacheConfig};
    use crate::core::ShutdownService;
    use crate::data::cache::build_backend;
    use crate::data::{GlobalRegistry, MessageBuffer, SequenceEngine};
    use axum::http::HeaderValue;
    use std::sync::Arc;

    async fn state_with_root_key(root_api_key: Option<&str>) -> AppState {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        let registry = Arc::new(GlobalRegistry::new(storage.clone()));
        AppState::new(
            Arc::new(AppConfig {
                root_api_key: root_api_key.map(str::to_string),
                ..AppConfig::default()
            }),
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

    fn request_body() -> AdminCommandRequest {
        AdminCommandRequest {
            command: AdminCommand::PauseProjectId,
            project_id: "proj-1".into(),
        }
    }

    #[test]
    fn constant_time_eq_matches_only_identical_strings() {
        assert!(constant_time_eq("hello", "hello"));
        assert!(!constant_time_eq("hello", "world"));
        assert!(!constant_time_eq("hello", "hell"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn admin_command_deserializes_from_snake_case_json() {
        let request: AdminCommandRequest =
            serde_json::from_str(r#"{"command":"unpause_project_id","projectId":"proj-1"}"#).unwrap();
        assert!(matches!(request.command, AdminCommand::UnpauseProjectId));
        assert_eq!(request.project_id, "proj-1");
    }

    #[tokio::test]
    async fn missing_configured_root_key_is_unauthorized() {
        let state = state_with_root_key(None).await;
        let response = admin_command_handler(State(state), HeaderMap::new(), Json(request_body())).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_presented_key_is_unauthorized() {
        let state = state_with_root_key(Some("correct-key")).await;
        let mut headers = HeaderMap::new();
        headers.insert(ROOT_KEY_HEADER, HeaderValue::from_static("wrong-key"));
        let response = admin_command_handler(State(state), headers, Json(request_body())).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn correct_key_with_no_hosted_channels_reports_zero_affected() {
        let state = state_with_root_key(Some("correct-key")).await;
        let mut headers = HeaderMap::new();
        headers.insert(ROOT_KEY_HEADER, HeaderValue::from_static("correct-key"));
        let response = admin_command_handler(State(state), headers, Json(request_body())).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["channelsAffected"], 0);
    }
}
