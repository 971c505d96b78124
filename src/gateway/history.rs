//! Topic history route: `GET /v1/pubsub/topics/{topic}/history` (spec §4.G′,
//! §6). The path only names the topic, so `project`/`channel` travel as
//! query parameters alongside the grant — the same grant transport as the
//! upgrade route (spec §6 "Grant transport"), re-using `extract_grant_token`.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::constants::GET_AFTER_MAX_LIMIT;
use crate::model::SequenceId;
use crate::wire::verify_grant;

use super::server::AppState;
use super::types::ApiError;
use super::ws::extract_grant_token;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub grant: Option<String>,
    pub project: String,
    pub channel: String,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
    pub direction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    items: Vec<crate::model::Message>,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

pub async fn history_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: axum::http::HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let Some(token) = extract_grant_token(query.grant.as_deref(), &headers) else {
        return ApiError::unauthorized("MISSING_GRANT", "grant JWT required (?grant= or X-Erebus-Grant)")
            .into_response();
    };

    let grant = match verify_grant(&token, &state.config.grant) {
        Ok(grant) => grant,
        Err(err) => return ApiError::unauthorized("INVALID_GRANT", err.to_string()).into_response(),
    };

    if grant.project != query.project || grant.channel != query.channel {
        return ApiError::forbidden("GRANT_SCOPE_MISMATCH", "grant does not authorize this project/channel")
            .into_response();
    }

    if !grant.can_read(&topic) && !grant.is_info_only(&topic) {
        return ApiError::forbidden("TOPIC_NOT_READABLE", "grant does not cover this topic").into_response();
    }

    let cursor = match query.cursor.as_deref() {
        Some(raw) => match SequenceId::parse(raw) {
            Some(seq) => Some(seq),
            None => return ApiError::bad_request("INVALID_CURSOR", "cursor is not a valid sequence id").into_response(),
        },
        None => None,
    };

    let direction = query.direction.as_deref().unwrap_or("forward");
    if direction != "forward" && direction != "backward" {
        return ApiError::bad_request("INVALID_DIRECTION", "direction must be forward or backward").into_response();
    }

    let limit = query.limit.unwrap_or(GET_AFTER_MAX_LIMIT).min(GET_AFTER_MAX_LIMIT);

    let items = if direction == "forward" {
        state
            .buffer
            .get_after(&query.project, &query.channel, &topic, cursor, limit)
            .await
    } else {
        state
            .buffer
            .get_before(&query.project, &query.channel, &topic, cursor, limit)
            .await
    };

    let items = match items {
        Ok(items) => items,
        Err(err) => return ApiError::internal(err.to_string()).into_response(),
    };

    let next_cursor = items.last().map(|m| m.seq.to_key());

    Json(HistoryResponse { items, next_cursor }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broadcaster, InProcessPeerDialer, PeerDialer, ShardTable, UsageQueue};
    use crate::core::config::{AppConfig, CacheConfig, GrantConfig};
    use crate::core::ShutdownService;
    use crate::data::cache::build_backend;
    use crate::data::{GlobalRegistry, MessageBuffer, SequenceEngine};
    use crate::model::{Message, Scope, SequenceId, TopicGrant};
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use std::sync::Arc;

    const SECRET: &str = "history-test-secret";

    async fn state_with_hmac_secret() -> AppState {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        let registry = Arc::new(GlobalRegistry::new(storage.clone()));
        AppState::new(
            Arc::new(AppConfig {
                grant: GrantConfig {
                    hmac_secret: Some(SECRET.to_string()),
                    public_key_path: None,
                },
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

    fn sign(grant: &crate::model::Grant) -> String {
        encode(&Header::new(Algorithm::HS256), grant, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
    }

    fn grant_for(project: &str, channel: &str, topic: &str, scope: Scope) -> crate::model::Grant {
        let now = Utc::now();
        crate::model::Grant {
            project: project.into(),
            channel: channel.into(),
            user_id: "u1".into(),
            key_id: "k1".into(),
            topics: vec![TopicGrant {
                topic: topic.into(),
                scope,
            }],
            webhook_url: None,
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    async fn call(
        state: &AppState,
        topic: &str,
        query: HistoryQuery,
    ) -> Response {
        history_handler(
            State(state.clone()),
            Path(topic.to_string()),
            axum::http::HeaderMap::new(),
            Query(query),
        )
        .await
    }

    fn base_query(grant: Option<String>, project: &str, channel: &str) -> HistoryQuery {
        HistoryQuery {
            grant,
            project: project.into(),
            channel: channel.into(),
            cursor: None,
            limit: None,
            direction: None,
        }
    }

    #[tokio::test]
    async fn missing_grant_is_unauthorized() {
        let state = state_with_hmac_secret().await;
        let response = call(&state, "room", base_query(None, "p", "c")).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_grant_is_unauthorized() {
        let state = state_with_hmac_secret().await;
        let response = call(&state, "room", base_query(Some("not-a-jwt".into()), "p", "c")).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn scope_mismatched_grant_is_forbidden() {
        let state = state_with_hmac_secret().await;
        let token = sign(&grant_for("p", "c", "room", Scope::Read));
        let response = call(&state, "room", base_query(Some(token), "other-project", "c")).await;
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn grant_without_read_access_to_topic_is_forbidden() {
        let state = state_with_hmac_secret().await;
        let token = sign(&grant_for("p", "c", "room", Scope::Write));
        let response = call(&state, "room", base_query(Some(token), "p", "c")).await;
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_cursor_is_bad_request() {
        let state = state_with_hmac_secret().await;
        let token = sign(&grant_for("p", "c", "room", Scope::Read));
        let mut query = base_query(Some(token), "p", "c");
        query.cursor = Some("not-a-sequence-id".into());
        let response = call(&state, "room", query).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_direction_is_bad_request() {
        let state = state_with_hmac_secret().await;
        let token = sign(&grant_for("p", "c", "room", Scope::Read));
        let mut query = base_query(Some(token), "p", "c");
        query.direction = Some("sideways".into());
        let response = call(&state, "room", query).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forward_history_returns_messages_after_cursor_in_order() {
        let state = state_with_hmac_secret().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        let s3 = SequenceId::new(3, 0);
        state.buffer.buffer("p", "c", &Message::new(s1, "room", "sender", "one")).await.unwrap();
        state.buffer.buffer("p", "c", &Message::new(s2, "room", "sender", "two")).await.unwrap();
        state.buffer.buffer("p", "c", &Message::new(s3, "room", "sender", "three")).await.unwrap();

        let token = sign(&grant_for("p", "c", "room", Scope::Read));
        let mut query = base_query(Some(token), "p", "c");
        query.cursor = Some(s1.to_key());
        let response = call(&state, "room", query).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HistoryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].payload, "two");
        assert_eq!(parsed.items[1].payload, "three");
        assert_eq!(parsed.next_cursor, Some(s3.to_key()));
    }

    #[tokio::test]
    async fn backward_history_returns_messages_before_cursor_newest_first() {
        let state = state_with_hmac_secret().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        let s3 = SequenceId::new(3, 0);
        state.buffer.buffer("p", "c", &Message::new(s1, "room", "sender", "one")).await.unwrap();
        state.buffer.buffer("p", "c", &Message::new(s2, "room", "sender", "two")).await.unwrap();
        state.buffer.buffer("p", "c", &Message::new(s3, "room", "sender", "three")).await.unwrap();

        let token = sign(&grant_for("p", "c", "room", Scope::Read));
        let mut query = base_query(Some(token), "p", "c");
        query.cursor = Some(s3.to_key());
        query.direction = Some("backward".into());
        let response = call(&state, "room", query).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let parsed: HistoryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].payload, "two");
        assert_eq!(parsed.items[1].payload, "one");
    }
}
