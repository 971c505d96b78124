//! WebSocket upgrade and per-connection packet pump (spec §4.G′, §4.H, §6).
//!
//! Two independent grant checks guard a connection, per spec: the upgrade
//! handler extracts and verifies the grant to decide whether to upgrade at
//! all (401/403 before a socket ever opens), and the first wire message the
//! client sends after upgrading must itself be a `connect` packet carrying
//! the same kind of grant, verified again by the broker layer before it
//! attaches to any client state (spec §4.H) — closing with `BAD_REQUEST`
//! rather than `UNAUTHORIZED` if that second check fails. Socket plumbing
//! (split sender/receiver, a single writer task fed by an unbounded channel
//! so concurrent broadcaster writes never race the client's own handler
//! loop) is grounded on the pack's `venantvr-pubsub-Rust-PubSub-Server`
//! websocket handler (`src/websocket.rs`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::{BrokerCommand, ClientSink};
use crate::core::constants::WIRE_PROTOCOL_VERSION;
use crate::model::ClientPacket;
use crate::wire::codec::decode_client_packet;
use crate::wire::error::ErrorKind;
use crate::wire::verify_grant;

use super::server::AppState;
use super::types::ApiError;

const GRANT_HEADER: &str = "x-erebus-grant";

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub grant: Option<String>,
}

/// Pull the grant JWT off `?grant=` (primary) or the `X-Erebus-Grant`
/// header (fallback), per spec §6's "grant transport" note.
pub fn extract_grant_token(query_grant: Option<&str>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = query_grant.filter(|g| !g.is_empty()) {
        return Some(token.to_string());
    }
    headers
        .get(GRANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub async fn ws_upgrade_handler(
    State(state): State<AppState>,
    Path((project, channel)): Path<(String, String)>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = extract_grant_token(query.grant.as_deref(), &headers) else {
        return ApiError::unauthorized("MISSING_GRANT", "grant JWT required (?grant= or X-Erebus-Grant)")
            .into_response();
    };

    let grant = match verify_grant(&token, &state.config.grant) {
        Ok(grant) => grant,
        Err(err) => return ApiError::unauthorized("INVALID_GRANT", err.to_string()).into_response(),
    };

    if grant.project != project || grant.channel != channel {
        return ApiError::forbidden("GRANT_SCOPE_MISMATCH", "grant does not authorize this project/channel")
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state, project, channel))
}

/// One local subscriber's socket, written to from a dedicated task that
/// drains an unbounded channel — so broadcaster fan-out, presence, and ACK
/// replies never contend over the same `WebSocket` sender half.
struct WsSink {
    tx: mpsc::UnboundedSender<WsMessage>,
    buffered: Arc<AtomicUsize>,
}

#[async_trait]
impl ClientSink for WsSink {
    fn buffered_bytes(&self) -> usize {
        self.buffered.load(Ordering::SeqCst)
    }

    async fn send_text(&self, text: String) -> Result<(), ErrorKind> {
        self.buffered.fetch_add(text.len(), Ordering::SeqCst);
        self.tx
            .send(WsMessage::Text(text.into()))
            .map_err(|_| ErrorKind::Internal("client socket writer closed".into()))
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, project: String, channel: String) {
    let client_id = Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (internal_tx, mut internal_rx) = mpsc::unbounded_channel::<WsMessage>();
    let buffered = Arc::new(AtomicUsize::new(0));

    let writer_buffered = buffered.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(message) = internal_rx.recv().await {
            let sent_len = match &message {
                WsMessage::Text(text) => text.len(),
                _ => 0,
            };
            if ws_tx.send(message).await.is_err() {
                break;
            }
            writer_buffered.fetch_sub(sent_len, Ordering::SeqCst);
        }
    });

    let broker = state.get_or_spawn_broker(&project, &channel).await;

    if !await_connect_packet(&mut ws_rx, &internal_tx, &buffered, &broker, &client_id, &state).await {
        let _ = internal_tx.send(WsMessage::Close(None));
        writer_task.abort();
        return;
    }

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            WsMessage::Text(ref text) if &text[..] == "ping" => {
                let _ = internal_tx.send(WsMessage::Text("pong".into()));
            }
            WsMessage::Text(text) => {
                dispatch_packet(&text, &broker, &client_id, &internal_tx).await;
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    let _ = broker.send(BrokerCommand::Disconnect { client_id: client_id.clone() }).await;
    writer_task.abort();
    debug!(client_id, project, channel, "websocket connection closed");
}

/// Wait for the client's first text frame, which must be a `connect`
/// packet (spec §4.H). Re-verifies the grant independently of the
/// upgrade-time check — a different client could in principle reuse this
/// socket's URL with a stale or substituted grant in the first frame.
/// Failure here closes with `BAD_REQUEST`, not `UNAUTHORIZED`.
async fn await_connect_packet(
    ws_rx: &mut futures::stream::SplitStream<WebSocket>,
    internal_tx: &mpsc::UnboundedSender<WsMessage>,
    buffered: &Arc<AtomicUsize>,
    broker: &crate::broker::BrokerHandle,
    client_id: &str,
    state: &AppState,
) -> bool {
    let Some(Ok(WsMessage::Text(text))) = ws_rx.next().await else {
        send_close(internal_tx, ErrorKind::Invalid("expected a connect packet".into()));
        return false;
    };

    let packet = match decode_client_packet(&text) {
        Ok(packet) => packet,
        Err(err) => {
            send_close(internal_tx, err);
            return false;
        }
    };

    let ClientPacket::Connect { grant_jwt, version } = packet else {
        send_close(internal_tx, ErrorKind::Invalid("expected a connect packet".into()));
        return false;
    };

    if let Err(err) = check_protocol_version(version) {
        send_close(internal_tx, err);
        return false;
    }

    let grant = match verify_grant(&grant_jwt, &state.config.grant) {
        Ok(grant) => grant,
        Err(err) => {
            send_close(internal_tx, ErrorKind::Invalid(err.to_string()));
            return false;
        }
    };

    let sink: Arc<dyn ClientSink> = Arc::new(WsSink {
        tx: internal_tx.clone(),
        buffered: buffered.clone(),
    });

    if broker
        .send(BrokerCommand::Connect {
            client_id: client_id.to_string(),
            grant,
            sink,
        })
        .await
        .is_err()
    {
        send_close(internal_tx, ErrorKind::Internal("broker command queue closed".into()));
        return false;
    }

    true
}

/// A missing `version` is treated as the current version (spec §6: `version`
/// on `connect` is optional); a present-but-different value closes with
/// `VersionMismatch` (4409) before any grant is even checked.
fn check_protocol_version(version: Option<u32>) -> Result<(), ErrorKind> {
    match version {
        None | Some(WIRE_PROTOCOL_VERSION) => Ok(()),
        Some(v) => Err(ErrorKind::VersionMismatch(format!(
            "unsupported protocol version {v}, expected {WIRE_PROTOCOL_VERSION}"
        ))),
    }
}

fn send_close(internal_tx: &mpsc::UnboundedSender<WsMessage>, err: ErrorKind) {
    let _ = internal_tx.send(WsMessage::Close(Some(axum::extract::ws::CloseFrame {
        code: err.close_code(),
        reason: err.message().to_string().into(),
    })));
}

async fn dispatch_packet(
    text: &str,
    broker: &crate::broker::BrokerHandle,
    client_id: &str,
    internal_tx: &mpsc::UnboundedSender<WsMessage>,
) {
    let packet = match decode_client_packet(text) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(client_id, error = %err, "closing connection on malformed packet");
            send_close(internal_tx, err);
            return;
        }
    };

    let command = match packet {
        ClientPacket::Connect { .. } => {
            // A second `connect` on an already-connected socket is a no-op;
            // the spec defines `connect` only as the first-message handshake.
            return;
        }
        ClientPacket::Subscribe { topic, client_msg_id, .. } => BrokerCommand::Subscribe {
            client_id: client_id.to_string(),
            topic,
            client_msg_id,
        },
        ClientPacket::Unsubscribe { topic, client_msg_id, .. } => BrokerCommand::Unsubscribe {
            client_id: client_id.to_string(),
            topic,
            client_msg_id,
        },
        ClientPacket::Publish {
            topic,
            payload,
            ack,
            client_msg_id,
            ..
        } => BrokerCommand::Publish {
            client_id: client_id.to_string(),
            topic,
            payload,
            ack,
            client_msg_id,
            client_publish_ts: None,
        },
    };

    if broker.send(command).await.is_err() {
        warn!(client_id, "broker command queue closed, dropping packet");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn query_grant_takes_priority_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(GRANT_HEADER, HeaderValue::from_static("header-token"));
        let token = extract_grant_token(Some("query-token"), &headers);
        assert_eq!(token.as_deref(), Some("query-token"));
    }

    #[test]
    fn empty_query_grant_falls_through_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(GRANT_HEADER, HeaderValue::from_static("header-token"));
        let token = extract_grant_token(Some(""), &headers);
        assert_eq!(token.as_deref(), Some("header-token"));
    }

    #[test]
    fn missing_query_grant_falls_through_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(GRANT_HEADER, HeaderValue::from_static("header-token"));
        let token = extract_grant_token(None, &headers);
        assert_eq!(token.as_deref(), Some("header-token"));
    }

    #[test]
    fn missing_both_returns_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_grant_token(None, &headers), None);
    }

    #[test]
    fn missing_version_is_accepted() {
        assert!(check_protocol_version(None).is_ok());
    }

    #[test]
    fn matching_version_is_accepted() {
        assert!(check_protocol_version(Some(WIRE_PROTOCOL_VERSION)).is_ok());
    }

    #[test]
    fn mismatched_version_closes_with_version_mismatch() {
        let err = check_protocol_version(Some(WIRE_PROTOCOL_VERSION + 1)).unwrap_err();
        assert_eq!(err.close_code(), 4409);
    }
}
