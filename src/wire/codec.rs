//! Packet encode/decode (spec §6).
//!
//! One JSON object per WebSocket text frame. Grounded on the teacher's SSE
//! encoding in `api/routes/otel/sse.rs` (serialize-then-frame), generalized
//! from an unconditional `Event::default().json_data` to a `Result` since a
//! client frame can fail to parse and that failure has to become an ACK or a
//! close frame, not a panic.

use crate::model::{AckOutcome, AckPacket, AckResult, ClientPacket, ErrorCode, ServerPacket};
use crate::wire::error::ErrorKind;

/// Parse one inbound text frame into a `ClientPacket`.
pub fn decode_client_packet(text: &str) -> Result<ClientPacket, ErrorKind> {
    serde_json::from_str(text)
        .map_err(|e| ErrorKind::Invalid(format!("malformed packet: {e}")))
}

/// Serialize one outbound packet into a text frame.
pub fn encode_server_packet(packet: &ServerPacket) -> Result<String, ErrorKind> {
    serde_json::to_string(packet)
        .map_err(|e| ErrorKind::Internal(format!("failed to encode packet: {e}")))
}

/// Build the failing ACK for a request that was correlated to a
/// `clientMsgId` (spec §7: errors with a request correlation are ACKed,
/// not just raised as a close frame).
pub fn error_ack(
    client_msg_id: Option<String>,
    path: crate::model::AckPath,
    topic: impl Into<String>,
    err: &ErrorKind,
) -> ServerPacket {
    ServerPacket::Ack(AckPacket {
        client_msg_id,
        result: AckResult {
            path,
            seq: None,
            server_assigned_id: None,
            topic: topic.into(),
            result: AckOutcome::Err {
                code: err.code(),
                message: err.message().to_string(),
            },
        },
    })
}

/// Map an `ErrorCode` back onto the close code it would use if there were
/// no ACK correlation available (spec §6 close code table).
pub fn close_code_for(code: ErrorCode) -> u16 {
    use crate::core::constants::{
        CLOSE_BAD_REQUEST, CLOSE_FORBIDDEN, CLOSE_INTERNAL_SERVER_ERROR, CLOSE_UNAUTHORIZED,
        CLOSE_VERSION_MISMATCH,
    };
    match code {
        ErrorCode::Unauthorized => CLOSE_UNAUTHORIZED,
        ErrorCode::Forbidden | ErrorCode::RateLimited => CLOSE_FORBIDDEN,
        ErrorCode::Invalid => CLOSE_BAD_REQUEST,
        ErrorCode::Internal => CLOSE_INTERNAL_SERVER_ERROR,
        ErrorCode::VersionMismatch => CLOSE_VERSION_MISMATCH,
    }
}
