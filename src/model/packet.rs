//! Wire packet envelopes (spec §6).
//!
//! JSON with a single-field discriminator, `packetType`. Parsing/validation
//! and close-code mapping live in `wire::codec`; this module is just the
//! shapes, kept free of any I/O so they can be round-tripped in unit tests
//! independent of the socket layer — the same split the teacher keeps
//! between `api/types.rs` (shapes) and its route handlers (I/O).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;
use super::sequence_id::SequenceId;

/// Client → server packets.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "packetType", rename_all = "lowercase")]
pub enum ClientPacket {
    Connect {
        #[serde(rename = "grantJWT")]
        grant_jwt: String,
        version: Option<u32>,
    },
    Subscribe {
        topic: String,
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "clientMsgId")]
        client_msg_id: Option<String>,
    },
    Unsubscribe {
        topic: String,
        #[serde(rename = "requestId")]
        request_id: Option<String>,
        #[serde(rename = "clientMsgId")]
        client_msg_id: Option<String>,
    },
    Publish {
        topic: String,
        payload: String,
        #[serde(default)]
        ack: bool,
        #[serde(rename = "clientMsgId")]
        client_msg_id: String,
        #[serde(rename = "requestId")]
        request_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Server → client `presence` packet.
#[derive(Debug, Clone, Serialize)]
pub struct PresencePacket {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub topic: String,
    pub status: PresenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckPath {
    Subscribe,
    Unsubscribe,
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Subscribed,
    Unsubscribed,
}

/// Error codes surfaced on the wire (spec §7), shared between ACKs and
/// close frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    Invalid,
    RateLimited,
    Internal,
    VersionMismatch,
}

#[derive(Debug, Clone)]
pub enum AckOutcome {
    Ok(AckSuccess),
    Err { code: ErrorCode, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AckSuccess {
    Subscription { status: SubscriptionStatus },
    Publish {
        #[serde(rename = "t_ingress")]
        t_ingress: chrono::DateTime<chrono::Utc>,
    },
}

// `ok` is a boolean discriminator in the wire format (spec §6), which
// `#[serde(tag = "...")]` cannot express directly (internally tagged enums
// require string tags) — serialized by hand instead.
impl Serialize for AckOutcome {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            AckOutcome::Ok(success) => {
                let inner = serde_json::to_value(success).map_err(serde::ser::Error::custom)?;
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("ok", &true)?;
                if let serde_json::Value::Object(fields) = inner {
                    for (k, v) in fields {
                        map.serialize_entry(&k, &v)?;
                    }
                }
                map.end()
            }
            AckOutcome::Err { code, message } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("code", code)?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AckResult {
    pub path: AckPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<SequenceId>,
    #[serde(rename = "serverAssignedId", skip_serializing_if = "Option::is_none")]
    pub server_assigned_id: Option<Uuid>,
    pub topic: String,
    pub result: AckOutcome,
}

/// Outer `ack` envelope — correlated to the triggering request by
/// `clientMsgId` (spec §8 invariant 8).
#[derive(Debug, Clone, Serialize)]
pub struct AckPacket {
    #[serde(rename = "clientMsgId")]
    pub client_msg_id: Option<String>,
    pub result: AckResult,
}

/// Server → client packets. `Publish` carries the full `Message` body.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "packetType", rename_all = "lowercase")]
pub enum ServerPacket {
    Publish(Message),
    Ack(AckPacket),
    Presence(PresencePacket),
}
