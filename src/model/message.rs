//! `Message` — a published payload with its full latency-trace lifecycle
//! (spec §3). No direct teacher analogue; built as a plain serde struct in
//! the teacher's style (e.g. `domain::SseSpanEvent`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sequence_id::SequenceId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned UUID, unique per message.
    pub id: Uuid,
    /// Monotonic per-(project, channel, topic) id assigned by the region
    /// that received the publish.
    pub seq: SequenceId,
    pub topic: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
    pub payload: String,
    #[serde(rename = "clientMsgId", skip_serializing_if = "Option::is_none")]
    pub client_msg_id: Option<String>,
    #[serde(rename = "clientPublishTs", skip_serializing_if = "Option::is_none")]
    pub client_publish_ts: Option<DateTime<Utc>>,

    // Latency trace — wall-clock timestamps at each pipeline stage.
    #[serde(rename = "t_ingress", skip_serializing_if = "Option::is_none")]
    pub t_ingress: Option<DateTime<Utc>>,
    #[serde(rename = "t_enqueued", skip_serializing_if = "Option::is_none")]
    pub t_enqueued: Option<DateTime<Utc>>,
    #[serde(rename = "t_broadcast_begin", skip_serializing_if = "Option::is_none")]
    pub t_broadcast_begin: Option<DateTime<Utc>>,
    #[serde(rename = "t_ws_write_end", skip_serializing_if = "Option::is_none")]
    pub t_ws_write_end: Option<DateTime<Utc>>,
    #[serde(rename = "t_broadcast_end", skip_serializing_if = "Option::is_none")]
    pub t_broadcast_end: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        seq: SequenceId,
        topic: impl Into<String>,
        sender_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            seq,
            topic: topic.into(),
            sender_id: sender_id.into(),
            sent_at: Utc::now(),
            payload: payload.into(),
            client_msg_id: None,
            client_publish_ts: None,
            t_ingress: None,
            t_enqueued: None,
            t_broadcast_begin: None,
            t_ws_write_end: None,
            t_broadcast_end: None,
        }
    }

    /// The "informational" fixed payload delivered to `info`-scope
    /// subscribers instead of the real payload (spec §4.G).
    pub fn informational(&self) -> Message {
        let mut copy = self.clone();
        copy.payload = serde_json::json!({ "informational": true, "topic": copy.topic }).to_string();
        copy
    }
}
