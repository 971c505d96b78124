//! Usage event emission (spec §4.G′, §11 supplemented feature).
//!
//! Batches publish/subscribe activity per grant and, on an interval, signs
//! the batch with HMAC-SHA256 over a configured webhook secret — grounded on
//! the teacher's `utils::api_key::hash_api_key`, the same `Hmac<Sha256>`
//! construction, applied here to sign an outbound payload rather than hash a
//! stored secret. `UsageQueue::spawn_drain_task` POSTs the signed batch on an
//! interval, in the same register-a-`JoinHandle`-with-`ShutdownService` style
//! as the teacher's `start_health_check_task`/`start_checkpoint_task`.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::Sha256;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type HmacSha256 = Hmac<Sha256>;

/// One billable occurrence. `project`/`channel`/`topic` are kept for
/// in-process bookkeeping even though the wire envelope (spec §6 "Queue
/// envelope") only carries `projectId`/`keyId`/`payloadLength` — `Serialize`
/// is hand-written below to match that envelope exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub project: String,
    pub channel: String,
    pub topic: Option<String>,
    pub key_id: String,
    pub event_type: UsageEventType,
    pub bytes: usize,
}

impl Serialize for UsageEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        #[derive(Serialize)]
        struct Data<'a> {
            #[serde(rename = "projectId")]
            project_id: &'a str,
            #[serde(rename = "keyId")]
            key_id: &'a str,
            #[serde(rename = "payloadLength")]
            payload_length: usize,
        }

        #[derive(Serialize)]
        struct Payload<'a> {
            event: UsageEventType,
            data: Data<'a>,
        }

        let mut envelope = serializer.serialize_struct("UsageEvent", 2)?;
        envelope.serialize_field("packetType", "usage")?;
        envelope.serialize_field(
            "payload",
            &Payload {
                event: self.event_type,
                data: Data {
                    project_id: &self.project,
                    key_id: &self.key_id,
                    payload_length: self.bytes,
                },
            },
        )?;
        envelope.end()
    }
}

/// Matches the `event` discriminator spec §4.G′/§11 puts on the webhook
/// queue envelope (`websocket.connect`/`websocket.subscribe`/`websocket.message`).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum UsageEventType {
    #[serde(rename = "websocket.connect")]
    Connect,
    #[serde(rename = "websocket.subscribe")]
    Subscribe,
    #[serde(rename = "websocket.message")]
    Message,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageBatch {
    pub events: Vec<UsageEvent>,
}

impl UsageBatch {
    pub fn push(&mut self, event: UsageEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn take(&mut self) -> UsageBatch {
        std::mem::take(self)
    }
}

/// HMAC-SHA256 signature (hex) over a batch's JSON body, for the receiving
/// webhook to verify the sender holds `secret`.
pub fn sign_batch(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Accumulates usage events and periodically POSTs a signed batch to the
/// configured webhook (spec §4.G′ "queue drain"). A missing `webhook_url`
/// makes the drain a no-op — events still accumulate (dropped on restart,
/// since this is metrics, not durable state) but nothing is sent.
pub struct UsageQueue {
    batch: Mutex<UsageBatch>,
    webhook_url: Option<String>,
    hmac_secret: Option<String>,
    client: reqwest::Client,
}

impl UsageQueue {
    pub fn new(webhook_url: Option<String>, hmac_secret: Option<String>) -> Self {
        Self {
            batch: Mutex::new(UsageBatch::default()),
            webhook_url,
            hmac_secret,
            client: reqwest::Client::new(),
        }
    }

    pub fn push(&self, event: UsageEvent) {
        self.batch.lock().push(event);
    }

    /// Spawn the periodic drain task, registered with `shutdown` so the
    /// final partial batch is flushed before the process exits.
    pub fn spawn_drain_task(self: Arc<Self>, interval_secs: u64, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.drain_once().await,
                    _ = shutdown.changed() => {
                        self.drain_once().await;
                        break;
                    }
                }
            }
        })
    }

    async fn drain_once(&self) {
        let Some(url) = self.webhook_url.as_deref() else {
            return;
        };
        let batch = self.batch.lock().take();
        if batch.is_empty() {
            return;
        }

        let Ok(body) = serde_json::to_vec(&batch) else {
            return;
        };

        let mut request = self.client.post(url).header("content-type", "application/json");
        if let Some(secret) = &self.hmac_secret {
            request = request.header("X-Erebus-Hmac", sign_batch(&body, secret));
        }

        if let Err(err) = request.body(body).send().await {
            tracing::warn!(error = %err, "usage webhook delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_body_and_secret() {
        let body = b"{\"events\":[]}";
        let sig1 = sign_batch(body, "secret");
        let sig2 = sign_batch(body, "secret");
        assert_eq!(sig1, sig2);
        assert_eq!(sig1.len(), 64);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let body = b"{\"events\":[]}";
        assert_ne!(sign_batch(body, "a"), sign_batch(body, "b"));
    }

    #[test]
    fn batch_take_drains_events() {
        let mut batch = UsageBatch::default();
        batch.push(UsageEvent {
            project: "p".into(),
            channel: "c".into(),
            topic: Some("t".into()),
            key_id: "k".into(),
            event_type: UsageEventType::Message,
            bytes: 10,
        });
        let taken = batch.take();
        assert_eq!(taken.events.len(), 1);
        assert!(batch.is_empty());
    }
}
