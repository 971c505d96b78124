//! Broadcaster — component G (spec §4.G).
//!
//! Fans a published `Message` out to every local subscriber's socket in
//! fixed-size batches, applying per-socket backpressure watermarks so one
//! slow reader can't stall delivery to everyone else. Grounded on the
//! teacher's `Publisher<T>` buffer-byte accounting (`data/topics/mod.rs`):
//! an atomic byte counter gating whether a send is attempted at all,
//! generalized from "reject the publish" to "skip this one subscriber and
//! keep going," since a broadcast's failure mode is per-recipient, not
//! global.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::constants::{
    BACKPRESSURE_HIGH_WATERMARK_BYTES, BACKPRESSURE_LOW_WATERMARK_BYTES, BROADCAST_BATCH_SIZE,
};
use crate::model::{AckOutcome, AckPath, AckResult, ErrorCode, Message, PresencePacket, ServerPacket, SubscriptionStatus};
use crate::wire::codec::encode_server_packet;
use crate::wire::error::ErrorKind;

/// One local subscriber's socket, abstracted so the broadcaster never
/// touches an axum `WebSocket` directly (and so tests can use a fake).
#[async_trait]
pub trait ClientSink: Send + Sync {
    /// Bytes currently queued for this socket but not yet flushed to the
    /// network — the backpressure signal (spec §4.G).
    fn buffered_bytes(&self) -> usize;

    async fn send_text(&self, text: String) -> Result<(), ErrorKind>;
}

/// One subscriber's delivery target, paired with whether it only holds an
/// `info` scope on this topic (spec §4.G: info-only subscribers get the
/// informational payload, never the real one).
pub struct Recipient {
    pub client_id: String,
    pub sink: Arc<dyn ClientSink>,
    pub info_only: bool,
}

/// Summary of one broadcast pass, surfaced as a metric (spec §11) rather
/// than propagated as an error — a broadcast to N subscribers degrading
/// gracefully for M of them is the expected steady state under load, not a
/// failure of the publish itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped_backpressure: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    batch_size: usize,
    high_watermark: usize,
    low_watermark: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self {
            batch_size: BROADCAST_BATCH_SIZE,
            high_watermark: BACKPRESSURE_HIGH_WATERMARK_BYTES,
            low_watermark: BACKPRESSURE_LOW_WATERMARK_BYTES,
        }
    }
}

impl Broadcaster {
    pub fn new(batch_size: usize, high_watermark: usize, low_watermark: usize) -> Self {
        Self {
            batch_size,
            high_watermark,
            low_watermark,
        }
    }

    /// Deliver `message` to every recipient, skipping the sender itself
    /// (spec §8 invariant: no self-delivery) and excluding it from
    /// `recipients` is the caller's responsibility — this only handles
    /// batching and backpressure.
    pub async fn broadcast(&self, message: &Message, recipients: &[Recipient]) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let real_packet = ServerPacket::Publish(message.clone());
        let info_packet = ServerPacket::Publish(message.informational());

        let real_encoded = encode_server_packet(&real_packet);
        let info_encoded = encode_server_packet(&info_packet);

        for batch in recipients.chunks(self.batch_size) {
            for recipient in batch {
                let encoded = if recipient.info_only { &info_encoded } else { &real_encoded };
                let Ok(text) = encoded else {
                    report.failed += 1;
                    continue;
                };

                let buffered = recipient.sink.buffered_bytes();
                if buffered >= self.high_watermark {
                    report.skipped_backpressure += 1;
                    continue;
                }
                if buffered >= self.low_watermark {
                    tokio::task::yield_now().await;
                }

                match recipient.sink.send_text(text.clone()).await {
                    Ok(()) => report.delivered += 1,
                    Err(_) => report.failed += 1,
                }
            }
            tokio::task::yield_now().await;
        }

        report
    }

    /// Build the presence packet announcing a subscriber join/leave
    /// (spec §4.G / §6).
    pub fn presence_packet(
        client_id: &str,
        topic: &str,
        status: crate::model::PresenceStatus,
        subscribers: Option<Vec<String>>,
    ) -> PresencePacket {
        PresencePacket {
            client_id: client_id.to_string(),
            topic: topic.to_string(),
            status,
            subscribers,
        }
    }

    /// Build the ACK confirming a (un)subscribe that succeeded.
    pub fn subscription_ack(
        client_msg_id: Option<String>,
        path: AckPath,
        topic: &str,
        status: SubscriptionStatus,
    ) -> ServerPacket {
        ServerPacket::Ack(crate::model::AckPacket {
            client_msg_id,
            result: AckResult {
                path,
                seq: None,
                server_assigned_id: None,
                topic: topic.to_string(),
                result: AckOutcome::Ok(crate::model::AckSuccess::Subscription { status }),
            },
        })
    }

    pub fn error_ack(
        client_msg_id: Option<String>,
        path: AckPath,
        topic: &str,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> ServerPacket {
        ServerPacket::Ack(crate::model::AckPacket {
            client_msg_id,
            result: AckResult {
                path,
                seq: None,
                server_assigned_id: None,
                topic: topic.to_string(),
                result: AckOutcome::Err {
                    code,
                    message: message.into(),
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSink {
        buffered: AtomicUsize,
        received: Mutex<Vec<String>>,
    }

    impl FakeSink {
        fn new(buffered: usize) -> Arc<Self> {
            Arc::new(Self {
                buffered: AtomicUsize::new(buffered),
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClientSink for FakeSink {
        fn buffered_bytes(&self) -> usize {
            self.buffered.load(Ordering::SeqCst)
        }

        async fn send_text(&self, text: String) -> Result<(), ErrorKind> {
            self.received.lock().unwrap().push(text);
            Ok(())
        }
    }

    fn sample_message() -> Message {
        Message::new(crate::model::SequenceId::new(1, 0), "room", "sender", "hi")
    }

    #[tokio::test]
    async fn delivers_to_all_recipients_under_watermark() {
        let broadcaster = Broadcaster::default();
        let sink = FakeSink::new(0);
        let recipients = vec![Recipient {
            client_id: "c1".into(),
            sink: sink.clone(),
            info_only: false,
        }];
        let report = broadcaster.broadcast(&sample_message(), &recipients).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(sink.received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn skips_recipients_above_high_watermark() {
        let broadcaster = Broadcaster::default();
        let sink = FakeSink::new(BACKPRESSURE_HIGH_WATERMARK_BYTES + 1);
        let recipients = vec![Recipient {
            client_id: "c1".into(),
            sink: sink.clone(),
            info_only: false,
        }];
        let report = broadcaster.broadcast(&sample_message(), &recipients).await;
        assert_eq!(report.skipped_backpressure, 1);
        assert_eq!(report.delivered, 0);
        assert!(sink.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn info_only_subscribers_get_informational_payload() {
        let broadcaster = Broadcaster::default();
        let sink = FakeSink::new(0);
        let recipients = vec![Recipient {
            client_id: "c1".into(),
            sink: sink.clone(),
            info_only: true,
        }];
        broadcaster.broadcast(&sample_message(), &recipients).await;
        let received = sink.received.lock().unwrap();
        let value: serde_json::Value = serde_json::from_str(&received[0]).unwrap();
        let payload: serde_json::Value =
            serde_json::from_str(value["payload"].as_str().unwrap()).unwrap();
        assert_eq!(payload["informational"], true);
    }
}
