//! Message Buffer — component B (spec §3, §4.B).
//!
//! Retains published messages for `MESSAGE_TTL_SECS` so a reconnecting
//! client can catch up via `getAfter`. Keys are lexicographically ordered by
//! `SequenceId` (`msg:<project>:<channel>:<topic>:<seq>`), so `getAfter` is a
//! plain ordered prefix scan with no secondary index — the property
//! `SequenceId::to_key` was built to provide. Pruning is opportunistic and
//! bounded (`PRUNE_LIMIT` keys per `buffer()` call), grounded on the
//! teacher's `InMemoryCache::cleanup_expired_counters`, which is also run
//! inline on a cadence rather than via a background sweep task.

use std::sync::Arc;

use thiserror::Error;

use crate::core::constants::{GET_AFTER_MAX_LIMIT, MESSAGE_TTL_SECS, PRUNE_LIMIT};
use crate::data::cache::{CacheError, StorageBackend};
use crate::model::{message_key, message_key_prefix, Message, SequenceId};

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("storage error: {0}")]
    Storage(#[from] CacheError),
    #[error("message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub struct MessageBuffer {
    storage: Arc<dyn StorageBackend>,
    ttl_secs: u64,
    prune_limit: usize,
}

impl MessageBuffer {
    pub fn new(storage: Arc<dyn StorageBackend>, ttl_secs: u64, prune_limit: usize) -> Self {
        Self {
            storage,
            ttl_secs,
            prune_limit,
        }
    }

    pub fn with_defaults(storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(storage, MESSAGE_TTL_SECS, PRUNE_LIMIT)
    }

    /// Persist `message` under its topic's sequence-ordered key, with a TTL.
    /// After the write, scans up to `prune_limit` keys of the same prefix
    /// and drops any that the backend reports as already gone — the backend
    /// owns actual TTL expiry, this just bounds how much dead-key metadata
    /// piles up in pattern scans over time.
    pub async fn buffer(
        &self,
        project: &str,
        channel: &str,
        message: &Message,
    ) -> Result<(), BufferError> {
        let key = message_key(project, channel, &message.topic, message.seq);
        let bytes = serde_json::to_vec(message)?;
        self.storage.set(&key, bytes, Some(self.ttl_secs)).await?;
        self.prune(project, channel, &message.topic).await?;
        Ok(())
    }

    async fn prune(&self, project: &str, channel: &str, topic: &str) -> Result<(), BufferError> {
        let prefix = message_key_prefix(project, channel, topic);
        let entries = self.storage.scan_prefix(&prefix).await?;
        for (key, _) in entries.into_iter().take(self.prune_limit) {
            if !self.storage.exists(&key).await? {
                self.storage.delete(&key).await?;
            }
        }
        Ok(())
    }

    /// All buffered messages on `topic` with `seq > after`, oldest first,
    /// capped at `GET_AFTER_MAX_LIMIT` (spec §4.B).
    pub async fn get_after(
        &self,
        project: &str,
        channel: &str,
        topic: &str,
        after: Option<SequenceId>,
        limit: usize,
    ) -> Result<Vec<Message>, BufferError> {
        let prefix = message_key_prefix(project, channel, topic);
        let entries = self.storage.scan_prefix(&prefix).await?;
        let limit = limit.min(GET_AFTER_MAX_LIMIT);

        let mut out = Vec::with_capacity(limit.min(entries.len()));
        for (_, bytes) in entries {
            let message: Message = serde_json::from_slice(&bytes)?;
            if after.is_none_or(|cursor| message.seq > cursor) {
                out.push(message);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// All buffered messages on `topic` with `seq < before`, newest first,
    /// capped at `GET_AFTER_MAX_LIMIT`. Supports the history route's
    /// backward pagination (spec §4.G′), the mirror image of `get_after`.
    pub async fn get_before(
        &self,
        project: &str,
        channel: &str,
        topic: &str,
        before: Option<SequenceId>,
        limit: usize,
    ) -> Result<Vec<Message>, BufferError> {
        let prefix = message_key_prefix(project, channel, topic);
        let entries = self.storage.scan_prefix(&prefix).await?;
        let limit = limit.min(GET_AFTER_MAX_LIMIT);

        let mut matching = Vec::with_capacity(entries.len());
        for (_, bytes) in entries {
            let message: Message = serde_json::from_slice(&bytes)?;
            if before.is_none_or(|cursor| message.seq < cursor) {
                matching.push(message);
            }
        }
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));
        matching.truncate(limit);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cache::build_backend;
    use crate::core::config::CacheConfig;

    async fn buffer() -> MessageBuffer {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        MessageBuffer::with_defaults(storage)
    }

    fn msg(seq: SequenceId, topic: &str) -> Message {
        Message::new(seq, topic, "sender", "hello")
    }

    #[tokio::test]
    async fn get_after_returns_only_newer_messages_in_order() {
        let buf = buffer().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        let s3 = SequenceId::new(3, 0);
        buf.buffer("p", "c", &msg(s1, "room")).await.unwrap();
        buf.buffer("p", "c", &msg(s2, "room")).await.unwrap();
        buf.buffer("p", "c", &msg(s3, "room")).await.unwrap();

        let got = buf.get_after("p", "c", "room", Some(s1), 10).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].seq, s2);
        assert_eq!(got[1].seq, s3);
    }

    #[tokio::test]
    async fn get_after_none_returns_everything() {
        let buf = buffer().await;
        let s1 = SequenceId::new(1, 0);
        buf.buffer("p", "c", &msg(s1, "room")).await.unwrap();
        let got = buf.get_after("p", "c", "room", None, 10).await.unwrap();
        assert_eq!(got.len(), 1);
    }

    #[tokio::test]
    async fn limit_is_capped_at_spec_max() {
        let buf = buffer().await;
        for i in 0..5u64 {
            buf.buffer("p", "c", &msg(SequenceId::new(i + 1, 0), "room"))
                .await
                .unwrap();
        }
        let got = buf.get_after("p", "c", "room", None, 2).await.unwrap();
        assert_eq!(got.len(), 2);
    }

    #[tokio::test]
    async fn get_before_returns_older_messages_newest_first() {
        let buf = buffer().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        let s3 = SequenceId::new(3, 0);
        buf.buffer("p", "c", &msg(s1, "room")).await.unwrap();
        buf.buffer("p", "c", &msg(s2, "room")).await.unwrap();
        buf.buffer("p", "c", &msg(s3, "room")).await.unwrap();

        let got = buf.get_before("p", "c", "room", Some(s3), 10).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].seq, s2);
        assert_eq!(got[1].seq, s1);
    }

    #[tokio::test]
    async fn get_before_none_returns_everything_newest_first() {
        let buf = buffer().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        buf.buffer("p", "c", &msg(s1, "room")).await.unwrap();
        buf.buffer("p", "c", &msg(s2, "room")).await.unwrap();

        let got = buf.get_before("p", "c", "room", None, 10).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].seq, s2);
        assert_eq!(got[1].seq, s1);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let buf = buffer().await;
        buf.buffer("p", "c", &msg(SequenceId::new(1, 0), "room-a"))
            .await
            .unwrap();
        buf.buffer("p", "c", &msg(SequenceId::new(1, 0), "room-b"))
            .await
            .unwrap();
        let got = buf.get_after("p", "c", "room-a", None, 10).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].topic, "room-a");
    }
}
