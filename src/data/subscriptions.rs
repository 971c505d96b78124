//! Subscription Registry — component C (spec §3, §4.C).
//!
//! Tracks which clients are subscribed to which topic within a single
//! broker, and each client's last-seen `SequenceId` cursor for catch-up.
//! Grounded on the teacher's `data/topics/mod.rs` `TopicService`, which
//! keeps an in-process `DashMap<String, DashSet<...>>` of subscribers per
//! topic rather than going through the storage backend — subscription
//! membership here is this broker's live connection state, not durable
//! data, so it stays in memory even when the storage backend is Redis.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use thiserror::Error;

use crate::core::constants::MAX_SUBSCRIBERS_PER_TOPIC;
use crate::data::cache::{CacheError, StorageBackend};
use crate::model::{last_seen_key, SequenceId, WILDCARD_TOPIC};

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("topic '{0}' is at capacity ({1} subscribers)")]
    AtCapacity(String, usize),
    #[error("storage error: {0}")]
    Storage(#[from] CacheError),
}

pub struct SubscriptionRegistry {
    storage: Arc<dyn StorageBackend>,
    max_per_topic: usize,
    subscribers: DashMap<String, DashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>, max_per_topic: usize) -> Self {
        Self {
            storage,
            max_per_topic,
            subscribers: DashMap::new(),
        }
    }

    pub fn with_defaults(storage: Arc<dyn StorageBackend>) -> Self {
        Self::new(storage, MAX_SUBSCRIBERS_PER_TOPIC)
    }

    /// Subscribe `client_id` to `topic`. Rejected once the topic is at
    /// `max_per_topic` (spec §4.C capacity invariant), unless the client is
    /// already subscribed (idempotent re-subscribe never counts against
    /// capacity twice).
    pub fn subscribe(&self, topic: &str, client_id: &str) -> Result<(), SubscriptionError> {
        let set = self.subscribers.entry(topic.to_string()).or_default();
        if set.contains(client_id) {
            return Ok(());
        }
        if set.len() >= self.max_per_topic {
            return Err(SubscriptionError::AtCapacity(topic.to_string(), self.max_per_topic));
        }
        set.insert(client_id.to_string());
        Ok(())
    }

    pub fn unsubscribe(&self, topic: &str, client_id: &str) {
        if let Some(set) = self.subscribers.get(topic) {
            set.remove(client_id);
        }
    }

    /// Remove `client_id` from every topic it was subscribed to (connection
    /// close, spec §5), returning the topics it was actually subscribed to
    /// so the caller can broadcast presence(offline) for each.
    pub fn remove_client(&self, client_id: &str) -> Vec<String> {
        let mut removed = Vec::new();
        for set in self.subscribers.iter() {
            if set.remove(client_id).is_some() {
                removed.push(set.key().clone());
            }
        }
        removed
    }

    /// Every client subscribed to `topic` directly, plus every client
    /// holding a `"*"` wildcard subscription (spec §3: a wildcard
    /// subscriber is a recipient of every topic).
    pub fn subscribers_of(&self, topic: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .subscribers
            .get(topic)
            .map(|set| set.iter().map(|c| c.clone()).collect())
            .unwrap_or_default();

        if topic != WILDCARD_TOPIC
            && let Some(wildcard) = self.subscribers.get(WILDCARD_TOPIC)
        {
            for client_id in wildcard.iter() {
                if !out.contains(&*client_id) {
                    out.push(client_id.clone());
                }
            }
        }
        out
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.get(topic).map(|s| s.len()).unwrap_or(0)
    }

    /// True if `client_id` is subscribed to `topic` directly or holds a
    /// `"*"` wildcard subscription (spec §4.C: "true if in the topic set
    /// or in the `\"*\"` set").
    pub fn is_subscribed(&self, topic: &str, client_id: &str) -> bool {
        let direct = self
            .subscribers
            .get(topic)
            .map(|set| set.contains(client_id))
            .unwrap_or(false);
        if direct || topic == WILDCARD_TOPIC {
            return direct;
        }
        self.subscribers
            .get(WILDCARD_TOPIC)
            .map(|set| set.contains(client_id))
            .unwrap_or(false)
    }

    /// Persist `client_id`'s last-seen cursor on `topic` (spec §3 invariant:
    /// last-seen is monotonically non-decreasing).
    pub async fn record_last_seen(
        &self,
        project: &str,
        channel: &str,
        topic: &str,
        client_id: &str,
        seq: SequenceId,
    ) -> Result<(), SubscriptionError> {
        let key = last_seen_key(project, channel, topic, client_id);
        let current = self.last_seen(project, channel, topic, client_id).await?;
        if current.is_some_and(|c| c >= seq) {
            return Ok(());
        }
        self.storage.set(&key, seq.to_key().into_bytes(), None).await?;
        Ok(())
    }

    pub async fn last_seen(
        &self,
        project: &str,
        channel: &str,
        topic: &str,
        client_id: &str,
    ) -> Result<Option<SequenceId>, SubscriptionError> {
        let key = last_seen_key(project, channel, topic, client_id);
        Ok(self
            .storage
            .get(&key)
            .await?
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .and_then(|s| SequenceId::parse(&s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::cache::build_backend;

    async fn registry() -> SubscriptionRegistry {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        SubscriptionRegistry::with_defaults(storage)
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_round_trip() {
        let reg = registry().await;
        reg.subscribe("room", "client1").unwrap();
        assert!(reg.is_subscribed("room", "client1"));
        reg.unsubscribe("room", "client1");
        assert!(!reg.is_subscribed("room", "client1"));
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_idempotent() {
        let reg = registry().await;
        reg.subscribe("room", "client1").unwrap();
        reg.subscribe("room", "client1").unwrap();
        assert_eq!(reg.subscriber_count("room"), 1);
    }

    #[tokio::test]
    async fn capacity_is_enforced() {
        let reg = SubscriptionRegistry::new(
            build_backend(&CacheConfig::default()).await.unwrap(),
            2,
        );
        reg.subscribe("room", "c1").unwrap();
        reg.subscribe("room", "c2").unwrap();
        assert!(reg.subscribe("room", "c3").is_err());
    }

    #[tokio::test]
    async fn remove_client_clears_all_topics() {
        let reg = registry().await;
        reg.subscribe("room-a", "client1").unwrap();
        reg.subscribe("room-b", "client1").unwrap();
        reg.remove_client("client1");
        assert!(!reg.is_subscribed("room-a", "client1"));
        assert!(!reg.is_subscribed("room-b", "client1"));
    }

    #[tokio::test]
    async fn wildcard_subscriber_is_subscribed_to_any_topic() {
        let reg = registry().await;
        reg.subscribe(WILDCARD_TOPIC, "client1").unwrap();
        assert!(reg.is_subscribed("room-a", "client1"));
        assert!(reg.is_subscribed("room-b", "client1"));
        assert!(!reg.is_subscribed("room-a", "client2"));
    }

    #[tokio::test]
    async fn subscribers_of_includes_wildcard_subscribers() {
        let reg = registry().await;
        reg.subscribe("room", "direct").unwrap();
        reg.subscribe(WILDCARD_TOPIC, "wildcard").unwrap();
        let mut subs = reg.subscribers_of("room");
        subs.sort();
        assert_eq!(subs, vec!["direct".to_string(), "wildcard".to_string()]);
    }

    #[tokio::test]
    async fn subscribers_of_does_not_duplicate_a_client_subscribed_both_ways() {
        let reg = registry().await;
        reg.subscribe("room", "client1").unwrap();
        reg.subscribe(WILDCARD_TOPIC, "client1").unwrap();
        assert_eq!(reg.subscribers_of("room"), vec!["client1".to_string()]);
    }

    #[tokio::test]
    async fn last_seen_is_monotonic() {
        let reg = registry().await;
        let s1 = SequenceId::new(1, 0);
        let s2 = SequenceId::new(2, 0);
        reg.record_last_seen("p", "c", "room", "client1", s2).await.unwrap();
        reg.record_last_seen("p", "c", "room", "client1", s1).await.unwrap();
        assert_eq!(reg.last_seen("p", "c", "room", "client1").await.unwrap(), Some(s2));
    }
}
