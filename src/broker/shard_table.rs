//! Shard Table — component D (spec §4.D).
//!
//! Maps a logical channel (`DistributedKey` without a region) to the set of
//! regions currently hosting a broker for it, and to this process's local
//! handle for that channel if it hosts one itself. Grounded on the
//! teacher's `TopicService` topic map (`data/topics/mod.rs`): a
//! `DashMap`-backed registry of live, in-process handles keyed by name,
//! generalized here to also track which *other* regions hold a shard via
//! the Global Registry rather than only tracking local state.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::data::registry::{GlobalRegistry, RegistryError};
use crate::model::DistributedKey;

/// Inbound command queue for one channel's broker actor.
pub type BrokerHandle = mpsc::Sender<super::actor::BrokerCommand>;

/// Tracks this process's locally-hosted broker actors and fans out to the
/// Global Registry for cross-region discovery.
pub struct ShardTable {
    local: DashMap<DistributedKey, BrokerHandle>,
    registry: Arc<GlobalRegistry>,
    region: String,
}

impl ShardTable {
    pub fn new(registry: Arc<GlobalRegistry>, region: impl Into<String>) -> Self {
        Self {
            local: DashMap::new(),
            registry,
            region: region.into(),
        }
    }

    /// Register a locally-hosted broker actor for `channel`, announcing this
    /// region to the Global Registry so peers can find it, and recording the
    /// channel under its project's index (spec §6) for admin pause/resume.
    pub async fn host(&self, channel: &DistributedKey, handle: BrokerHandle) -> Result<(), RegistryError> {
        self.local.insert(channel.clone(), handle);
        self.registry.register(channel, &self.region).await?;
        self.registry
            .register_channel_for_project(channel.project(), channel)
            .await
    }

    /// Every logical channel ever hosted under `project`, for the admin
    /// pause/resume route (spec §4.G′) to enumerate.
    pub async fn channels_for_project(&self, project: &str) -> Result<Vec<DistributedKey>, RegistryError> {
        self.registry.channels_for_project(project).await
    }

    pub async fn unhost(&self, channel: &DistributedKey) -> Result<(), RegistryError> {
        self.local.remove(channel);
        self.registry.deregister(channel, &self.region).await
    }

    pub fn local_handle(&self, channel: &DistributedKey) -> Option<BrokerHandle> {
        self.local.get(channel).map(|h| h.clone())
    }

    pub fn is_local(&self, channel: &DistributedKey) -> bool {
        self.local.contains_key(channel)
    }

    /// Every region other than this one currently hosting `channel`, for
    /// fanning a publish out over `PeerDialer` (spec §4.D cross-region
    /// fan-out, with self-exclusion per spec §8 invariant).
    pub async fn peer_regions(&self, channel: &DistributedKey) -> Result<Vec<String>, RegistryError> {
        let all = self.registry.regions_for(channel).await?;
        Ok(all.into_iter().filter(|r| r != &self.region).collect())
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::cache::build_backend;

    async fn table(region: &str) -> ShardTable {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        let registry = Arc::new(GlobalRegistry::new(storage));
        ShardTable::new(registry, region)
    }

    #[tokio::test]
    async fn hosting_announces_region_and_excludes_self_from_peers() {
        let t = table("us-east").await;
        let key = DistributedKey::channel("p", "room");
        let (tx, _rx) = mpsc::channel(1);
        t.host(&key, tx).await.unwrap();

        assert!(t.is_local(&key));
        assert!(t.peer_regions(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn peer_regions_excludes_self_even_when_multiple_regions_host() {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        let registry = Arc::new(GlobalRegistry::new(storage));
        let key = DistributedKey::channel("p", "room");
        registry.register(&key, "us-east").await.unwrap();
        registry.register(&key, "eu-west").await.unwrap();

        let t = ShardTable::new(registry, "us-east");
        let peers = t.peer_regions(&key).await.unwrap();
        assert_eq!(peers, vec!["eu-west".to_string()]);
    }

    #[tokio::test]
    async fn hosting_populates_the_project_index() {
        let t = table("us-east").await;
        let key = DistributedKey::channel("proj-1", "room");
        let (tx, _rx) = mpsc::channel(1);
        t.host(&key, tx).await.unwrap();

        let channels = t.channels_for_project("proj-1").await.unwrap();
        assert_eq!(channels, vec![key]);
    }

    #[tokio::test]
    async fn unhost_removes_local_handle_and_registry_entry() {
        let t = table("us-east").await;
        let key = DistributedKey::channel("p", "room");
        let (tx, _rx) = mpsc::channel(1);
        t.host(&key, tx).await.unwrap();
        t.unhost(&key).await.unwrap();
        assert!(!t.is_local(&key));
    }
}
