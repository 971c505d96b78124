//! Global Registry — component E (spec §4.E).
//!
//! Cross-region bookkeeping of which regions currently host a broker for a
//! given logical channel, backed by the storage layer's set primitives
//! (`sadd`/`sismember`/`smembers`) so every region's registry entry is
//! visible to every other region when the storage backend is Redis. Reads
//! and writes go straight through the `StorageBackend` trait — no
//! in-process cache layer — since this registry's whole point is being the
//! one source of truth peers can't get from their own local state.

use std::sync::Arc;

use thiserror::Error;

use crate::data::cache::{CacheError, StorageBackend};
use crate::model::DistributedKey;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("storage error: {0}")]
    Storage(#[from] CacheError),
}

fn registry_key(channel: &DistributedKey) -> String {
    format!("registry:{}", channel.as_str())
}

fn project_key(project: &str) -> String {
    format!("registry:project:{project}")
}

pub struct GlobalRegistry {
    storage: Arc<dyn StorageBackend>,
}

impl GlobalRegistry {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Announce that `region` hosts a broker for `channel` (spec §4.E:
    /// `sadd`). Idempotent — re-announcing an already-registered region is a
    /// no-op at the storage layer.
    pub async fn register(&self, channel: &DistributedKey, region: &str) -> Result<(), RegistryError> {
        let key = registry_key(channel);
        self.storage.sadd(&key, region).await?;
        Ok(())
    }

    pub async fn deregister(&self, channel: &DistributedKey, region: &str) -> Result<(), RegistryError> {
        let key = registry_key(channel);
        self.storage.srem(&key, region).await?;
        Ok(())
    }

    pub async fn is_registered(&self, channel: &DistributedKey, region: &str) -> Result<bool, RegistryError> {
        let key = registry_key(channel);
        Ok(self.storage.sismember(&key, region).await?)
    }

    /// Every region currently hosting a broker for `channel`, for the
    /// Shard Table to fan a publish out to (spec §4.D).
    pub async fn regions_for(&self, channel: &DistributedKey) -> Result<Vec<String>, RegistryError> {
        let key = registry_key(channel);
        Ok(self.storage.smembers(&key).await?)
    }

    /// Add `channel` to `project`'s set of known channel keys (spec §6:
    /// "Registry keys: `<projectId>` (set of channel keys)"), so admin
    /// pause/resume can enumerate every channel under a project.
    pub async fn register_channel_for_project(
        &self,
        project: &str,
        channel: &DistributedKey,
    ) -> Result<(), RegistryError> {
        let key = project_key(project);
        self.storage.sadd(&key, channel.channel_key().as_str()).await?;
        Ok(())
    }

    /// Every logical channel key ever registered under `project`. Entries
    /// that fail to parse back into a `DistributedKey` (shouldn't happen —
    /// this registry is the only writer) are skipped rather than failing
    /// the whole lookup.
    pub async fn channels_for_project(&self, project: &str) -> Result<Vec<DistributedKey>, RegistryError> {
        let key = project_key(project);
        let members = self.storage.smembers(&key).await?;
        Ok(members.iter().filter_map(|m| DistributedKey::parse(m).ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::cache::build_backend;

    async fn registry() -> GlobalRegistry {
        let storage = build_backend(&CacheConfig::default()).await.unwrap();
        GlobalRegistry::new(storage)
    }

    #[tokio::test]
    async fn register_and_lookup_round_trip() {
        let reg = registry().await;
        let key = DistributedKey::channel("p", "room");
        reg.register(&key, "us-east").await.unwrap();
        reg.register(&key, "eu-west").await.unwrap();

        assert!(reg.is_registered(&key, "us-east").await.unwrap());
        let mut regions = reg.regions_for(&key).await.unwrap();
        regions.sort();
        assert_eq!(regions, vec!["eu-west".to_string(), "us-east".to_string()]);
    }

    #[tokio::test]
    async fn deregister_removes_region() {
        let reg = registry().await;
        let key = DistributedKey::channel("p", "room");
        reg.register(&key, "us-east").await.unwrap();
        reg.deregister(&key, "us-east").await.unwrap();
        assert!(!reg.is_registered(&key, "us-east").await.unwrap());
    }

    #[tokio::test]
    async fn distinct_channels_have_independent_registries() {
        let reg = registry().await;
        let a = DistributedKey::channel("p", "room-a");
        let b = DistributedKey::channel("p", "room-b");
        reg.register(&a, "us-east").await.unwrap();
        assert!(reg.regions_for(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn project_index_tracks_channels_under_a_project() {
        let reg = registry().await;
        let a = DistributedKey::channel("proj-1", "room-a");
        let b = DistributedKey::channel("proj-1", "room-b");
        let other = DistributedKey::channel("proj-2", "room-c");

        reg.register_channel_for_project("proj-1", &a).await.unwrap();
        reg.register_channel_for_project("proj-1", &b).await.unwrap();
        reg.register_channel_for_project("proj-2", &other).await.unwrap();

        let mut channels = reg.channels_for_project("proj-1").await.unwrap();
        channels.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(channels, vec![a, b]);
        assert_eq!(reg.channels_for_project("proj-3").await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn project_index_stores_logical_keys_even_for_region_qualified_input() {
        let reg = registry().await;
        let regional = DistributedKey::channel_in_region("proj-1", "room-a", "us-east");
        reg.register_channel_for_project("proj-1", &regional).await.unwrap();

        let channels = reg.channels_for_project("proj-1").await.unwrap();
        assert_eq!(channels, vec![DistributedKey::channel("proj-1", "room-a")]);
    }
}
