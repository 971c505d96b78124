//! In-memory storage backend, using moka for TTL'd values and dashmap for
//! sets. Grounded on the teacher's `InMemoryCache` (`data/cache/memory.rs`),
//! trimmed of its rate-limiting counter machinery (out of scope here, spec
//! §11) and extended with a `DashMap<String, DashSet<String>>` for the
//! Global Registry's set semantics.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use moka::Expiry;
use moka::future::Cache;
use std::time::Instant;

use super::backend::StorageBackend;
use super::error::CacheError;

#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    ttl: Option<Duration>,
}

struct VariableTtlExpiry;

impl Expiry<String, Entry> for VariableTtlExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

pub struct InMemoryStorage {
    cache: Cache<String, Entry>,
    sets: DashMap<String, DashSet<String>>,
}

impl InMemoryStorage {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(VariableTtlExpiry)
            .build();
        Self {
            cache,
            sets: DashMap::new(),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.cache.get(key).await.map(|e| e.data))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), CacheError> {
        let entry = Entry {
            data: value,
            ttl: ttl_secs.map(Duration::from_secs),
        };
        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.cache.contains_key(key);
        self.cache.invalidate(key).await;
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.cache.contains_key(key))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, CacheError> {
        let mut out: Vec<(String, Vec<u8>)> = self
            .cache
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ((*k).clone(), v.data.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        let set = self.sets.entry(key.to_string()).or_default();
        Ok(set.insert(member.to_string()))
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        match self.sets.get(key) {
            Some(set) => Ok(set.remove(member).is_some()),
            None => Ok(false),
        }
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError> {
        match self.sets.get(key) {
            Some(set) => Ok(set.contains(member)),
            None => Ok(false),
        }
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError> {
        match self.sets.get(key) {
            Some(set) => Ok(set.iter().map(|m| m.clone()).collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
