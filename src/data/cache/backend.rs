//! Storage backend trait.
//!
//! Grounded on the teacher's `CacheBackend` (`data/cache/backend.rs`): one
//! trait, two implementations (in-memory / Redis), `async_trait` object-safe
//! so the rest of the broker holds an `Arc<dyn StorageBackend>` and never
//! cares which one it got. Extended past the teacher's key/value-only shape
//! with prefix scans (Message Buffer's `getAfter`/prune, spec §4.B) and set
//! operations (Global Registry's `sadd`/`sismember`/`smembers`, spec §4.E) —
//! both components need primitives the teacher's cache never did.

use async_trait::async_trait;

use super::error::CacheError;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: Option<u64>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// All live (key, value) pairs whose key starts with `prefix`, ordered
    /// lexicographically by key. Used by the Message Buffer for `getAfter`
    /// range scans and opportunistic pruning.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, CacheError>;

    /// Add `member` to the set at `key`. Returns `true` if it was newly added.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn srem(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, CacheError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, CacheError>;

    async fn health_check(&self) -> Result<(), CacheError>;

    fn backend_name(&self) -> &'static str;
}
