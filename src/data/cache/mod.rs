//! Pluggable storage: in-memory (default) or Redis, selected by
//! `core::config::CacheConfig`. Grounded on the teacher's `data::cache`
//! module (`CacheService` wrapping `Arc<dyn CacheBackend>`).

mod backend;
mod error;
mod memory;
mod redis;

use std::sync::Arc;

pub use backend::StorageBackend;
pub use error::CacheError;

use crate::core::config::{CacheBackendType, CacheConfig};
use memory::InMemoryStorage;
use redis::RedisStorage;

pub async fn build_backend(config: &CacheConfig) -> Result<Arc<dyn StorageBackend>, CacheError> {
    match config.backend {
        CacheBackendType::Memory => {
            tracing::debug!("initializing in-memory storage backend");
            Ok(Arc::new(InMemoryStorage::default()))
        }
        CacheBackendType::Redis => {
            let url = config
                .redis_url
                .as_ref()
                .ok_or_else(|| CacheError::Config("redis_url required for redis backend".into()))?;
            Ok(Arc::new(RedisStorage::new(url).await?))
        }
    }
}
