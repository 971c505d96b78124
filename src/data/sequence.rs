//! Sequence Engine — component A (spec §4.A).
//!
//! Assigns monotonically increasing `SequenceId`s per (project, channel,
//! topic). Relies on the Channel Broker actor's single-threaded invocation
//! discipline (spec §9): `next()` is read-modify-write over the storage
//! backend with no additional locking, which is sound only because a given
//! topic's sequence key is touched by exactly one broker actor at a time.
//! No direct teacher analogue — closest conceptual sibling is the teacher's
//! `SessionClaims::new` building a fresh value from the clock plus a random
//! component, generalized here into a persisted monotonic counter.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng as _;
use thiserror::Error;

use crate::data::cache::{CacheError, StorageBackend};
use crate::model::sequence_key;
use crate::model::SequenceId;

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("storage error: {0}")]
    Storage(#[from] CacheError),
}

pub struct SequenceEngine {
    storage: Arc<dyn StorageBackend>,
}

impl SequenceEngine {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Issue the next `SequenceId` for `(project, channel, topic)`.
    ///
    /// When the wall clock has advanced past the last-issued millisecond, the
    /// new id gets a fresh pseudo-random tail seeded by the topic name (so
    /// two topics racing in the same millisecond don't collide by
    /// construction, though the tail space is wide enough that collision
    /// across topics is immaterial anyway). When two calls land in the same
    /// millisecond, the tail is bumped by one to preserve strict monotonicity
    /// without waiting on the clock.
    pub async fn next(
        &self,
        project: &str,
        channel: &str,
        topic: &str,
    ) -> Result<SequenceId, SequenceError> {
        let key = sequence_key(project, channel, topic);
        let now_millis = current_millis();

        let last = match self.storage.get(&key).await? {
            Some(bytes) => std::str::from_utf8(&bytes)
                .ok()
                .and_then(SequenceId::parse),
            None => None,
        };

        let next = match last {
            Some(last) if now_millis <= last.millis() => {
                SequenceId::new(last.millis(), last.tail().wrapping_add(1))
            }
            _ => SequenceId::new(now_millis, seed_tail(topic)),
        };

        self.storage
            .set(&key, next.to_key().into_bytes(), None)
            .await?;
        Ok(next)
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn seed_tail(topic: &str) -> u64 {
    let mut hasher_seed: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in topic.as_bytes() {
        hasher_seed ^= *byte as u64;
        hasher_seed = hasher_seed.wrapping_mul(0x1000_0000_01b3);
    }
    let random: u64 = rand::thread_rng().gen();
    hasher_seed ^ random
}
