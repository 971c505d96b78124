//! Domain value types shared across the broker: identities, grants,
//! messages and the wire packet shapes. Pure data — no I/O, no storage
//! backend references — mirroring the teacher's `domain`/`api::types` split.

pub mod distributed_key;
pub mod error;
pub mod grant;
pub mod message;
pub mod packet;
pub mod sequence_id;
pub mod subscription;

pub use distributed_key::{DistributedKey, ResourceType};
pub use error::ModelError;
pub use grant::{Grant, Scope, TopicGrant, WILDCARD_TOPIC};
pub use message::Message;
pub use packet::{
    AckOutcome, AckPacket, AckPath, AckResult, AckSuccess, ClientPacket, ErrorCode,
    PresencePacket, PresenceStatus, ServerPacket, SubscriptionStatus,
};
pub use sequence_id::SequenceId;
pub use subscription::{last_seen_key, message_key, message_key_prefix, sequence_key, subscription_key};
