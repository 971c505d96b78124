//! Storage-backed components: pluggable cache/storage backend, Sequence
//! Engine (A), Message Buffer (B), Subscription Registry (C), Global
//! Registry (E).

pub mod buffer;
pub mod cache;
pub mod registry;
pub mod sequence;
pub mod subscriptions;

pub use buffer::{BufferError, MessageBuffer};
pub use registry::{GlobalRegistry, RegistryError};
pub use sequence::{SequenceEngine, SequenceError};
pub use subscriptions::{SubscriptionError, SubscriptionRegistry};
