//! Presence events (spec §4.G, §9 design notes).
//!
//! The teacher's `TopicService`/`Subscriber` relationship is one-directional
//! (publisher → topic → subscribers); this broker instead needs the
//! Subscription Registry to *notify* the broker actor when membership
//! changes, which would otherwise require a `Broker` ↔ `SubscriptionRegistry`
//! cyclic reference. A plain `tokio::sync::mpsc` channel of presence events
//! breaks that cycle: the registry only ever sends, the actor only ever
//! receives, grounded on the same unidirectional-channel shape the teacher
//! uses for its topic dispatcher queues.

use tokio::sync::mpsc;

use crate::model::PresenceStatus;

#[derive(Debug, Clone)]
pub struct PresenceEvent {
    pub topic: String,
    pub client_id: String,
    pub status: PresenceStatus,
}

pub type PresenceSender = mpsc::Sender<PresenceEvent>;
pub type PresenceReceiver = mpsc::Receiver<PresenceEvent>;

pub fn channel(capacity: usize) -> (PresenceSender, PresenceReceiver) {
    mpsc::channel(capacity)
}
