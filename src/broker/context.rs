//! `BrokerContext` — the composition root for a single Channel Broker actor
//! (spec §9 design notes).
//!
//! The original design's component graph (Sequence Engine, Message Buffer,
//! Subscription Registry, Broadcaster, Shard Table, peer dialer) is wired
//! together as one plain value type passed into the actor rather than built
//! through inheritance, matching the teacher's composition-root style in
//! `core::app::CoreApp` (`app.rs`): one struct holding `Arc`s to every shared
//! service, cheap to clone, handed to whatever needs it.

use std::sync::Arc;

use crate::broker::broadcaster::Broadcaster;
use crate::broker::peer::PeerDialer;
use crate::broker::presence::PresenceSender;
use crate::broker::shard_table::ShardTable;
use crate::broker::usage::UsageQueue;
use crate::data::buffer::MessageBuffer;
use crate::data::sequence::SequenceEngine;
use crate::data::subscriptions::SubscriptionRegistry;

#[derive(Clone)]
pub struct BrokerContext {
    pub project: String,
    pub channel: String,
    pub region: String,
    pub sequence: Arc<SequenceEngine>,
    pub buffer: Arc<MessageBuffer>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub shard_table: Arc<ShardTable>,
    pub peer_dialer: Arc<dyn PeerDialer>,
    pub presence_tx: PresenceSender,
    pub usage: Arc<UsageQueue>,
}
