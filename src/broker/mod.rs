//! Broker-side components: Shard Table (D), Broadcaster (G), the Channel
//! Broker actor (H), and the supporting composition root, presence channel,
//! peer dispatch, and usage metering.

pub mod actor;
pub mod broadcaster;
pub mod context;
pub mod peer;
pub mod presence;
pub mod shard_table;
pub mod usage;

pub use actor::{BrokerCommand, ChannelBroker};
pub use broadcaster::{Broadcaster, BroadcastReport, ClientSink, Recipient};
pub use context::BrokerContext;
pub use peer::{InProcessPeerDialer, PeerDialError, PeerDialer};
pub use presence::{PresenceEvent, PresenceReceiver, PresenceSender};
pub use shard_table::{BrokerHandle, ShardTable};
pub use usage::{UsageEvent, UsageEventType, UsageQueue};
