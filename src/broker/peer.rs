//! Cross-region peer dispatch (spec §4.D, §8 scenario 3).
//!
//! The gateway/HTTP surface is explicitly out of scope (spec §1 Non-goals),
//! so there is no production network transport here — only the trait a real
//! one would implement, plus an in-process stand-in for tests and
//! single-process multi-region simulation. Grounded on the teacher's
//! `TopicBackend` trait (`data/topics/backend.rs`): an async trait abstracting
//! over "however messages actually get to the other side," with a
//! same-process variant and a to-be-supplied networked one.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use super::actor::BrokerCommand;
use crate::model::{DistributedKey, Message};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerDialError {
    #[error("no broker registered for channel '{0}' in region '{1}'")]
    UnknownPeer(String, String),
    #[error("peer broker's command queue is closed")]
    ChannelClosed,
}

/// Delivers a publish to a channel's broker actor in a different region.
/// The production implementation of this trait (gRPC, HTTP, or a message
/// bus) is not part of this crate; only `InProcessPeerDialer` is provided,
/// for tests and for simulating multiple regions inside one process.
#[async_trait]
pub trait PeerDialer: Send + Sync {
    async fn publish_message(
        &self,
        region: &str,
        channel: &DistributedKey,
        message: Message,
    ) -> Result<(), PeerDialError>;
}

/// Routes a publish straight into another simulated region's broker command
/// queue, skipping any wire encoding. A failed or dropped peer delivery is
/// logged and dropped rather than retried (spec §11 open question): cross-
/// region fan-out is best-effort, and retrying a stale peer handle risks
/// duplicate delivery with no dedup mechanism defined by the protocol.
#[derive(Default)]
pub struct InProcessPeerDialer {
    peers: DashMap<(String, DistributedKey), mpsc::Sender<BrokerCommand>>,
}

impl InProcessPeerDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_peer(
        &self,
        region: impl Into<String>,
        channel: DistributedKey,
        handle: mpsc::Sender<BrokerCommand>,
    ) {
        self.peers.insert((region.into(), channel), handle);
    }
}

#[async_trait]
impl PeerDialer for InProcessPeerDialer {
    async fn publish_message(
        &self,
        region: &str,
        channel: &DistributedKey,
        message: Message,
    ) -> Result<(), PeerDialError> {
        let handle = self
            .peers
            .get(&(region.to_string(), channel.clone()))
            .map(|h| h.clone())
            .ok_or_else(|| PeerDialError::UnknownPeer(channel.as_str().to_string(), region.to_string()))?;

        handle
            .send(BrokerCommand::ReceivePeerPublish { message })
            .await
            .map_err(|_| PeerDialError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_peer_is_reported_not_silently_dropped() {
        let dialer = InProcessPeerDialer::new();
        let channel = DistributedKey::channel("p", "room");
        let message = Message::new(crate::model::SequenceId::new(1, 0), "room", "s", "hi");
        let err = dialer.publish_message("eu-west", &channel, message).await.unwrap_err();
        assert_eq!(
            err,
            PeerDialError::UnknownPeer(channel.as_str().to_string(), "eu-west".to_string())
        );
    }
}
