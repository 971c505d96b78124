//! Channel Broker — component H (spec §4.H, §5, §9).
//!
//! One actor per (project, channel), processing commands off a single
//! `mpsc` queue so all its state (subscriptions, grants, sequence
//! assignment) is touched by exactly one task at a time — suspension only
//! happens at the explicit await points the spec calls out (storage I/O,
//! peer RPC, socket writes, the inter-batch yield in the broadcaster).
//! Grounded on the teacher's dispatcher task in `data/topics/mod.rs`
//! (`start_dispatcher`): a `tokio::spawn`ed loop draining one `mpsc::Receiver`
//! until the channel closes, generalized from "forward to a broadcast
//! channel" into the full publish/subscribe state machine this spec defines.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::broadcaster::{ClientSink, Recipient};
use super::context::BrokerContext;
use super::presence::PresenceEvent;
use super::usage::{UsageEvent, UsageEventType};
use crate::core::constants::GET_AFTER_MAX_LIMIT;
use crate::model::{AckPath, ErrorCode, Grant, Message, PresenceStatus, SubscriptionStatus};
use crate::wire::codec::encode_server_packet;

pub enum BrokerCommand {
    Connect {
        client_id: String,
        grant: Grant,
        sink: Arc<dyn ClientSink>,
    },
    Disconnect {
        client_id: String,
    },
    Subscribe {
        client_id: String,
        topic: String,
        client_msg_id: Option<String>,
    },
    Unsubscribe {
        client_id: String,
        topic: String,
        client_msg_id: Option<String>,
    },
    Publish {
        client_id: String,
        topic: String,
        payload: String,
        ack: bool,
        client_msg_id: String,
        client_publish_ts: Option<chrono::DateTime<Utc>>,
    },
    ReceivePeerPublish {
        message: Message,
    },
    Pause,
    Resume,
}

struct ConnectedClient {
    grant: Grant,
    sink: Arc<dyn ClientSink>,
}

/// Owns all mutable state for one channel: per-client grants/sinks, plus the
/// shared storage-backed components via `BrokerContext`. Runs on a single
/// task (`run`); every public method below is only ever called from that
/// task's own loop, never concurrently.
pub struct ChannelBroker {
    ctx: BrokerContext,
    clients: HashMap<String, ConnectedClient>,
    /// Set by admin pause/resume (spec §4.H): while `true`, `publish` is
    /// rejected with FORBIDDEN but connect/subscribe/unsubscribe keep working.
    paused: bool,
}

impl ChannelBroker {
    pub fn new(ctx: BrokerContext) -> Self {
        Self {
            ctx,
            clients: HashMap::new(),
            paused: false,
        }
    }

    /// Drain both the command queue and this channel's own presence-event
    /// feed (spec §9 design notes: a channel subscribed to its own presence
    /// events rather than a cyclic `Broker` ↔ `SubscriptionRegistry`
    /// reference). Presence fan-out shares the command loop rather than a
    /// separate task so a presence broadcast and a publish broadcast to the
    /// same topic never race each other.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<BrokerCommand>,
        mut presence: super::presence::PresenceReceiver,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command).await,
                        None => break,
                    }
                }
                event = presence.recv() => {
                    match event {
                        Some(event) => self.broadcast_presence(event).await,
                        None => break,
                    }
                }
            }
        }
        debug!(channel = %self.ctx.channel, "channel broker shut down");
    }

    /// The subscribing/unsubscribing client gets an enriched packet
    /// carrying the current subscriber list; every other subscriber of the
    /// topic gets the base packet with no list (spec §4.G).
    async fn broadcast_presence(&self, event: PresenceEvent) {
        let subscribers = self.ctx.subscriptions.subscribers_of(&event.topic);

        let enriched = crate::model::ServerPacket::Presence(super::broadcaster::Broadcaster::presence_packet(
            &event.client_id,
            &event.topic,
            event.status,
            Some(subscribers.clone()),
        ));
        self.reply(&event.client_id, &enriched).await;

        let base = crate::model::ServerPacket::Presence(super::broadcaster::Broadcaster::presence_packet(
            &event.client_id,
            &event.topic,
            event.status,
            None,
        ));
        let Ok(text) = encode_server_packet(&base) else {
            return;
        };
        for client_id in subscribers {
            if client_id == event.client_id {
                continue;
            }
            if let Some(client) = self.clients.get(&client_id)
                && let Err(err) = client.sink.send_text(text.clone()).await
            {
                warn!(client_id, error = %err, "failed to deliver presence packet");
            }
        }
    }

    async fn handle(&mut self, command: BrokerCommand) {
        match command {
            BrokerCommand::Connect { client_id, grant, sink } => {
                self.ctx.usage.push(UsageEvent {
                    project: self.ctx.project.clone(),
                    channel: self.ctx.channel.clone(),
                    topic: None,
                    key_id: grant.key_id.clone(),
                    event_type: UsageEventType::Connect,
                    bytes: 0,
                });
                self.clients.insert(client_id, ConnectedClient { grant, sink });
            }
            BrokerCommand::Disconnect { client_id } => self.handle_disconnect(client_id).await,
            BrokerCommand::Subscribe {
                client_id,
                topic,
                client_msg_id,
            } => self.handle_subscribe(client_id, topic, client_msg_id).await,
            BrokerCommand::Unsubscribe {
                client_id,
                topic,
                client_msg_id,
            } => self.handle_unsubscribe(client_id, topic, client_msg_id).await,
            BrokerCommand::Publish {
                client_id,
                topic,
                payload,
                ack,
                client_msg_id,
                client_publish_ts,
            } => {
                self.handle_publish(client_id, topic, payload, ack, client_msg_id, client_publish_ts)
                    .await
            }
            BrokerCommand::ReceivePeerPublish { message } => self.handle_peer_publish(message).await,
            BrokerCommand::Pause => {
                self.paused = true;
                debug!(channel = %self.ctx.channel, "channel broker paused");
            }
            BrokerCommand::Resume => {
                self.paused = false;
                debug!(channel = %self.ctx.channel, "channel broker resumed");
            }
        }
    }

    /// Bulk-unsubscribe from every topic the client's grant declares and
    /// broadcast presence(offline) for each (spec §4.H close behavior).
    async fn handle_disconnect(&mut self, client_id: String) {
        if self.clients.remove(&client_id).is_none() {
            return;
        }
        for topic in self.ctx.subscriptions.remove_client(&client_id) {
            let _ = self
                .ctx
                .presence_tx
                .send(PresenceEvent {
                    topic,
                    client_id: client_id.clone(),
                    status: PresenceStatus::Offline,
                })
                .await;
        }
    }

    async fn reply(&self, client_id: &str, packet: &crate::model::ServerPacket) {
        let Some(client) = self.clients.get(client_id) else {
            return;
        };
        match encode_server_packet(packet) {
            Ok(text) => {
                if let Err(err) = client.sink.send_text(text).await {
                    warn!(client_id, error = %err, "failed to deliver packet to client");
                }
            }
            Err(err) => warn!(client_id, error = %err, "failed to encode packet"),
        }
    }

    async fn handle_subscribe(&mut self, client_id: String, topic: String, client_msg_id: Option<String>) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };

        if !client.grant.can_read(&topic) && !client.grant.is_info_only(&topic) {
            let packet = super::broadcaster::Broadcaster::error_ack(
                client_msg_id,
                AckPath::Subscribe,
                &topic,
                ErrorCode::Forbidden,
                "grant does not permit reading this topic",
            );
            self.reply(&client_id, &packet).await;
            return;
        }

        if let Err(err) = self.ctx.subscriptions.subscribe(&topic, &client_id) {
            let packet = super::broadcaster::Broadcaster::error_ack(
                client_msg_id,
                AckPath::Subscribe,
                &topic,
                ErrorCode::RateLimited,
                err.to_string(),
            );
            self.reply(&client_id, &packet).await;
            return;
        }

        let key_id = client.grant.key_id.clone();
        self.ctx.usage.push(UsageEvent {
            project: self.ctx.project.clone(),
            channel: self.ctx.channel.clone(),
            topic: Some(topic.clone()),
            key_id,
            event_type: UsageEventType::Subscribe,
            bytes: 0,
        });

        let _ = self
            .ctx
            .presence_tx
            .send(PresenceEvent {
                topic: topic.clone(),
                client_id: client_id.clone(),
                status: PresenceStatus::Online,
            })
            .await;

        let packet = super::broadcaster::Broadcaster::subscription_ack(
            client_msg_id,
            AckPath::Subscribe,
            &topic,
            SubscriptionStatus::Subscribed,
        );
        self.reply(&client_id, &packet).await;

        self.deliver_catch_up(&client_id, &topic).await;
    }

    async fn deliver_catch_up(&self, client_id: &str, topic: &str) {
        let info_only = self
            .clients
            .get(client_id)
            .map(|c| c.grant.is_info_only(topic))
            .unwrap_or(false);

        let last_seen = self
            .ctx
            .subscriptions
            .last_seen(&self.ctx.project, &self.ctx.channel, topic, client_id)
            .await
            .unwrap_or(None);

        let Ok(backlog) = self
            .ctx
            .buffer
            .get_after(&self.ctx.project, &self.ctx.channel, topic, last_seen, GET_AFTER_MAX_LIMIT)
            .await
        else {
            return;
        };

        let mut newest = last_seen;
        for message in &backlog {
            let to_send = if info_only { message.informational() } else { message.clone() };
            let packet = crate::model::ServerPacket::Publish(to_send);
            self.reply(client_id, &packet).await;
            newest = Some(newest.map_or(message.seq, |n| n.max(message.seq)));
        }

        if let Some(seq) = newest {
            let _ = self
                .ctx
                .subscriptions
                .record_last_seen(&self.ctx.project, &self.ctx.channel, topic, client_id, seq)
                .await;
        }
    }

    async fn handle_unsubscribe(&mut self, client_id: String, topic: String, client_msg_id: Option<String>) {
        self.ctx.subscriptions.unsubscribe(&topic, &client_id);

        let _ = self
            .ctx
            .presence_tx
            .send(PresenceEvent {
                topic: topic.clone(),
                client_id: client_id.clone(),
                status: PresenceStatus::Offline,
            })
            .await;

        let packet = super::broadcaster::Broadcaster::subscription_ack(
            client_msg_id,
            AckPath::Unsubscribe,
            &topic,
            SubscriptionStatus::Unsubscribed,
        );
        self.reply(&client_id, &packet).await;
    }

    async fn handle_publish(
        &mut self,
        client_id: String,
        topic: String,
        payload: String,
        ack: bool,
        client_msg_id: String,
        client_publish_ts: Option<chrono::DateTime<Utc>>,
    ) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };

        if self.paused {
            if ack {
                let packet = super::broadcaster::Broadcaster::error_ack(
                    Some(client_msg_id),
                    AckPath::Publish,
                    &topic,
                    ErrorCode::Forbidden,
                    "channel is paused",
                );
                self.reply(&client_id, &packet).await;
            }
            return;
        }

        if !client.grant.can_write(&topic) {
            if ack {
                let packet = super::broadcaster::Broadcaster::error_ack(
                    Some(client_msg_id),
                    AckPath::Publish,
                    &topic,
                    ErrorCode::Forbidden,
                    "grant does not permit writing this topic",
                );
                self.reply(&client_id, &packet).await;
            }
            return;
        }

        if !self.ctx.subscriptions.is_subscribed(&topic, &client_id) {
            if ack {
                let packet = super::broadcaster::Broadcaster::error_ack(
                    Some(client_msg_id),
                    AckPath::Publish,
                    &topic,
                    ErrorCode::Forbidden,
                    "publish requires an active subscription to the topic",
                );
                self.reply(&client_id, &packet).await;
            }
            return;
        }

        let key_id = client.grant.key_id.clone();

        let seq = match self.ctx.sequence.next(&self.ctx.project, &self.ctx.channel, &topic).await {
            Ok(seq) => seq,
            Err(err) => {
                warn!(topic, error = %err, "failed to assign sequence id");
                if ack {
                    let packet = super::broadcaster::Broadcaster::error_ack(
                        Some(client_msg_id),
                        AckPath::Publish,
                        &topic,
                        ErrorCode::Internal,
                        "failed to assign sequence id",
                    );
                    self.reply(&client_id, &packet).await;
                }
                return;
            }
        };

        let t_ingress = Utc::now();
        let mut message = Message::new(seq, topic.clone(), client_id.clone(), payload);
        message.client_msg_id = Some(client_msg_id.clone());
        message.client_publish_ts = client_publish_ts;
        message.t_ingress = Some(t_ingress);

        if let Err(err) = self.ctx.buffer.buffer(&self.ctx.project, &self.ctx.channel, &message).await {
            warn!(topic = %topic, error = %err, "failed to buffer message");
        }

        message.t_enqueued = Some(Utc::now());
        self.broadcast_locally(&message, Some(&client_id)).await;
        self.fan_out_to_peers(&message).await;

        self.ctx.usage.push(UsageEvent {
            project: self.ctx.project.clone(),
            channel: self.ctx.channel.clone(),
            topic: Some(topic.clone()),
            key_id,
            event_type: UsageEventType::Message,
            bytes: message.payload.len(),
        });

        if ack {
            let packet = crate::model::ServerPacket::Ack(crate::model::AckPacket {
                client_msg_id: Some(client_msg_id),
                result: crate::model::AckResult {
                    path: AckPath::Publish,
                    seq: Some(seq),
                    server_assigned_id: Some(message.id),
                    topic,
                    result: crate::model::AckOutcome::Ok(crate::model::AckSuccess::Publish { t_ingress }),
                },
            });
            self.reply(&client_id, &packet).await;
        }
    }

    async fn handle_peer_publish(&mut self, message: Message) {
        if let Err(err) = self.ctx.buffer.buffer(&self.ctx.project, &self.ctx.channel, &message).await {
            warn!(topic = %message.topic, error = %err, "failed to buffer peer message");
        }
        self.broadcast_locally(&message, None).await;
    }

    /// Deliver `message` to every local subscriber of its topic, excluding
    /// `publisher` (spec §8 invariant: no self-delivery).
    async fn broadcast_locally(&mut self, message: &Message, publisher: Option<&str>) {
        let subscribers = self.ctx.subscriptions.subscribers_of(&message.topic);
        let mut recipients = Vec::with_capacity(subscribers.len());
        for client_id in subscribers {
            if Some(client_id.as_str()) == publisher {
                continue;
            }
            let Some(client) = self.clients.get(&client_id) else {
                continue;
            };
            recipients.push(Recipient {
                client_id: client_id.clone(),
                sink: client.sink.clone(),
                info_only: client.grant.is_info_only(&message.topic),
            });
        }

        let report = self.ctx.broadcaster.broadcast(message, &recipients).await;
        debug!(
            topic = %message.topic,
            delivered = report.delivered,
            skipped = report.skipped_backpressure,
            failed = report.failed,
            "broadcast complete"
        );

        for client_id in recipients.iter().map(|r| &r.client_id) {
            let _ = self
                .ctx
                .subscriptions
                .record_last_seen(&self.ctx.project, &self.ctx.channel, &message.topic, client_id, message.seq)
                .await;
        }
    }

    async fn fan_out_to_peers(&self, message: &Message) {
        let channel_key = crate::model::DistributedKey::channel(&self.ctx.project, &self.ctx.channel);
        let Ok(peers) = self.ctx.shard_table.peer_regions(&channel_key).await else {
            return;
        };
        for region in peers {
            if let Err(err) = self
                .ctx
                .peer_dialer
                .publish_message(&region, &channel_key, message.clone())
                .await
            {
                warn!(region = %region, topic = %message.topic, error = %err, "peer publish failed, dropping");
            }
        }
    }
}
