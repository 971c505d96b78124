//! `Subscription` and `LastSeenCursor` value types (spec §3).
//!
//! Thin newtypes over `String`/`SequenceId` — the Subscription Registry and
//! Message Buffer components (§4.C, §4.B) own the actual storage; these are
//! just the keys/values they traffic in, kept out of those modules so the
//! storage key format can be unit-tested independently.

use super::sequence_id::SequenceId;

/// Storage key for a subscriber set: `subs:<project>:<channel>:<topic>`.
pub fn subscription_key(project: &str, channel: &str, topic: &str) -> String {
    format!("subs:{project}:{channel}:{topic}")
}

/// Storage key for a buffered message: `msg:<project>:<channel>:<topic>:<seq>`.
pub fn message_key(project: &str, channel: &str, topic: &str, seq: SequenceId) -> String {
    format!("msg:{project}:{channel}:{topic}:{}", seq.to_key())
}

/// Storage key prefix shared by all messages on a topic (for pattern scans).
pub fn message_key_prefix(project: &str, channel: &str, topic: &str) -> String {
    format!("msg:{project}:{channel}:{topic}:")
}

/// Storage key for the last-issued sequence id: `seq:<project>:<channel>:<topic>`.
pub fn sequence_key(project: &str, channel: &str, topic: &str) -> String {
    format!("seq:{project}:{channel}:{topic}")
}

/// Storage key for a last-seen cursor:
/// `last_seq_seen:<project>:<channel>:<topic>:<clientId>`.
pub fn last_seen_key(project: &str, channel: &str, topic: &str, client_id: &str) -> String {
    format!("last_seq_seen:{project}:{channel}:{topic}:{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_spec_layout() {
        assert_eq!(subscription_key("p", "c", "t"), "subs:p:c:t");
        assert_eq!(sequence_key("p", "c", "t"), "seq:p:c:t");
        assert_eq!(last_seen_key("p", "c", "t", "client1"), "last_seq_seen:p:c:t:client1");
        let seq = SequenceId::new(1, 1);
        assert_eq!(message_key("p", "c", "t", seq), format!("msg:p:c:t:{}", seq.to_key()));
        assert!(message_key("p", "c", "t", seq).starts_with(&message_key_prefix("p", "c", "t")));
    }
}
