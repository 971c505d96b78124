//! `SequenceId` — the 128-bit, lexicographically-sortable monotonic id
//! assigned by the Sequence Engine (spec §4.A).
//!
//! Embeds a millisecond timestamp in the high 64 bits and a topic-seeded
//! pseudo-random tail in the low 64 bits. Fixed-width hex encoding keeps
//! string ordering identical to numeric ordering, which is what lets the
//! Message Buffer use plain lexicographic key ordering for `getAfter`
//! (spec §4.B) without a separate numeric index.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId {
    millis: u64,
    tail: u64,
}

impl SequenceId {
    pub fn new(millis: u64, tail: u64) -> Self {
        Self { millis, tail }
    }

    pub fn millis(&self) -> u64 {
        self.millis
    }

    pub fn tail(&self) -> u64 {
        self.tail
    }

    /// Fixed-width hex string; lexicographic order == numeric order.
    pub fn to_key(&self) -> String {
        format!("{:016x}{:016x}", self.millis, self.tail)
    }

    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 32 {
            return None;
        }
        let millis = u64::from_str_radix(&s[0..16], 16).ok()?;
        let tail = u64::from_str_radix(&s[16..32], 16).ok()?;
        Some(Self { millis, tail })
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

impl Serialize for SequenceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_key())
    }
}

impl<'de> Deserialize<'de> for SequenceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SequenceId::parse(&s).ok_or_else(|| serde::de::Error::custom("invalid sequence id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_order_matches_numeric_order() {
        let a = SequenceId::new(1, 5);
        let b = SequenceId::new(1, 6);
        let c = SequenceId::new(2, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(a.to_key() < b.to_key());
        assert!(b.to_key() < c.to_key());
    }

    #[test]
    fn round_trips_through_key() {
        let id = SequenceId::new(1_700_000_000_123, 42);
        let key = id.to_key();
        assert_eq!(SequenceId::parse(&key), Some(id));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(SequenceId::parse("short"), None);
        assert_eq!(SequenceId::parse(&"z".repeat(32)), None);
    }
}
