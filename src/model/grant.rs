//! `Grant` — the signed, per-connection access token (spec §3).
//!
//! Shape and `has_scope`/`require_scope`-style helpers are grounded on the
//! teacher's `AuthContext`/`ApiKeyScope` (`api/auth/context.rs`): an enum
//! describing what the caller is allowed to do, with cheap local checks
//! before any I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ModelError;

pub const WILDCARD_TOPIC: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Read,
    Write,
    ReadWrite,
    Info,
}

impl Scope {
    pub fn allows_read(&self) -> bool {
        matches!(self, Scope::Read | Scope::ReadWrite)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, Scope::Write | Scope::ReadWrite)
    }

    pub fn is_info_only(&self) -> bool {
        matches!(self, Scope::Info)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicGrant {
    pub topic: String,
    pub scope: Scope,
}

impl TopicGrant {
    pub fn matches(&self, topic: &str) -> bool {
        self.topic == topic || self.topic == WILDCARD_TOPIC
    }
}

/// Claims carried by a grant JWT (spec §3, §4.F).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Grant {
    pub project: String,
    pub channel: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub topics: Vec<TopicGrant>,
    #[serde(rename = "webhookUrl", default)]
    pub webhook_url: Option<String>,
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
}

impl Grant {
    /// Validate the invariants from spec §3: `expiresAt > issuedAt`,
    /// `channel` non-empty.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.channel.is_empty() {
            return Err(ModelError::InvalidGrant("channel must be non-empty".into()));
        }
        if self.expires_at <= self.issued_at {
            return Err(ModelError::InvalidGrant(
                "expiresAt must be after issuedAt".into(),
            ));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Every topic-grant entry whose `topic` matches `topic` (exact or `*`).
    fn matching_entries<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a TopicGrant> {
        self.topics.iter().filter(move |t| t.matches(topic))
    }

    pub fn can_read(&self, topic: &str) -> bool {
        self.matching_entries(topic).any(|t| t.scope.allows_read())
    }

    pub fn can_write(&self, topic: &str) -> bool {
        self.matching_entries(topic).any(|t| t.scope.allows_write())
    }

    /// True if the grant only has an `info` entry matching `topic` (no
    /// read/readwrite entry) — such a subscriber gets the informational
    /// payload, not the real one (spec §4.G).
    pub fn is_info_only(&self, topic: &str) -> bool {
        let mut saw_info = false;
        for entry in self.matching_entries(topic) {
            if entry.scope.allows_read() {
                return false;
            }
            if entry.scope.is_info_only() {
                saw_info = true;
            }
        }
        saw_info
    }
}
