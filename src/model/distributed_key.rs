//! `DistributedKey` — the canonical broker identity (spec §3).
//!
//! Serialized as `v<version>:<project>:<resourceType>:<resource>[:<region>]`.
//! The region-less form identifies a logical channel; the region-qualified
//! form identifies a single broker instance. Equality and ordering are
//! string-based, grounded on the teacher's `CacheKey` (`data/cache/key.rs`)
//! convention of namespacing by colon/underscore-joined string segments —
//! generalized here into a type that also parses back out of that string.

use std::fmt;

use super::error::ModelError;
use crate::core::constants::DISTRIBUTED_KEY_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Channel,
}

impl ResourceType {
    fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Channel => "channel",
        }
    }

    fn parse(s: &str) -> Result<Self, ModelError> {
        match s {
            "channel" => Ok(ResourceType::Channel),
            other => Err(ModelError::InvalidDistributedKey(format!(
                "unknown resource type '{other}'"
            ))),
        }
    }
}

/// `(project, resourceType, resource, version[, region])`, canonically
/// serialized and string-ordered/string-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistributedKey {
    canonical: String,
}

impl DistributedKey {
    /// Build the region-less logical-channel key.
    pub fn channel(project: &str, channel: &str) -> Self {
        Self::build(project, channel, None)
    }

    /// Build the region-qualified broker-instance key.
    pub fn channel_in_region(project: &str, channel: &str, region: &str) -> Self {
        Self::build(project, channel, Some(region))
    }

    fn build(project: &str, resource: &str, region: Option<&str>) -> Self {
        let mut canonical = format!(
            "v{}:{}:{}:{}",
            DISTRIBUTED_KEY_VERSION,
            project,
            ResourceType::Channel.as_str(),
            resource
        );
        if let Some(region) = region {
            canonical.push(':');
            canonical.push_str(region);
        }
        Self { canonical }
    }

    pub fn parse(s: &str) -> Result<Self, ModelError> {
        let mut parts = s.splitn(5, ':');
        let version = parts
            .next()
            .ok_or_else(|| ModelError::InvalidDistributedKey(s.to_string()))?;
        if !version.starts_with('v') {
            return Err(ModelError::InvalidDistributedKey(s.to_string()));
        }
        let project = parts
            .next()
            .ok_or_else(|| ModelError::InvalidDistributedKey(s.to_string()))?;
        let resource_type = parts
            .next()
            .ok_or_else(|| ModelError::InvalidDistributedKey(s.to_string()))?;
        let resource = parts
            .next()
            .ok_or_else(|| ModelError::InvalidDistributedKey(s.to_string()))?;
        ResourceType::parse(resource_type)?;
        let region = parts.next();

        if project.is_empty() || resource.is_empty() {
            return Err(ModelError::InvalidDistributedKey(s.to_string()));
        }

        Ok(Self::build(project, resource, region))
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn is_region_qualified(&self) -> bool {
        self.canonical.splitn(5, ':').count() == 5
    }

    /// The region-less logical channel key that this (possibly
    /// region-qualified) key belongs to.
    pub fn channel_key(&self) -> Self {
        let mut parts = self.canonical.splitn(5, ':');
        let version = parts.next().unwrap_or_default();
        let project = parts.next().unwrap_or_default();
        let resource_type = parts.next().unwrap_or_default();
        let resource = parts.next().unwrap_or_default();
        Self {
            canonical: format!("{version}:{project}:{resource_type}:{resource}"),
        }
    }

    /// The project segment of the key.
    pub fn project(&self) -> &str {
        self.canonical.splitn(5, ':').nth(1).unwrap_or_default()
    }

    pub fn region(&self) -> Option<&str> {
        let mut parts = self.canonical.splitn(5, ':');
        parts.next();
        parts.next();
        parts.next();
        parts.next();
        parts.next()
    }
}

impl fmt::Display for DistributedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_has_no_region() {
        let key = DistributedKey::channel("proj", "room");
        assert_eq!(key.as_str(), "v1:proj:channel:room");
        assert!(!key.is_region_qualified());
        assert_eq!(key.region(), None);
        assert_eq!(key.project(), "proj");
    }

    #[test]
    fn region_qualified_key_round_trips() {
        let key = DistributedKey::channel_in_region("proj", "room", "us-east");
        assert_eq!(key.as_str(), "v1:proj:channel:room:us-east");
        assert!(key.is_region_qualified());
        assert_eq!(key.region(), Some("us-east"));

        let parsed = DistributedKey::parse(key.as_str()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn channel_key_derivation_strips_region() {
        let regional = DistributedKey::channel_in_region("proj", "room", "us-east");
        let logical = regional.channel_key();
        assert_eq!(logical, DistributedKey::channel("proj", "room"));
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        assert!(DistributedKey::parse("garbage").is_err());
        assert!(DistributedKey::parse("v1:proj:bogus:room").is_err());
        assert!(DistributedKey::parse("v1::channel:room").is_err());
    }

    #[test]
    fn equality_and_ordering_are_string_based() {
        let a = DistributedKey::channel("a", "room");
        let b = DistributedKey::channel("b", "room");
        assert!(a < b);
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
