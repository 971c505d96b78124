//! Application configuration
//!
//! Loaded from environment variables (via `dotenvy` + the `config` crate)
//! with CLI flags (`core::cli`) applied as overrides, following the same
//! layering the teacher uses for its own `AppConfig`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendType {
    Memory,
    Redis,
}

impl Default for CacheBackendType {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// This process's region hint, embedded into region-qualified
    /// `DistributedKey`s for every broker it hosts.
    pub region: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            region: DEFAULT_REGION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CacheConfig {
    pub backend: CacheBackendType,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BufferConfig {
    pub ttl_secs: u64,
    pub prune_limit: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            ttl_secs: MESSAGE_TTL_SECS,
            prune_limit: PRUNE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionsConfig {
    pub max_per_topic: usize,
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            max_per_topic: MAX_SUBSCRIBERS_PER_TOPIC,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    pub batch_size: usize,
    pub backpressure_high_bytes: usize,
    pub backpressure_low_bytes: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            batch_size: BROADCAST_BATCH_SIZE,
            backpressure_high_bytes: BACKPRESSURE_HIGH_WATERMARK_BYTES,
            backpressure_low_bytes: BACKPRESSURE_LOW_WATERMARK_BYTES,
        }
    }
}

/// Material used to verify grants (spec §4.F).
///
/// A grant's JWT is validated with an HS256 shared secret by default. A
/// deployment that issues grants with an RSA key instead sets
/// `public_key_path` to a PEM file; when both are set, the public key takes
/// precedence, since an asymmetric issuer has no reason to also hand out its
/// signing secret.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GrantConfig {
    pub hmac_secret: Option<String>,
    pub public_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UsageConfig {
    pub webhook_url: Option<String>,
    pub hmac_secret: Option<String>,
    pub batch_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub buffer: BufferConfig,
    pub subscriptions: SubscriptionsConfig,
    pub broadcast: BroadcastConfig,
    pub grant: GrantConfig,
    pub usage: UsageConfig,
    /// Root admin API key required on `x-root-api-key` for admin routes.
    pub root_api_key: Option<String>,
}

impl AppConfig {
    /// Build configuration from environment variables and CLI overrides.
    ///
    /// Mirrors the teacher's `AppConfig::load`: environment is the base
    /// layer, explicit CLI flags win.
    pub fn load(cli: &CliConfig) -> anyhow::Result<Self> {
        let mut config = AppConfig {
            server: ServerConfig {
                host: std::env::var(ENV_HOST).unwrap_or_else(|_| DEFAULT_HOST.to_string()),
                port: std::env::var(ENV_PORT)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PORT),
                region: std::env::var(ENV_REGION).unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            },
            cache: CacheConfig {
                backend: match std::env::var(ENV_CACHE_BACKEND).ok().as_deref() {
                    Some("redis") => CacheBackendType::Redis,
                    _ => CacheBackendType::Memory,
                },
                redis_url: std::env::var(ENV_CACHE_REDIS_URL).ok(),
            },
            buffer: BufferConfig::default(),
            subscriptions: SubscriptionsConfig::default(),
            broadcast: BroadcastConfig::default(),
            grant: GrantConfig {
                hmac_secret: std::env::var(ENV_GRANT_HMAC_SECRET).ok(),
                public_key_path: std::env::var(ENV_GRANT_PUBLIC_KEY_PATH).ok().map(PathBuf::from),
            },
            usage: UsageConfig {
                webhook_url: std::env::var(ENV_USAGE_WEBHOOK_URL).ok(),
                hmac_secret: std::env::var(ENV_USAGE_HMAC_SECRET).ok(),
                batch_interval_secs: None,
            },
            root_api_key: std::env::var(ENV_ROOT_API_KEY).ok(),
        };

        cli.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn config_file_path(cli: &CliConfig) -> Option<PathBuf> {
        cli.config.clone().or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from))
    }
}
