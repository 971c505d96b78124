//! Fixed constants from the spec, plus the environment variable names that
//! can override the ones meant to be tunable.

// =============================================================================
// Application identity
// =============================================================================

pub const APP_NAME: &str = "Erebus";
pub const APP_NAME_LOWER: &str = "erebus";

// =============================================================================
// Environment variables
// =============================================================================

pub const ENV_HOST: &str = "EREBUS_HOST";
pub const ENV_PORT: &str = "EREBUS_PORT";
pub const ENV_REGION: &str = "EREBUS_REGION";
pub const ENV_LOG: &str = "EREBUS_LOG";
pub const ENV_CONFIG: &str = "EREBUS_CONFIG";

pub const ENV_CACHE_BACKEND: &str = "EREBUS_CACHE_BACKEND";
pub const ENV_CACHE_REDIS_URL: &str = "EREBUS_CACHE_REDIS_URL";

pub const ENV_GRANT_HMAC_SECRET: &str = "EREBUS_GRANT_HMAC_SECRET";
pub const ENV_GRANT_PUBLIC_KEY_PATH: &str = "EREBUS_GRANT_PUBLIC_KEY_PATH";
pub const ENV_USAGE_WEBHOOK_URL: &str = "EREBUS_USAGE_WEBHOOK_URL";
pub const ENV_USAGE_HMAC_SECRET: &str = "EREBUS_USAGE_HMAC_SECRET";
pub const ENV_ROOT_API_KEY: &str = "EREBUS_ROOT_API_KEY";

// =============================================================================
// Server defaults
// =============================================================================

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7800;
pub const DEFAULT_REGION: &str = "local";

// =============================================================================
// Message Buffer (spec §4.B, §3)
// =============================================================================

/// TTL for buffered messages: 3 days.
pub const MESSAGE_TTL_SECS: u64 = 3 * 24 * 60 * 60;

/// Keys of the same prefix scanned opportunistically on each `buffer()` call.
pub const PRUNE_LIMIT: usize = 128;

/// Maximum `getAfter` page size.
pub const GET_AFTER_MAX_LIMIT: usize = 1000;

// =============================================================================
// Subscription Registry (spec §4.C, §3)
// =============================================================================

pub const MAX_SUBSCRIBERS_PER_TOPIC: usize = 5120;

// =============================================================================
// Broadcaster (spec §4.G)
// =============================================================================

pub const BROADCAST_BATCH_SIZE: usize = 10;

/// Above this many buffered bytes on a socket, skip delivery entirely.
pub const BACKPRESSURE_HIGH_WATERMARK_BYTES: usize = 100 * 1024;

/// Above this many buffered bytes, yield once before continuing.
pub const BACKPRESSURE_LOW_WATERMARK_BYTES: usize = 10 * 1024;

// =============================================================================
// DistributedKey (spec §3)
// =============================================================================

pub const DISTRIBUTED_KEY_VERSION: u32 = 1;

// =============================================================================
// Gateway (spec §4.G′)
// =============================================================================

/// Bound on a channel broker's inbound command queue and presence feed, so a
/// slow or stalled actor applies backpressure to new connects instead of
/// growing memory unbounded.
pub const BROKER_COMMAND_QUEUE_CAPACITY: usize = 1024;

// =============================================================================
// Usage event queue (spec §4.G′, §11)
// =============================================================================

/// Default interval between usage-event webhook deliveries.
pub const USAGE_BATCH_INTERVAL_SECS: u64 = 30;

// =============================================================================
// Shutdown
// =============================================================================

pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Wire protocol close codes (spec §6)
// =============================================================================

/// The only `connect.version` this broker understands. A client that sends a
/// different value is closed with `VersionMismatch`; a client that omits the
/// field entirely is assumed to speak this version.
pub const WIRE_PROTOCOL_VERSION: u32 = 1;

pub const CLOSE_BAD_REQUEST: u16 = 4400;
pub const CLOSE_UNAUTHORIZED: u16 = 4401;
pub const CLOSE_FORBIDDEN: u16 = 4403;
pub const CLOSE_VERSION_MISMATCH: u16 = 4409;
pub const CLOSE_INTERNAL_SERVER_ERROR: u16 = 4500;
