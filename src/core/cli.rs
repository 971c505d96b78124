//! Command-line surface
//!
//! Thin `clap` overlay on top of environment-driven configuration, in the
//! style of the teacher's `core::cli::Cli`.

use std::path::PathBuf;

use clap::Parser;

use super::config::{AppConfig, CacheBackendType};
use super::constants::{ENV_CACHE_BACKEND, ENV_CACHE_REDIS_URL, ENV_CONFIG, ENV_HOST, ENV_PORT, ENV_REGION};

#[derive(Parser, Debug, Clone)]
#[command(name = "erebus")]
#[command(version, about = "Regional pub/sub broker gateway", long_about = None)]
pub struct CliConfig {
    /// Gateway bind host
    #[arg(long, short = 'H', env = ENV_HOST)]
    pub host: Option<String>,

    /// Gateway bind port
    #[arg(long, short = 'p', env = ENV_PORT)]
    pub port: Option<u16>,

    /// This process's region hint
    #[arg(long, short = 'r', env = ENV_REGION)]
    pub region: Option<String>,

    /// Path to a config file (currently unused beyond env var precedence)
    #[arg(long, short = 'c', env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Cache/registry backend ("memory" or "redis")
    #[arg(long, env = ENV_CACHE_BACKEND)]
    pub cache_backend: Option<String>,

    /// Redis URL, required when --cache-backend=redis
    #[arg(long, env = ENV_CACHE_REDIS_URL)]
    pub cache_redis_url: Option<String>,
}

impl CliConfig {
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(region) = &self.region {
            config.server.region = region.clone();
        }
        if let Some(backend) = &self.cache_backend {
            config.cache.backend = match backend.as_str() {
                "redis" => CacheBackendType::Redis,
                _ => CacheBackendType::Memory,
            };
        }
        if let Some(url) = &self.cache_redis_url {
            config.cache.redis_url = Some(url.clone());
        }
    }
}

pub fn parse() -> CliConfig {
    CliConfig::parse()
}
