//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tally_limiter::RateLimitConfig;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration
    pub listen: ListenConfig,
    /// Credential validator configuration
    pub auth: AuthConfig,
    /// Vote rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Journal compaction configuration
    pub compaction: CompactionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.port == 0 {
            return Err(ConfigError::InvalidListen("port cannot be 0".into()));
        }

        if self.auth.endpoint.is_empty() {
            return Err(ConfigError::InvalidAuth("endpoint cannot be empty".into()));
        }
        if !self.auth.endpoint.starts_with("http://") && !self.auth.endpoint.starts_with("https://")
        {
            return Err(ConfigError::InvalidAuth(format!(
                "endpoint must be an http(s) URL, got {}",
                self.auth.endpoint
            )));
        }
        if self.auth.timeout_secs == 0 {
            return Err(ConfigError::InvalidAuth("timeout cannot be 0".into()));
        }

        if self.rate_limit.threshold == 0 {
            return Err(ConfigError::InvalidRateLimit("threshold cannot be 0".into()));
        }
        if self.rate_limit.ttl_secs == 0 {
            return Err(ConfigError::InvalidRateLimit("ttl cannot be 0".into()));
        }

        if self.compaction.interval_secs == 0 {
            return Err(ConfigError::InvalidCompaction("interval cannot be 0".into()));
        }

        Ok(())
    }

    /// Get listener bind address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen.host, self.listen.port)
    }
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8443)
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8443,
        }
    }
}

/// Credential validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Validator endpoint; the credential is appended as `?key=`
    pub endpoint: String,
    /// Upper bound on one validation round trip, in seconds
    pub timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://derpibooru.org/api/v2/users/current.json".to_string(),
            timeout_secs: 10,
        }
    }
}

impl AuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Journal compaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Seconds between compaction passes (default: 300)
    pub interval_secs: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl CompactionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid listener settings
    #[error("invalid listen config: {0}")]
    InvalidListen(String),
    /// Invalid credential validator settings
    #[error("invalid auth config: {0}")]
    InvalidAuth(String),
    /// Invalid rate limiting settings
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid compaction settings
    #[error("invalid compaction config: {0}")]
    InvalidCompaction(String),
}
