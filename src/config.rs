//! Centralized configuration for the hive core.
//!
//! Single source of truth for host credentials, pool sizing and ACL
//! defaults, loadable from TOML with sensible defaults and validation.
//! The pool is constructed from this config at service start and torn
//! down at service stop; there is no process-wide implicit singleton.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XenError};

/// Default values for configuration.
mod defaults {
    pub fn pool_size() -> usize {
        4
    }
    pub fn acquire_timeout_secs() -> u64 {
        30
    }
    pub fn session_retry_limit() -> u32 {
        3
    }
    pub fn access_prefix() -> String {
        "vm-data/xenhive/access".to_string()
    }
    pub fn realm() -> String {
        "basic".to_string()
    }
}

/// Connection details for the upstream hypervisor host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// RPC endpoint of the host, e.g. `https://xen0.example.net`.
    pub url: String,
    /// Login username for the host API.
    pub username: String,
    /// Login password for the host API.
    pub password: String,
}

/// Session pool sizing and retry bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Fixed number of pooled sessions (bounded resource).
    #[serde(default = "defaults::pool_size")]
    pub size: usize,
    /// How long `acquire` waits for a free session before failing
    /// with `PoolExhausted`.
    #[serde(default = "defaults::acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// How many times a handle re-establishes an expired session before
    /// surfacing `SessionUnavailable`.
    #[serde(default = "defaults::session_retry_limit")]
    pub session_retry_limit: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: defaults::pool_size(),
            acquire_timeout_secs: defaults::acquire_timeout_secs(),
            session_retry_limit: defaults::session_retry_limit(),
        }
    }
}

impl PoolConfig {
    /// Acquire timeout as a [`Duration`].
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// ACL engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclConfig {
    /// Key prefix under which permission entries live in each object's
    /// metadata store.
    #[serde(default = "defaults::access_prefix")]
    pub access_prefix: String,
    /// Realm name baked into every subject path (the authenticator
    /// namespace in the original deployment).
    #[serde(default = "defaults::realm")]
    pub realm: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            access_prefix: defaults::access_prefix(),
            realm: defaults::realm(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HiveConfig {
    /// Upstream host connection.
    pub host: HostConfig,
    /// Session pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
    /// ACL defaults.
    #[serde(default)]
    pub acl: AclConfig,
}

impl HiveConfig {
    /// Parse a TOML document into a validated config.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: HiveConfig = toml::from_str(raw)
            .map_err(|err| XenError::InvalidArgument(format!("config parse error: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.host.url.is_empty() {
            return Err(XenError::InvalidArgument("host.url must not be empty".into()));
        }
        if self.host.username.is_empty() {
            return Err(XenError::InvalidArgument(
                "host.username must not be empty".into(),
            ));
        }
        if self.pool.size == 0 {
            return Err(XenError::InvalidArgument(
                "pool.size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
