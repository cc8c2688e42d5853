// src/config.rs
//! Runtime settings.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. Optional `certificates.toml` in the working directory
//! 3. Environment variables prefixed `CERTS_` (e.g. `CERTS_IPFS_API_URL`)

use crate::storage::RetryPolicy;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Settings for the storage adapter and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// IPFS HTTP API endpoint
    pub ipfs_api_url: String,

    /// Total store attempts per call, including the first
    pub retry_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles per retry
    pub retry_base_delay_ms: u64,

    /// Upper bound on a single retry delay in milliseconds
    pub retry_max_delay_ms: u64,

    /// Deadline for a store call, retries included, in milliseconds
    pub store_timeout_ms: u64,

    /// Hex-encoded issuer key used by the `issue` command
    #[serde(default)]
    pub issuer_private_key: Option<String>,
}

impl Settings {
    /// Loads settings from defaults, `certificates.toml` and `CERTS_*`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_builder(
            Self::defaults()?
                .add_source(File::with_name("certificates").required(false))
                .add_source(Environment::with_prefix("CERTS")),
        )
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let policy = RetryPolicy::default();
        Config::builder()
            .set_default("ipfs_api_url", "http://localhost:5001")?
            .set_default("retry_attempts", i64::from(policy.max_attempts))?
            .set_default("retry_base_delay_ms", policy.base_delay.as_millis() as i64)?
            .set_default("retry_max_delay_ms", policy.max_delay.as_millis() as i64)?
            .set_default("store_timeout_ms", policy.timeout.as_millis() as i64)
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
            timeout: Duration::from_millis(self.store_timeout_ms),
        }
    }
}
