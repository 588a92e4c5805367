//! Client configuration

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::envelope::{DEFAULT_EXCHANGE, DEFAULT_LANG, DEFAULT_QUEUE};
use crate::domain::{CeleriacError, EnvelopeDefaults, Result};
use crate::pool::DEFAULT_MAX_IDLE;

pub const DEFAULT_RESULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for a `Client`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Routing key used when no `Queue` option is given
    pub default_queue: String,

    /// Exchange used when no `Queue` option is given
    pub default_exchange: String,

    /// Value of the `lang` header on every dispatch envelope
    pub lang: String,

    /// Upper bound on idle envelopes kept by the pool
    pub pool_max_idle: usize,

    /// Wait used by `AsyncResult::wait` on handles returned by the client
    pub result_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_queue: DEFAULT_QUEUE.to_string(),
            default_exchange: DEFAULT_EXCHANGE.to_string(),
            lang: DEFAULT_LANG.to_string(),
            pool_max_idle: DEFAULT_MAX_IDLE,
            result_timeout_ms: DEFAULT_RESULT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by any `CELERIAC_*` environment variables that are set
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = lookup("CELERIAC_DEFAULT_QUEUE") {
            config.default_queue = val;
        }

        if let Some(val) = lookup("CELERIAC_DEFAULT_EXCHANGE") {
            config.default_exchange = val;
        }

        if let Some(val) = lookup("CELERIAC_LANG") {
            config.lang = val;
        }

        if let Some(val) = lookup("CELERIAC_POOL_MAX_IDLE") {
            config.pool_max_idle = val.parse().map_err(|e| {
                CeleriacError::Config(format!("Invalid POOL_MAX_IDLE: {}", e))
            })?;
        }

        if let Some(val) = lookup("CELERIAC_RESULT_TIMEOUT_MS") {
            config.result_timeout_ms = val.parse().map_err(|e| {
                CeleriacError::Config(format!("Invalid RESULT_TIMEOUT_MS: {}", e))
            })?;
        }

        config.validate()?;
        info!(
            queue = %config.default_queue,
            pool_max_idle = config.pool_max_idle,
            "loaded client config"
        );
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.default_queue.is_empty() {
            return Err(CeleriacError::Config(
                "Default queue must not be empty".to_string(),
            ));
        }

        if self.default_exchange.is_empty() {
            return Err(CeleriacError::Config(
                "Default exchange must not be empty".to_string(),
            ));
        }

        if self.result_timeout_ms == 0 {
            return Err(CeleriacError::Config(
                "Result timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn envelope_defaults(&self) -> EnvelopeDefaults {
        EnvelopeDefaults {
            routing_key: self.default_queue.clone(),
            exchange: self.default_exchange.clone(),
            lang: self.lang.clone(),
        }
    }
}
