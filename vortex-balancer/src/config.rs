//! Balancer configuration.
//!
//! Durations are carried as integer milliseconds so the struct maps cleanly
//! onto the TOML route definitions the proxy loads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BalancerError, Result};

/// Smallest accepted bucket resolution and probing period.
pub const MIN_PERIOD_MS: u64 = 1_000;

/// Largest accepted bucket count for one rolling window.
pub const MAX_BUCKET_COUNT: usize = 3_600;

/// Tunables for one [`WeightedSelector`](crate::load_balancer::selector::WeightedSelector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Number of buckets in each endpoint's rolling window.
    pub bucket_count: usize,
    /// Time covered by one bucket, in milliseconds.
    pub bucket_resolution_ms: u64,
    /// Multiplier applied to a well-performing endpoint's weight when probing.
    pub growth_factor: u32,
    /// Ceiling for any effective weight.
    pub max_weight: u32,
    /// Backoff between a weight change and the decision that follows it, in milliseconds.
    pub probing_period_ms: u64,
    /// When false the controller is never consulted and weights stay at their base values.
    pub adaptive: bool,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            bucket_count: 10,
            bucket_resolution_ms: 1_000,
            growth_factor: 8,
            max_weight: 4_096,
            probing_period_ms: 4_000,
            adaptive: true,
        }
    }
}

impl BalancerConfig {
    /// Parse a configuration from a TOML document, filling in defaults for
    /// missing keys, and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BalancerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 || self.bucket_count > MAX_BUCKET_COUNT {
            return Err(BalancerError::Configuration(format!(
                "bucket_count must be between 1 and {MAX_BUCKET_COUNT}, got {}",
                self.bucket_count
            )));
        }
        if self.bucket_resolution_ms < MIN_PERIOD_MS {
            return Err(BalancerError::Configuration(format!(
                "bucket_resolution_ms must be at least {MIN_PERIOD_MS}, got {}",
                self.bucket_resolution_ms
            )));
        }
        if self.growth_factor < 2 {
            return Err(BalancerError::Configuration(format!(
                "growth_factor must be at least 2, got {}",
                self.growth_factor
            )));
        }
        if self.max_weight == 0 {
            return Err(BalancerError::Configuration(
                "max_weight must be positive".into(),
            ));
        }
        if self.probing_period_ms < MIN_PERIOD_MS {
            return Err(BalancerError::Configuration(format!(
                "probing_period_ms must be at least {MIN_PERIOD_MS}, got {}",
                self.probing_period_ms
            )));
        }
        Ok(())
    }

    /// Bucket resolution as a [`Duration`].
    pub fn bucket_resolution(&self) -> Duration {
        Duration::from_millis(self.bucket_resolution_ms)
    }

    /// Probing period as a [`Duration`].
    pub fn probing_period(&self) -> Duration {
        Duration::from_millis(self.probing_period_ms)
    }
}
