//! Document expiration configuration.
//!
//! Controls how long audited messages are kept and how often the background
//! expiration scheduler looks for documents past that window.
//!
//! # Example
//!
//! ```toml
//! [expiration]
//! hours_to_keep = 720
//! interval_secs = 10800
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Intervals below this are considered aggressive: every cycle queries a
/// potentially stale index and bulk-deletes through the store.
pub const RECOMMENDED_MIN_INTERVAL_SECS: u64 = 60 * 60;

/// Document expiration configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpirationConfig {
    /// How many hours a processed message is kept before it becomes
    /// eligible for deletion. Must not be negative.
    /// Default: 720 (30 days)
    #[serde(default = "default_hours_to_keep")]
    pub hours_to_keep: i64,

    /// Seconds between the end of one expiration cycle and the start of
    /// the next. Set to 0 to disable expiration entirely.
    /// Default: 10800 (3 hours)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self {
            hours_to_keep: default_hours_to_keep(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_hours_to_keep() -> i64 {
    24 * 30
}

pub(crate) fn default_interval_secs() -> u64 {
    3 * 60 * 60
}

impl ExpirationConfig {
    /// Check if the scheduler should run at all.
    pub fn is_enabled(&self) -> bool {
        self.interval_secs > 0
    }

    /// Get the interval as a Duration, or `None` when expiration is disabled.
    pub fn interval(&self) -> Option<Duration> {
        self.is_enabled()
            .then(|| Duration::from_secs(self.interval_secs))
    }

    /// Check if the interval is shorter than recommended.
    pub fn is_aggressive(&self) -> bool {
        self.is_enabled() && self.interval_secs < RECOMMENDED_MIN_INTERVAL_SECS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hours_to_keep < 0 {
            return Err(ConfigError::Validation(format!(
                "expiration.hours_to_keep must not be negative (got {})",
                self.hours_to_keep
            )));
        }
        Ok(())
    }
}
