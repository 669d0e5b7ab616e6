//! Configuration module for the expiration service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [expiration]
//! hours_to_keep = 720
//! interval_secs = 10800
//!
//! [store]
//! type = "sqlite"
//! path = "${AUDIT_DATA_DIR}/audit.db"
//!
//! [observability.logging]
//! level = "info"
//! format = "json"
//! ```

mod expiration;
mod observability;
mod store;

use std::{path::Path, sync::LazyLock};

pub use expiration::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use store::*;

/// Root configuration for the expiration service.
///
/// All sections are optional; an empty file runs the scheduler with its
/// defaults against an in-memory store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Retention window and scheduling for document expiration.
    #[serde(default)]
    pub expiration: ExpirationConfig,

    /// Audit document store the scheduler deletes through.
    #[serde(default)]
    pub store: StoreConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        // Detect feature-gated values before typed deserialization so the
        // user gets a rebuild hint instead of an "unknown variant" error
        let raw: toml::Value = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        check_disabled_features(&raw)?;

        let config: ServiceConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.expiration.validate()?;
        self.store.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Check for feature-gated configuration values before typed deserialization.
fn check_disabled_features(raw: &toml::Value) -> Result<(), ConfigError> {
    let mut issues: Vec<(String, &str)> = Vec::new();

    if let Some(type_val) = raw
        .get("store")
        .and_then(|v| v.get("type"))
        .and_then(|v| v.as_str())
    {
        check_store_feature(type_val, &mut issues);
    }

    if raw
        .get("observability")
        .and_then(|v| v.get("metrics"))
        .and_then(|v| v.get("enabled"))
        .and_then(|v| v.as_bool())
        == Some(true)
    {
        check_metrics_feature(&mut issues);
    }

    if issues.is_empty() {
        return Ok(());
    }

    let details = issues
        .iter()
        .map(|(msg, _)| msg.as_str())
        .collect::<Vec<_>>()
        .join("\n  - ");
    let features = issues
        .iter()
        .map(|(_, feat)| *feat)
        .collect::<Vec<_>>()
        .join(",");

    Err(ConfigError::Validation(format!(
        "Configuration requires features not compiled in this build:\n  \
         - {details}\n\n\
         Rebuild with: cargo build --features {features}\n\
         Or use the 'full' profile: cargo build --features full"
    )))
}

fn check_store_feature(type_val: &str, _issues: &mut Vec<(String, &str)>) {
    match type_val {
        #[cfg(not(feature = "database-sqlite"))]
        "sqlite" => _issues.push((
            "store type 'sqlite' requires the 'database-sqlite' feature".into(),
            "database-sqlite",
        )),
        _ => {}
    }
}

fn check_metrics_feature(_issues: &mut Vec<(String, &str)>) {
    #[cfg(not(feature = "prometheus"))]
    _issues.push((
        "observability.metrics.enabled requires the 'prometheus' feature".into(),
        "prometheus",
    ));
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex"));

/// Expand `${VAR_NAME}` references, leaving anything after a `#` untouched.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);

            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
