//! Prometheus metrics for the expiration scheduler.
//!
//! Provides metrics for:
//! - Documents deleted per cycle
//! - Cycle duration
//! - Failed cycles by error kind
//!
//! Without the `prometheus` feature every recording function compiles to a
//! no-op.

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime; the HTTP listener is spawned
/// onto it.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &config.duration_buckets_secs,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install()?;

    tracing::info!(listen = %config.listen, "Prometheus exporter listening");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!(
            "Metrics are enabled in config but the 'prometheus' feature is not compiled. \
            Rebuild with: cargo build --features prometheus"
        );
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record documents deleted by an expiration cycle.
///
/// # Arguments
/// * `index` - The index the delete ran against (e.g. "MessagesViewIndex")
/// * `count` - The number of documents deleted
pub fn record_expiration_deletion(index: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "expiration_deletions_total",
            "index" => index.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (index, count);
    }
}

/// Record how long a completed expiration cycle took.
pub fn record_expiration_cycle_duration(index: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        histogram!(
            "expiration_cycle_duration_seconds",
            "index" => index.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (index, duration_secs);
    }
}

/// Record a failed expiration cycle.
///
/// `kind` is a short label such as "store", "index_not_found" or "panic".
pub fn record_expiration_error(kind: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "expiration_errors_total",
            "kind" => kind.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = kind;
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
