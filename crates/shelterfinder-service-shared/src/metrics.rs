//! Prometheus metrics for the shelterfinder service.
//!
//! This module provides:
//! - [`MetricsConfig`]: Configuration for the metrics system
//! - [`init_metrics`]: Initialize the Prometheus metrics recorder
//! - [`metrics_handler`]: Axum handler for the metrics endpoint
//! - Business metric helpers for shelter queries
//!
//! Until [`init_metrics`] runs, the helpers record into the no-op recorder.
//!
//! # Example
//!
//! ```no_run
//! use shelterfinder_service_shared::metrics::{MetricsConfig, init_metrics, metrics_handler};
//! use axum::{Router, routing::get};
//!
//! // Initialize metrics at startup
//! let config = MetricsConfig::default();
//! init_metrics(&config).expect("failed to initialize metrics");
//!
//! // Add metrics endpoint to router
//! let app: Router = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use shelterfinder_lib::{Error as LibError, GeocodeError};

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Configuration for the metrics system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled.
    pub enabled: bool,
    /// Path for the metrics endpoint (e.g., "/metrics").
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Create configuration from environment variables.
    ///
    /// - `METRICS_ENABLED`: "false", "0" or "off" disables (default: enabled)
    /// - `METRICS_PATH`: Path for metrics endpoint (default: "/metrics")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("METRICS_ENABLED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "off"))
            .unwrap_or(true);

        let path = lookup("METRICS_PATH")
            .map(|p| p.trim().to_string())
            .filter(|p| p.starts_with('/'))
            .unwrap_or_else(|| "/metrics".to_string());

        Self { enabled, path }
    }
}

/// Initialize the Prometheus metrics recorder.
///
/// This must be called once at application startup before any metrics are recorded.
/// Subsequent calls will return an error.
///
/// # Errors
///
/// Returns an error if:
/// - Metrics are disabled in configuration
/// - The recorder has already been installed
/// - The Prometheus builder fails to install
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Err(MetricsError::Disabled);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::AlreadyInitialized)?;

    describe_business_metrics();
    Ok(())
}

fn describe_business_metrics() {
    metrics::describe_counter!(
        "shelterfinder_queries_total",
        "Shelter queries received, by endpoint"
    );
    metrics::describe_counter!(
        "shelterfinder_queries_failed_total",
        "Shelter queries that returned an error, by endpoint and reason"
    );
    metrics::describe_histogram!(
        "shelterfinder_results_returned",
        "Shelters returned per query"
    );
    metrics::describe_gauge!(
        "shelterfinder_dataset_shelters",
        "Shelters held in the cached dataset"
    );
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if [`init_metrics`] has not been called.
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

/// Axum handler for the `/metrics` endpoint.
///
/// Returns Prometheus exposition format text.
pub async fn metrics_handler() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|h| h.render())
        .unwrap_or_else(|| "# Metrics not initialized\n".to_string())
}

/// Errors that can occur during metrics initialization.
#[derive(Debug, Clone)]
pub enum MetricsError {
    /// Metrics are disabled in configuration.
    Disabled,
    /// The recorder has already been installed.
    AlreadyInitialized,
    /// The Prometheus builder failed to install.
    InstallFailed(String),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Disabled => write!(f, "metrics are disabled"),
            MetricsError::AlreadyInitialized => write!(f, "metrics recorder already initialized"),
            MetricsError::InstallFailed(e) => {
                write!(f, "failed to install metrics recorder: {}", e)
            }
        }
    }
}

impl std::error::Error for MetricsError {}

// =============================================================================
// Business Metrics Helpers
// =============================================================================

/// Record a query against the dataset.
///
/// Increments `shelterfinder_queries_total` labelled by endpoint
/// (`list`, `nearest`, `nearest_by_zip`).
pub fn record_query(endpoint: &str) {
    metrics::counter!(
        "shelterfinder_queries_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

/// Record a failed query.
///
/// Increments `shelterfinder_queries_failed_total`; `reason` should come from
/// [`failure_reason`] so label values stay bounded.
pub fn record_query_failed(endpoint: &str, reason: &'static str) {
    metrics::counter!(
        "shelterfinder_queries_failed_total",
        "endpoint" => endpoint.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record how many shelters a query returned.
pub fn record_results_returned(count: usize, endpoint: &str) {
    metrics::histogram!(
        "shelterfinder_results_returned",
        "endpoint" => endpoint.to_string()
    )
    .record(count as f64);
}

/// Record the size of the cached dataset.
pub fn record_dataset_size(count: usize) {
    metrics::gauge!("shelterfinder_dataset_shelters").set(count as f64);
}

/// Bounded metric label for a library error.
pub fn failure_reason(error: &LibError) -> &'static str {
    match error {
        e if e.is_invalid_request() => "validation_error",
        LibError::GeocoderNotConfigured => "not_configured",
        LibError::Geocode(GeocodeError::NotFound { .. }) => "postal_code_not_found",
        LibError::Geocode(_) => "geocoding_failed",
        LibError::DataSourceNotFound { .. } => "data_unavailable",
        _ => "internal_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.path, "/metrics");
    }

    #[test]
    fn test_metrics_config_from_lookup() {
        let config = MetricsConfig::from_lookup(|key| match key {
            "METRICS_ENABLED" => Some("off".to_string()),
            "METRICS_PATH" => Some("/internal/metrics".to_string()),
            _ => None,
        });
        assert!(!config.enabled);
        assert_eq!(config.path, "/internal/metrics");

        let config = MetricsConfig::from_lookup(|key| {
            (key == "METRICS_PATH").then(|| "metrics".to_string())
        });
        assert!(config.enabled);
        assert_eq!(config.path, "/metrics");
    }

    #[test]
    fn test_metrics_handler_without_recorder() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let output = rt.block_on(async { metrics_handler().await });

        assert!(
            output.contains('#') || output.is_empty(),
            "metrics output should be Prometheus text or the not-initialized comment"
        );
    }

    #[test]
    fn test_business_metrics_record_without_recorder() {
        record_query("list");
        record_query_failed("nearest", "validation_error");
        record_results_returned(5, "nearest");
        record_dataset_size(1200);
    }

    #[test]
    fn test_failure_reason_labels() {
        assert_eq!(
            failure_reason(&LibError::InvalidBboxFormat { raw: "1".into() }),
            "validation_error"
        );
        assert_eq!(
            failure_reason(&LibError::GeocoderNotConfigured),
            "not_configured"
        );
        assert_eq!(
            failure_reason(&LibError::Geocode(GeocodeError::NotFound {
                postal_code: "1234567".into()
            })),
            "postal_code_not_found"
        );
        assert_eq!(
            failure_reason(&LibError::Geocode(GeocodeError::UpstreamStatus { status: 500 })),
            "geocoding_failed"
        );
        assert_eq!(
            failure_reason(&LibError::DataSourceNotFound { candidates: vec![] }),
            "data_unavailable"
        );
    }

    #[test]
    fn test_metrics_error_display() {
        assert_eq!(MetricsError::Disabled.to_string(), "metrics are disabled");
        assert_eq!(
            MetricsError::AlreadyInitialized.to_string(),
            "metrics recorder already initialized"
        );
        assert!(MetricsError::InstallFailed("test error".to_string())
            .to_string()
            .contains("test error"));
    }
}
