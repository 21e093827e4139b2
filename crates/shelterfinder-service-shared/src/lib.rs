//! Shared infrastructure for the shelterfinder HTTP service.
//!
//! - [`AppState`]: query engine handle shared by every handler
//! - [`ServiceConfig`]: environment-driven configuration
//! - [`health`]: health check handlers for load balancers and Kubernetes probes
//! - [`ProblemDetails`]: RFC 9457 Problem Details for consistent error responses
//! - [`metrics`]: Prometheus metrics infrastructure
//! - [`logging`]: Structured JSON logging setup
//! - [`middleware`]: Request tracking and metrics middleware
//! - Query-string types with validation for each endpoint
//!
//! # Architecture
//!
//! Handlers stay thin; all data and query logic lives in `shelterfinder-lib`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  axum Handler                                               │
//! │  - Parse query string                                       │
//! │  - Validate parameters                                      │
//! │  - Run shelterfinder-lib queries on a blocking thread       │
//! │  - Format response                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides fixture-backed state and a stub
//! geocoder. Enable the `test-utils` feature to access it from dependent crates.

mod config;
mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod problem;
mod request;
mod state;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ServiceConfig, DEFAULT_HOST, DEFAULT_PORT};
pub use health::{health, health_live, health_ready, HealthStatus};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{
    failure_reason, init_metrics, metrics_handler, record_dataset_size, record_query,
    record_query_failed, record_results_returned, MetricsConfig, MetricsError,
};
pub use middleware::{extract_or_generate_request_id, MetricsLayer, RequestId, REQUEST_ID_HEADER};
pub use problem::{
    from_lib_error, ProblemDetails, PROBLEM_GEOCODING_FAILED, PROBLEM_INTERNAL_ERROR,
    PROBLEM_INVALID_REQUEST, PROBLEM_POSTAL_CODE_NOT_FOUND, PROBLEM_SERVICE_NOT_CONFIGURED,
    PROBLEM_SERVICE_UNAVAILABLE,
};
pub use request::{ListSheltersParams, NearestByZipParams, NearestParams, Validate};
pub use state::{AppState, AppStateError};
