//! Health check handlers.
//!
//! Provides `/health` (plain `{"status":"ok"}`), `/health/live` and
//! `/health/ready` endpoints for load balancers and Kubernetes probes.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::metrics::record_dataset_size;
use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator: "ok" or "not_ready: <reason>".
    pub status: String,

    /// Service name for identification.
    pub service: String,

    /// Service version from build-time.
    pub version: String,

    /// Number of shelters cached (for readiness check).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelters_loaded: Option<usize>,

    /// Whether postal-code lookups are configured (for readiness check).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_supported: Option<bool>,
}

impl HealthStatus {
    /// Create a healthy liveness status.
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            shelters_loaded: None,
            zip_supported: None,
        }
    }

    /// Create a ready status with dataset information.
    pub fn ready(service: &str, version: &str, shelters: usize, zip_supported: bool) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            shelters_loaded: Some(shelters),
            zip_supported: Some(zip_supported),
        }
    }

    /// Create a not-ready status.
    pub fn not_ready(service: &str, version: &str, reason: &str) -> Self {
        Self {
            status: format!("not_ready: {}", reason),
            service: service.to_string(),
            version: version.to_string(),
            shelters_loaded: None,
            zip_supported: None,
        }
    }
}

/// Basic health handler.
///
/// ```text
/// GET /health
/// {"status":"ok"}
/// ```
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Liveness probe handler.
///
/// Returns 200 OK if the service is running. Does not touch the dataset.
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler.
///
/// Forces the dataset load and returns 200 OK once at least one shelter is
/// cached; 503 when the data file is missing, unreadable or empty.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","service":"shelterfinder-service-shared","version":"0.1.0","shelters_loaded":5,"zip_supported":false}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let service = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");

    let engine = state.engine().clone();
    let loaded = tokio::task::spawn_blocking(move || engine.dataset()).await;

    let dataset = match loaded {
        Ok(Ok(dataset)) => dataset,
        Ok(Err(e)) => {
            let status = HealthStatus::not_ready(service, version, &e.to_string());
            return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "readiness check task failed");
            let status = HealthStatus::not_ready(service, version, "dataset load aborted");
            return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
        }
    };

    record_dataset_size(dataset.len());

    if dataset.is_empty() {
        let status = HealthStatus::not_ready(service, version, "no shelters loaded");
        return (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response();
    }

    let status = HealthStatus::ready(service, version, dataset.len(), state.zip_supported());
    (StatusCode::OK, Json(status)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use axum_test::TestServer;
    use shelterfinder_lib::DatasetProvider;

    fn server(provider: DatasetProvider) -> TestServer {
        let app = Router::new()
            .route("/health", get(health))
            .route("/health/live", get(health_live))
            .route("/health/ready", get(health_ready))
            .with_state(AppState::from_components(provider, None));
        TestServer::new(app).unwrap()
    }

    #[test]
    fn test_health_status_alive() {
        let status = HealthStatus::alive("test-service", "1.0.0");
        assert_eq!(status.status, "ok");
        assert_eq!(status.service, "test-service");
        assert!(status.shelters_loaded.is_none());
    }

    #[test]
    fn test_health_status_not_ready() {
        let status = HealthStatus::not_ready("test-service", "1.0.0", "no data");
        assert!(status.status.starts_with("not_ready:"));
        assert!(status.status.contains("no data"));
    }

    #[test]
    fn test_health_status_serialization() {
        let status = HealthStatus::alive("shelters", "0.1.0");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(!json.contains("shelters_loaded"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = server(DatasetProvider::preloaded(Vec::new()));
        let response = server.get("/health").await;
        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_ready_forces_load() {
        let dir = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures");
        let server = server(DatasetProvider::from_dir(dir));

        let response = server.get("/health/ready").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["shelters_loaded"], 5);
        assert_eq!(body["zip_supported"], false);
    }

    #[tokio::test]
    async fn test_ready_unavailable_without_data() {
        let server = server(DatasetProvider::from_dir("/nonexistent/shelterfinder"));
        let response = server.get("/health/ready").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json();
        assert!(body["status"].as_str().unwrap().contains("mergeFromCity_2.csv"));

        server.get("/health/live").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_ready_unavailable_when_empty() {
        let server = server(DatasetProvider::preloaded(Vec::new()));
        server
            .get("/health/ready")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }
}
