//! Emergency shelter lookup HTTP service.
//!
//! # Endpoints
//!
//! - `GET /` - Service name, version and whether postal-code lookups work
//! - `GET /shelters` - Filter (`q`, `bbox`) and paginate (`limit`, `offset`) shelters
//! - `GET /nearest` - Nearest shelters to `lat`/`lon` (`limit` or `n`)
//! - `GET /nearest/by-zip` - Nearest shelters to a geocoded postal code (`zip`, `limit`)
//! - `GET /health`, `/health/live`, `/health/ready` - Health checks
//! - `GET /metrics` - Prometheus metrics endpoint
//!
//! Queries run on the blocking thread pool: the first one may read the CSV
//! and postal-code lookups use a blocking HTTP client.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

use shelterfinder_lib::{AppliedFilters, ListQuery, QueryEngine, RankedShelter, Shelter};
use shelterfinder_service_shared::{
    failure_reason, from_lib_error, health, health_live, health_ready, metrics_handler,
    record_dataset_size, record_query, record_query_failed, record_results_returned, AppState,
    ListSheltersParams, MetricsConfig, MetricsLayer, NearestByZipParams, NearestParams,
    ProblemDetails, RequestId, Validate,
};

/// Service name reported by `GET /`.
pub const SERVICE_NAME: &str = "shelterfinder";

/// `Cache-Control` applied to responses that do not set their own.
pub const CACHE_CONTROL_VALUE: &str = "public, max-age=60";

const ROUTES: &[&str] = &[
    "/",
    "/health",
    "/health/live",
    "/health/ready",
    "/shelters",
    "/nearest",
    "/nearest/by-zip",
];

/// `GET /` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
    zip_supported: bool,
}

/// `GET /shelters` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SheltersResponse {
    total: usize,
    count: usize,
    offset: usize,
    limit: usize,
    applied_filters: AppliedFilters,
    items: Vec<Shelter>,
}

/// Query origin echoed back to the caller.
#[derive(Debug, Serialize)]
struct Origin {
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
}

/// `GET /nearest` body.
#[derive(Debug, Serialize)]
struct NearestResponse {
    origin: Origin,
    limit: usize,
    items: Vec<RankedShelter>,
}

/// `GET /nearest/by-zip` body.
#[derive(Debug, Serialize)]
struct NearestByZipResponse {
    origin: Origin,
    items: Vec<RankedShelter>,
}

/// HTTP response - either success or RFC 9457 error.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Response<T> {
    Success(T),
    Error(ProblemDetails),
}

impl<T: Serialize> IntoResponse for Response<T> {
    fn into_response(self) -> axum::response::Response {
        match self {
            Response::Success(data) => (StatusCode::OK, Json(data)).into_response(),
            Response::Error(problem) => problem.into_response(),
        }
    }
}

impl<T> From<Box<ProblemDetails>> for Response<T> {
    fn from(problem: Box<ProblemDetails>) -> Self {
        Response::Error(*problem)
    }
}

/// Build the service router.
///
/// The metrics endpoint is mounted at `metrics.path` when metrics are
/// enabled and the path does not shadow a service route.
pub fn build_router(state: AppState, metrics: &MetricsConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/shelters", get(list_shelters))
        .route("/nearest", get(nearest))
        .route("/nearest/by-zip", get(nearest_by_zip));

    let mut metrics_layer = MetricsLayer::new();
    if metrics.enabled {
        if ROUTES.contains(&metrics.path.as_str()) {
            warn!(path = %metrics.path, "metrics path collides with a service route, not mounted");
        } else {
            router = router.route(&metrics.path, get(metrics_handler));
            metrics_layer = metrics_layer.with_metrics_path(metrics.path.as_str());
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_VALUE),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(cors)
        .layer(metrics_layer)
        .with_state(state)
}

/// Run a query on the blocking pool, recording metrics and mapping errors.
async fn run_query<T, F>(
    state: &AppState,
    endpoint: &'static str,
    request_id: &RequestId,
    query: F,
) -> Result<T, ProblemDetails>
where
    F: FnOnce(&QueryEngine) -> shelterfinder_lib::Result<T> + Send + 'static,
    T: Send + 'static,
{
    record_query(endpoint);

    let engine = state.engine().clone();
    let outcome = tokio::task::spawn_blocking(move || query(&engine)).await;

    if let Some(count) = state.shelters_loaded() {
        record_dataset_size(count);
    }

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            let reason = failure_reason(&e);
            record_query_failed(endpoint, reason);
            if e.is_invalid_request() {
                warn!(endpoint, reason, error = %e, "rejected query");
            } else {
                error!(endpoint, reason, error = %e, "query failed");
            }
            Err(from_lib_error(&e, request_id.as_str()))
        }
        Err(e) => {
            record_query_failed(endpoint, "internal_error");
            error!(endpoint, error = %e, "query task failed");
            Err(ProblemDetails::internal_error(
                "query task failed",
                request_id.as_str(),
            ))
        }
    }
}

/// Handle `GET /`.
async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        zip_supported: state.zip_supported(),
    })
}

/// Handle `GET /shelters`.
async fn list_shelters(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<ListSheltersParams>,
) -> Response<SheltersResponse> {
    let query = ListQuery::from(params);
    let result = match run_query(&state, "list", &request_id, move |engine| {
        engine.list(&query)
    })
    .await
    {
        Ok(result) => result,
        Err(problem) => return Response::Error(problem),
    };

    record_results_returned(result.count(), "list");
    info!(total = result.total, count = result.count(), "listed shelters");

    Response::Success(SheltersResponse {
        total: result.total,
        count: result.count(),
        offset: result.offset,
        limit: result.limit,
        applied_filters: result.applied,
        items: result.items,
    })
}

/// Handle `GET /nearest`.
async fn nearest(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<NearestParams>,
) -> Response<NearestResponse> {
    let (lat, lon) = match params.origin(request_id.as_str()) {
        Ok(origin) => origin,
        Err(problem) => {
            record_query_failed("nearest", "validation_error");
            return problem.into();
        }
    };
    let limit = params.limit();

    let items = match run_query(&state, "nearest", &request_id, move |engine| {
        engine.nearest(lat, lon, limit)
    })
    .await
    {
        Ok(items) => items,
        Err(problem) => return Response::Error(problem),
    };

    record_results_returned(items.len(), "nearest");
    info!(lat, lon, limit, returned = items.len(), "ranked nearest shelters");

    Response::Success(NearestResponse {
        origin: Origin {
            lat,
            lon,
            zip: None,
        },
        limit,
        items,
    })
}

/// Handle `GET /nearest/by-zip`.
async fn nearest_by_zip(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(params): Query<NearestByZipParams>,
) -> Response<NearestByZipResponse> {
    if let Err(problem) = params.validate(request_id.as_str()) {
        record_query_failed("nearest_by_zip", "validation_error");
        return problem.into();
    }

    let zip = params.zip().to_string();
    let limit = params.limit();
    let result = match run_query(&state, "nearest_by_zip", &request_id, move |engine| {
        engine.nearest_by_postal_code(&zip, limit)
    })
    .await
    {
        Ok(result) => result,
        Err(problem) => return Response::Error(problem),
    };

    record_results_returned(result.items.len(), "nearest_by_zip");
    info!(
        zip = %result.postal_code,
        lat = result.origin.lat,
        lon = result.origin.lon,
        returned = result.items.len(),
        "ranked nearest shelters for postal code"
    );

    Response::Success(NearestByZipResponse {
        origin: Origin {
            lat: result.origin.lat,
            lon: result.origin.lon,
            zip: Some(result.postal_code),
        },
        items: result.items,
    })
}
