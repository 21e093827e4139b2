//! Application state for the HTTP service.
//!
//! This module provides the shared state structure that axum handlers use to
//! reach the query engine and, through it, the lazily loaded dataset.

use std::sync::Arc;

use shelterfinder_lib::{DatasetProvider, GeocodeError, Geocoder, GoogleGeocoder, QueryEngine};

use crate::config::ServiceConfig;
use crate::metrics::record_dataset_size;

/// Error during application state initialization.
#[derive(Debug)]
pub enum AppStateError {
    /// The geocoding client could not be built.
    GeocoderInit(GeocodeError),
}

impl std::fmt::Display for AppStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GeocoderInit(e) => write!(f, "failed to initialize geocoder: {}", e),
        }
    }
}

impl std::error::Error for AppStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::GeocoderInit(e) => Some(e),
        }
    }
}

impl From<GeocodeError> for AppStateError {
    fn from(err: GeocodeError) -> Self {
        Self::GeocoderInit(err)
    }
}

/// Shared application state for all axum handlers.
///
/// This struct is cheaply cloneable (using `Arc` internally) and should be
/// shared via axum's `State` extractor.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, extract::State};
/// use shelterfinder_service_shared::{AppState, ServiceConfig};
///
/// async fn handler(State(state): State<AppState>) {
///     let engine = state.engine();
///     // ... run a query on a blocking thread
/// }
///
/// let state = AppState::from_config(&ServiceConfig::from_env()).unwrap();
/// let app = Router::new()
///     .route("/shelters", get(handler))
///     .with_state(state);
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: QueryEngine,
}

impl AppState {
    /// Build application state from service configuration.
    ///
    /// The dataset is loaded lazily unless `config.preload` is set; a failed
    /// preload is logged and retried by the first request.
    ///
    /// Must not be called from inside an async runtime when a geocoder is
    /// configured, since the blocking HTTP client owns its own runtime.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, AppStateError> {
        let provider = DatasetProvider::from_dir(&config.data_dir);

        let geocoder: Option<Arc<dyn Geocoder>> = match &config.geocoder {
            Some(geocoder_config) => {
                tracing::info!(
                    endpoint = %geocoder_config.endpoint,
                    timeout_secs = geocoder_config.timeout.as_secs(),
                    "postal code geocoding enabled"
                );
                Some(Arc::new(GoogleGeocoder::new(geocoder_config.clone())?))
            }
            None => {
                tracing::info!("no geocoding credential configured, /nearest/by-zip disabled");
                None
            }
        };

        let state = Self::from_components(provider, geocoder);

        if config.preload {
            tracing::info!(data_dir = %config.data_dir.display(), "preloading shelter dataset");
            match state.engine().dataset() {
                Ok(dataset) => record_dataset_size(dataset.len()),
                Err(e) => {
                    tracing::warn!(error = %e, "dataset preload failed, will retry on first request")
                }
            }
        }

        Ok(state)
    }

    /// Create application state from pre-built components.
    ///
    /// This is useful for testing or when embedding fixture data.
    pub fn from_components(provider: DatasetProvider, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                engine: QueryEngine::new(Arc::new(provider), geocoder),
            }),
        }
    }

    /// Access the query engine.
    pub fn engine(&self) -> &QueryEngine {
        &self.inner.engine
    }

    /// Whether postal-code lookups are available.
    pub fn zip_supported(&self) -> bool {
        self.inner.engine.has_geocoder()
    }

    /// Number of cached shelters, without triggering a load.
    pub fn shelters_loaded(&self) -> Option<usize> {
        self.inner.engine.provider().loaded_len()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("shelters_loaded", &self.shelters_loaded())
            .field("zip_supported", &self.zip_supported())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelterfinder_lib::Shelter;
    use std::path::PathBuf;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../docs/fixtures")
    }

    #[test]
    fn test_app_state_from_components() {
        let shelter = Shelter::new("1", "A", "", 35.0, 139.0, "").unwrap();
        let provider = DatasetProvider::preloaded(vec![shelter]);
        let state = AppState::from_components(provider, None);

        assert_eq!(state.shelters_loaded(), Some(1));
        assert!(!state.zip_supported());
    }

    #[test]
    fn test_app_state_clone_shares_engine() {
        let state1 = AppState::from_components(DatasetProvider::from_dir(fixture_dir()), None);
        let state2 = state1.clone();

        state1.engine().dataset().expect("fixture loads");
        assert_eq!(state2.shelters_loaded(), Some(5));
    }

    #[test]
    fn test_from_config_is_lazy_by_default() {
        let config = ServiceConfig {
            data_dir: fixture_dir(),
            ..ServiceConfig::default()
        };
        let state = AppState::from_config(&config).expect("state");
        assert_eq!(state.shelters_loaded(), None);
    }

    #[test]
    fn test_from_config_preload() {
        let config = ServiceConfig {
            data_dir: fixture_dir(),
            preload: true,
            ..ServiceConfig::default()
        };
        let state = AppState::from_config(&config).expect("state");
        assert_eq!(state.shelters_loaded(), Some(5));
    }

    #[test]
    fn test_failed_preload_is_not_fatal() {
        let config = ServiceConfig {
            data_dir: PathBuf::from("/nonexistent/shelterfinder"),
            preload: true,
            ..ServiceConfig::default()
        };
        let state = AppState::from_config(&config).expect("state");
        assert_eq!(state.shelters_loaded(), None);
    }

    #[test]
    fn test_app_state_debug() {
        let state = AppState::from_components(DatasetProvider::from_dir(fixture_dir()), None);
        let debug = format!("{:?}", state);

        assert!(debug.contains("AppState"));
        assert!(debug.contains("shelters_loaded"));
        assert!(debug.contains("zip_supported"));
    }
}
