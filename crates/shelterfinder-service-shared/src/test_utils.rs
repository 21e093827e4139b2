//! Test utilities for handler testing.
//!
//! Provides application state backed by the CSV fixtures under
//! `docs/fixtures` and a scriptable [`StubGeocoder`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shelterfinder_lib::{DatasetProvider, GeoPoint, GeocodeError, Geocoder};

use crate::state::AppState;

/// Directory holding the CSV fixtures.
pub const TEST_FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../docs/fixtures");

/// Origin returned by [`StubGeocoder::default`] (central Shinjuku).
pub const STUB_ORIGIN: GeoPoint = GeoPoint {
    lat: 35.6938,
    lon: 139.7034,
};

/// Canned geocoder outcome.
#[derive(Debug, Clone, Copy)]
pub enum StubOutcome {
    Found(GeoPoint),
    NotFound,
    UpstreamStatus(u16),
}

/// Geocoder double that returns a fixed outcome and counts its calls.
#[derive(Debug)]
pub struct StubGeocoder {
    outcome: StubOutcome,
    calls: AtomicUsize,
}

impl StubGeocoder {
    pub fn new(outcome: StubOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubGeocoder {
    fn default() -> Self {
        Self::new(StubOutcome::Found(STUB_ORIGIN))
    }
}

impl Geocoder for StubGeocoder {
    fn geocode(&self, postal_code: &str) -> Result<GeoPoint, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            StubOutcome::Found(point) => Ok(point),
            StubOutcome::NotFound => Err(GeocodeError::NotFound {
                postal_code: postal_code.to_string(),
            }),
            StubOutcome::UpstreamStatus(status) => Err(GeocodeError::UpstreamStatus { status }),
        }
    }
}

/// Absolute path to the fixture directory.
pub fn fixture_dir() -> PathBuf {
    PathBuf::from(TEST_FIXTURE_DIR)
}

/// Fresh state over the registry fixture, without geocoding.
///
/// Each call builds a new provider, so the dataset loads lazily per state.
pub fn test_state() -> AppState {
    AppState::from_components(DatasetProvider::from_dir(fixture_dir()), None)
}

/// Fresh state over the registry fixture with the given geocoder.
pub fn test_state_with_geocoder(geocoder: Arc<StubGeocoder>) -> AppState {
    let geocoder: Arc<dyn Geocoder> = geocoder;
    AppState::from_components(DatasetProvider::from_dir(fixture_dir()), Some(geocoder))
}

/// State whose data directory does not exist.
pub fn missing_data_state() -> AppState {
    AppState::from_components(
        DatasetProvider::from_dir(fixture_dir().join("does-not-exist")),
        None,
    )
}

/// Generate a unique request ID for testing.
pub fn test_request_id() -> String {
    format!("test-{}", uuid::Uuid::now_v7())
}
