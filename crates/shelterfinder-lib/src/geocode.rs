//! Postal-code geocoding.
//!
//! The query engine only depends on the [`Geocoder`] trait. [`GoogleGeocoder`]
//! is the production implementation backed by the Google Geocoding API.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::geo::GeoPoint;

/// Default Google Geocoding API endpoint.
pub const DEFAULT_GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Default upper bound for one geocoding request.
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed geocoding failures.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Connection failure, timeout or unreadable body.
    ///
    /// Built through [`GeocodeError::transport`], which strips the request
    /// URL so the API key never reaches error messages.
    #[error("geocoding request failed: {0}")]
    Transport(reqwest::Error),

    /// The service answered with a non-200 HTTP status.
    #[error("geocoding request failed with HTTP status {status}")]
    UpstreamStatus { status: u16 },

    /// The service refused the request (quota, credential, malformed request).
    #[error("geocoding request rejected: {status}{}", format_message(.message))]
    Rejected {
        status: String,
        message: Option<String>,
    },

    /// No location is known for the postal code.
    #[error("could not geocode postal code {postal_code}")]
    NotFound { postal_code: String },

    /// The response did not contain a usable location.
    #[error("unexpected geocoding response: {message}")]
    Parse { message: String },
}

impl GeocodeError {
    pub fn transport(err: reqwest::Error) -> Self {
        GeocodeError::Transport(err.without_url())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GeocodeError::NotFound { .. })
    }
}

/// Resolves a postal code to a coordinate.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, postal_code: &str) -> Result<GeoPoint, GeocodeError>;
}

/// Settings for [`GoogleGeocoder`].
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub api_key: String,
    pub endpoint: String,
    pub timeout: Duration,
}

impl GeocoderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_GEOCODE_ENDPOINT.to_string(),
            timeout: DEFAULT_GEOCODE_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Blocking client for the Google Geocoding API.
///
/// Calls block the current thread; async callers should run them on a
/// blocking pool.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: Client,
    config: GeocoderConfig,
}

impl GoogleGeocoder {
    pub fn new(config: GeocoderConfig) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent())
            .build()
            .map_err(GeocodeError::transport)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }
}

impl Geocoder for GoogleGeocoder {
    fn geocode(&self, postal_code: &str) -> Result<GeoPoint, GeocodeError> {
        debug!(postal_code, endpoint = %self.config.endpoint, "geocoding postal code");

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("address", postal_code), ("key", self.config.api_key.as_str())])
            .send()
            .map_err(GeocodeError::transport)?;

        if response.status() != StatusCode::OK {
            return Err(GeocodeError::UpstreamStatus {
                status: response.status().as_u16(),
            });
        }

        let body: GeocodeResponse = response.json().map_err(GeocodeError::transport)?;
        body.into_location(postal_code)
    }
}

fn format_message(message: &Option<String>) -> String {
    match message {
        Some(message) => format!(" ({message})"),
        None => String::new(),
    }
}

fn user_agent() -> String {
    format!("shelterfinder-lib/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

impl GeocodeResponse {
    fn into_location(self, postal_code: &str) -> Result<GeoPoint, GeocodeError> {
        match self.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => {
                return Err(GeocodeError::NotFound {
                    postal_code: postal_code.to_string(),
                })
            }
            _ => {
                return Err(GeocodeError::Rejected {
                    status: self.status,
                    message: self.error_message,
                })
            }
        }

        let first = self
            .results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound {
                postal_code: postal_code.to_string(),
            })?;

        let point = GeoPoint::new(first.geometry.location.lat, first.geometry.location.lng);
        if !point.is_valid() {
            return Err(GeocodeError::Parse {
                message: format!("location ({}, {}) out of range", point.lat, point.lon),
            });
        }
        Ok(point)
    }
}

/// Parse a raw Geocoding API JSON body.
pub fn parse_geocode_response(body: &str, postal_code: &str) -> Result<GeoPoint, GeocodeError> {
    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|err| GeocodeError::Parse {
            message: err.to_string(),
        })?;
    response.into_location(postal_code)
}
