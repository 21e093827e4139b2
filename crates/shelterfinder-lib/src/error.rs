use std::path::PathBuf;

use thiserror::Error;

use crate::geocode::GeocodeError;

/// Convenient result alias for the shelterfinder library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// None of the candidate data files exist.
    #[error("shelter data file not found. Expected one of: {}", format_candidates(.candidates))]
    DataSourceNotFound { candidates: Vec<PathBuf> },

    /// The CSV header row could not be read.
    #[error("failed to read CSV header from {source_name}: {message}")]
    InvalidHeader {
        source_name: String,
        message: String,
    },

    /// The bounding box did not contain exactly four components.
    #[error("invalid bbox format '{raw}': expected 'minLon,minLat,maxLon,maxLat'")]
    InvalidBboxFormat { raw: String },

    /// A bounding box component was not a finite number.
    #[error("invalid bbox values '{raw}': all components must be numbers")]
    InvalidBboxValues { raw: String },

    /// The bounding box minimum exceeded its maximum on some axis.
    #[error("invalid bbox ordering '{raw}': min must be <= max")]
    InvalidBboxOrdering { raw: String },

    /// The query origin was outside the valid latitude/longitude range.
    #[error("invalid coordinate ({lat}, {lon}): lat must be in [-90,90], lon in [-180,180]")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// The postal code was not exactly seven ASCII digits.
    #[error("invalid postal code format '{postal_code}': expected 7 digits without hyphen")]
    InvalidPostalCode { postal_code: String },

    /// Postal-code lookups were requested but no geocoding credential is configured.
    #[error("geocoding service not configured: missing API key")]
    GeocoderNotConfigured,

    /// The geocoding collaborator failed.
    #[error("geocoding failed: {0}")]
    Geocode(#[from] GeocodeError),

    /// Wrapper for CSV errors.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error was caused by invalid caller input.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Error::InvalidBboxFormat { .. }
                | Error::InvalidBboxValues { .. }
                | Error::InvalidBboxOrdering { .. }
                | Error::InvalidCoordinate { .. }
                | Error::InvalidPostalCode { .. }
        )
    }
}

fn format_candidates(candidates: &[PathBuf]) -> String {
    candidates
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
