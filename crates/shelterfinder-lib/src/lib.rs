//! Shelterfinder library entry points.
//!
//! This crate locates the emergency-shelter CSV, normalizes its rows into
//! [`Shelter`] records, caches the result process-wide and answers list and
//! nearest-shelter queries. Higher-level consumers (the HTTP service) should
//! only depend on the items exported here instead of reimplementing behavior.

pub mod dataset;
pub mod error;
pub mod geo;
pub mod geocode;
pub mod ingest;
pub mod query;
pub mod schema;
pub mod shelter;

pub use dataset::{CsvDirectorySource, Dataset, DatasetProvider, DatasetSource, StaticSource};
pub use error::{Error, Result};
pub use geo::{distance_km, round_km, GeoPoint};
pub use geocode::{GeocodeError, Geocoder, GeocoderConfig, GoogleGeocoder};
pub use ingest::{load_from_dir, load_shelters, locate_data_file, read_shelters, IngestReport};
pub use query::{
    nearest_limit, validate_postal_code, AppliedFilters, BoundingBox, ListQuery, ListResult,
    Pagination, PostalCodeNearest, QueryEngine, RankedShelter,
};
pub use schema::SchemaVariant;
pub use shelter::{Shelter, SkipReason};
