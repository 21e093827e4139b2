//! Read-only queries over the cached shelter dataset.
//!
//! Raw request values (strings straight from a query string) are accepted
//! here so that every caller gets the same lenient parsing: non-numeric
//! limits and offsets fall back to their defaults instead of failing.

use std::num::IntErrorKind;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::dataset::{Dataset, DatasetProvider};
use crate::error::{Error, Result};
use crate::geo::{round_km, GeoPoint};
use crate::geocode::Geocoder;
use crate::shelter::Shelter;

/// Default page size for [`QueryEngine::list`].
pub const DEFAULT_LIST_LIMIT: usize = 100;
/// Largest page size for [`QueryEngine::list`].
pub const MAX_LIST_LIMIT: usize = 500;
/// Default result count for nearest queries.
pub const DEFAULT_NEAREST_LIMIT: usize = 5;
/// Largest result count for nearest queries.
pub const MAX_NEAREST_LIMIT: usize = 50;
/// Number of digits in a Japanese postal code (no hyphen).
pub const POSTAL_CODE_LENGTH: usize = 7;

/// Axis-aligned latitude/longitude rectangle, inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Parse `minLon,minLat,maxLon,maxLat`. Blank components are ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.len() != 4 {
            return Err(Error::InvalidBboxFormat {
                raw: raw.to_string(),
            });
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| Error::InvalidBboxValues {
                    raw: raw.to_string(),
                })?;
        }

        let [min_lon, min_lat, max_lon, max_lat] = values;
        if min_lat > max_lat || min_lon > max_lon {
            return Err(Error::InvalidBboxOrdering {
                raw: raw.to_string(),
            });
        }

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }

    pub fn contains(&self, shelter: &Shelter) -> bool {
        (self.min_lat..=self.max_lat).contains(&shelter.latitude())
            && (self.min_lon..=self.max_lon).contains(&shelter.longitude())
    }
}

/// Parse an integer leniently: surrounding whitespace is ignored and values
/// beyond `i64` saturate. Returns `None` for blank or non-numeric input.
pub fn parse_count(raw: Option<&str>) -> Option<i64> {
    let value = raw?.trim();
    match value.parse::<i64>() {
        Ok(parsed) => Some(parsed),
        Err(err) => match err.kind() {
            IntErrorKind::PosOverflow => Some(i64::MAX),
            IntErrorKind::NegOverflow => Some(i64::MIN),
            _ => None,
        },
    }
}

fn clamp_count(raw: Option<&str>, default: usize, min: usize, max: usize) -> usize {
    match parse_count(raw) {
        Some(value) => value.clamp(min as i64, max as i64) as usize,
        None => default,
    }
}

/// Page window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// `limit` is clamped to [1, 500] (default 100), `offset` to >= 0
    /// (default 0).
    pub fn from_raw(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self {
            limit: clamp_count(limit, DEFAULT_LIST_LIMIT, 1, MAX_LIST_LIMIT),
            offset: clamp_count(offset, 0, 0, i64::MAX as usize),
        }
    }

    fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = start.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

/// Clamp a raw nearest-query limit to [1, 50] (default 5).
pub fn nearest_limit(raw: Option<&str>) -> usize {
    clamp_count(raw, DEFAULT_NEAREST_LIMIT, 1, MAX_NEAREST_LIMIT)
}

/// Validate a postal code: seven ASCII digits after trimming.
pub fn validate_postal_code(raw: &str) -> Result<String> {
    let code = raw.trim();
    if code.len() == POSTAL_CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(Error::InvalidPostalCode {
            postal_code: raw.to_string(),
        })
    }
}

/// Raw list-query parameters.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub q: Option<String>,
    pub bbox: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Filters that were actually applied to a list query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<String>,
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    /// Matches after filtering, before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub applied: AppliedFilters,
    pub items: Vec<Shelter>,
}

impl ListResult {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// A shelter with its distance from a query origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedShelter {
    #[serde(flatten)]
    pub shelter: Shelter,
    /// Full-precision distance; serialized rounded to three decimals.
    #[serde(serialize_with = "serialize_km")]
    pub distance_km: f64,
}

fn serialize_km<S: Serializer>(distance: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_km(*distance))
}

/// Nearest-shelter results for a geocoded postal code.
#[derive(Debug, Clone, PartialEq)]
pub struct PostalCodeNearest {
    pub origin: GeoPoint,
    pub postal_code: String,
    pub items: Vec<RankedShelter>,
}

/// Keep shelters whose name or address contains `needle` (case-insensitive)
/// and that fall inside `bbox`. Both filters are optional.
pub fn filter_shelters<'a>(
    shelters: &'a [Shelter],
    needle: Option<&str>,
    bbox: Option<&BoundingBox>,
) -> Vec<&'a Shelter> {
    let needle = needle.map(str::to_lowercase);
    shelters
        .iter()
        .filter(|shelter| match &needle {
            Some(needle) => {
                shelter.name().to_lowercase().contains(needle.as_str())
                    || shelter.address().to_lowercase().contains(needle.as_str())
            }
            None => true,
        })
        .filter(|shelter| bbox.map_or(true, |bbox| bbox.contains(shelter)))
        .collect()
}

/// Every shelter paired with its distance from `origin`, nearest first.
///
/// The sort is stable and keyed on distance only, so equidistant shelters
/// keep their dataset order.
pub fn rank_by_distance(shelters: &[Shelter], origin: GeoPoint) -> Vec<RankedShelter> {
    let mut ranked: Vec<(usize, f64)> = shelters
        .iter()
        .enumerate()
        .map(|(index, shelter)| (index, origin.distance_km_to(&shelter.location())))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
        .into_iter()
        .map(|(index, distance_km)| RankedShelter {
            shelter: shelters[index].clone(),
            distance_km,
        })
        .collect()
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Query entry point shared by every request handler.
#[derive(Clone)]
pub struct QueryEngine {
    provider: Arc<DatasetProvider>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl QueryEngine {
    pub fn new(provider: Arc<DatasetProvider>, geocoder: Option<Arc<dyn Geocoder>>) -> Self {
        Self { provider, geocoder }
    }

    pub fn provider(&self) -> &DatasetProvider {
        &self.provider
    }

    /// Whether postal-code lookups are available.
    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    /// The cached dataset, loading it on first use.
    pub fn dataset(&self) -> Result<Arc<Dataset>> {
        self.provider.get()
    }

    /// Filter and paginate shelters.
    pub fn list(&self, query: &ListQuery) -> Result<ListResult> {
        let q = non_blank(query.q.as_deref());
        let bbox_raw = non_blank(query.bbox.as_deref());
        let bbox = bbox_raw.map(BoundingBox::parse).transpose()?;
        let page = Pagination::from_raw(query.limit.as_deref(), query.offset.as_deref());

        let dataset = self.dataset()?;
        let filtered = filter_shelters(dataset.shelters(), q, bbox.as_ref());
        let items: Vec<Shelter> = page.window(&filtered).iter().map(|s| (*s).clone()).collect();

        debug!(
            q = ?q,
            bbox = ?bbox_raw,
            total = filtered.len(),
            returned = items.len(),
            "listed shelters"
        );

        Ok(ListResult {
            total: filtered.len(),
            offset: page.offset,
            limit: page.limit,
            applied: AppliedFilters {
                q: q.map(str::to_string),
                bbox: bbox_raw.map(str::to_string),
            },
            items,
        })
    }

    /// The `limit` shelters closest to (`lat`, `lon`) across the whole dataset.
    pub fn nearest(&self, lat: f64, lon: f64, limit: usize) -> Result<Vec<RankedShelter>> {
        let origin = GeoPoint::new(lat, lon);
        if !origin.is_valid() {
            return Err(Error::InvalidCoordinate { lat, lon });
        }
        let limit = limit.clamp(1, MAX_NEAREST_LIMIT);

        let dataset = self.dataset()?;
        let mut ranked = rank_by_distance(dataset.shelters(), origin);
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Geocode `postal_code` and return the nearest shelters to it.
    pub fn nearest_by_postal_code(&self, postal_code: &str, limit: usize) -> Result<PostalCodeNearest> {
        let postal_code = validate_postal_code(postal_code)?;
        let geocoder = self.geocoder.as_ref().ok_or(Error::GeocoderNotConfigured)?;

        let origin = geocoder.geocode(&postal_code)?;
        debug!(postal_code = %postal_code, lat = origin.lat, lon = origin.lon, "postal code geocoded");

        let items = self.nearest(origin.lat, origin.lon, limit)?;
        Ok(PostalCodeNearest {
            origin,
            postal_code,
            items,
        })
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("provider", &self.provider)
            .field("has_geocoder", &self.geocoder.is_some())
            .finish()
    }
}
