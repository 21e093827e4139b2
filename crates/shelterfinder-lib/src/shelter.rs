//! The normalized shelter record and per-row parsing.
//!
//! Every CSV layout is reduced to [`ShelterFields`] first; [`Shelter::from_fields`]
//! then decides whether the row becomes a record or is skipped.

use std::fmt;

use serde::Serialize;

use crate::geo::GeoPoint;

/// Name used when a row carries no facility name ("unknown").
pub const UNKNOWN_NAME: &str = "不明";

/// A designated evacuation site.
///
/// Only constructed through [`Shelter::from_fields`] or [`Shelter::new`], both
/// of which reject non-finite coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shelter {
    id: String,
    name: String,
    address: String,
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lon")]
    longitude: f64,
    notes: String,
}

/// Raw field values for one row, already resolved from the CSV columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShelterFields<'a> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub address: Option<&'a str>,
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Why a row was excluded from the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingLatitude,
    MissingLongitude,
    InvalidLatitude(String),
    InvalidLongitude(String),
    /// The row could not be decoded at all (bad UTF-8, broken quoting).
    Unreadable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingLatitude => f.write_str("missing latitude"),
            SkipReason::MissingLongitude => f.write_str("missing longitude"),
            SkipReason::InvalidLatitude(raw) => write!(f, "invalid latitude '{raw}'"),
            SkipReason::InvalidLongitude(raw) => write!(f, "invalid longitude '{raw}'"),
            SkipReason::Unreadable(message) => write!(f, "unreadable row: {message}"),
        }
    }
}

/// Result of turning one CSV row into a shelter.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Valid(Shelter),
    Skipped(SkipReason),
}

impl RowOutcome {
    pub fn into_shelter(self) -> Option<Shelter> {
        match self {
            RowOutcome::Valid(shelter) => Some(shelter),
            RowOutcome::Skipped(_) => None,
        }
    }
}

/// Parse a numeric field, returning `None` for absent, blank, malformed or
/// non-finite values.
pub fn parse_field(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

impl Shelter {
    /// Build a shelter from already-parsed values; `None` unless both
    /// coordinates are finite.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        latitude: f64,
        longitude: f64,
        notes: impl Into<String>,
    ) -> Option<Self> {
        if !(latitude.is_finite() && longitude.is_finite()) {
            return None;
        }
        Some(Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            latitude,
            longitude,
            notes: notes.into(),
        })
    }

    /// Build a shelter from raw row values.
    ///
    /// Only the coordinates can reject a row; every other field falls back to
    /// an empty string, or [`UNKNOWN_NAME`] for the name.
    pub fn from_fields(fields: ShelterFields<'_>) -> RowOutcome {
        let latitude = match coordinate(fields.latitude) {
            Ok(value) => value,
            Err(None) => return RowOutcome::Skipped(SkipReason::MissingLatitude),
            Err(Some(raw)) => return RowOutcome::Skipped(SkipReason::InvalidLatitude(raw)),
        };
        let longitude = match coordinate(fields.longitude) {
            Ok(value) => value,
            Err(None) => return RowOutcome::Skipped(SkipReason::MissingLongitude),
            Err(Some(raw)) => return RowOutcome::Skipped(SkipReason::InvalidLongitude(raw)),
        };

        RowOutcome::Valid(Self {
            id: text(fields.id).to_string(),
            name: non_blank(fields.name).unwrap_or(UNKNOWN_NAME).to_string(),
            address: text(fields.address).to_string(),
            latitude,
            longitude,
            notes: text(fields.notes).to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// `Err(None)` when the value is absent, `Err(Some(raw))` when it is present
/// but not a finite number.
fn coordinate(raw: Option<&str>) -> Result<f64, Option<String>> {
    match non_blank(raw) {
        None => Err(None),
        Some(value) => parse_field(Some(value)).ok_or_else(|| Some(value.to_string())),
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.trim().is_empty())
}

fn text(raw: Option<&str>) -> &str {
    raw.unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(lat: Option<&'a str>, lon: Option<&'a str>) -> ShelterFields<'a> {
        ShelterFields {
            id: Some("X1"),
            name: Some("Shelter A"),
            address: Some("1 Main St"),
            latitude: lat,
            longitude: lon,
            notes: None,
        }
    }

    #[test]
    fn parse_field_is_soft() {
        assert_eq!(parse_field(Some("35.5")), Some(35.5));
        assert_eq!(parse_field(Some(" 139.25 ")), Some(139.25));
        assert_eq!(parse_field(Some("")), None);
        assert_eq!(parse_field(Some("north")), None);
        assert_eq!(parse_field(Some("NaN")), None);
        assert_eq!(parse_field(Some("inf")), None);
        assert_eq!(parse_field(None), None);
    }

    #[test]
    fn builds_shelter_from_valid_fields() {
        let shelter = Shelter::from_fields(fields(Some("35.0"), Some("139.0")))
            .into_shelter()
            .expect("valid row");
        assert_eq!(shelter.id(), "X1");
        assert_eq!(shelter.name(), "Shelter A");
        assert_eq!(shelter.address(), "1 Main St");
        assert_eq!(shelter.latitude(), 35.0);
        assert_eq!(shelter.longitude(), 139.0);
        assert_eq!(shelter.notes(), "");
    }

    #[test]
    fn blank_name_uses_sentinel() {
        let mut raw = fields(Some("35.0"), Some("139.0"));
        raw.name = Some("   ");
        let shelter = Shelter::from_fields(raw).into_shelter().expect("valid row");
        assert_eq!(shelter.name(), UNKNOWN_NAME);
    }

    #[test]
    fn coordinate_failures_are_reported() {
        assert_eq!(
            Shelter::from_fields(fields(None, Some("139.0"))),
            RowOutcome::Skipped(SkipReason::MissingLatitude)
        );
        assert_eq!(
            Shelter::from_fields(fields(Some("35.0"), Some(""))),
            RowOutcome::Skipped(SkipReason::MissingLongitude)
        );
        assert_eq!(
            Shelter::from_fields(fields(Some("abc"), Some("139.0"))),
            RowOutcome::Skipped(SkipReason::InvalidLatitude("abc".to_string()))
        );
    }

    #[test]
    fn serializes_with_short_coordinate_keys() {
        let shelter = Shelter::new("1", "Hall", "Addr", 35.0, 139.0, "note").unwrap();
        let json = serde_json::to_value(&shelter).unwrap();
        assert_eq!(json["lat"], 35.0);
        assert_eq!(json["lon"], 139.0);
        assert_eq!(json["notes"], "note");
        assert!(json.get("latitude").is_none());
    }

    #[test]
    fn new_rejects_non_finite_coordinates() {
        assert!(Shelter::new("p", "NaN shelter", "", f64::NAN, 139.0, "").is_none());
        assert!(Shelter::new("p", "Inf shelter", "", 35.0, f64::INFINITY, "").is_none());
        assert!(Shelter::new("p", "Both", "", f64::NEG_INFINITY, f64::NAN, "").is_none());

        let shelter = Shelter::new("p", "Edge", "", -90.0, 180.0, "").expect("finite");
        assert_eq!(shelter.location(), GeoPoint::new(-90.0, 180.0));
    }
}
