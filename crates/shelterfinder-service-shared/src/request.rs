//! Query-string parameters and validation for HTTP endpoints.
//!
//! Every field is kept as a raw string so that axum's `Query` extractor never
//! rejects a request on type grounds; lenient parsing (defaults, clamping)
//! happens in the library.

use serde::{Deserialize, Serialize};

use shelterfinder_lib::{nearest_limit, validate_postal_code, ListQuery};

use crate::ProblemDetails;

/// Validation trait for request types.
///
/// Implementations should validate all fields and return a `ProblemDetails`
/// error for invalid input.
pub trait Validate {
    /// Validate the request, returning an error if invalid.
    ///
    /// The `request_id` is used to populate the `instance` field of any
    /// returned `ProblemDetails`.
    ///
    /// Returns a boxed `ProblemDetails` to avoid large `Result::Err` variants.
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>>;
}

/// `GET /shelters` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSheltersParams {
    pub q: Option<String>,
    /// `minLon,minLat,maxLon,maxLat`.
    pub bbox: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl From<ListSheltersParams> for ListQuery {
    fn from(params: ListSheltersParams) -> Self {
        ListQuery {
            q: params.q,
            bbox: params.bbox,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

/// `GET /nearest` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub limit: Option<String>,
    /// Alias for `limit`, used when `limit` is absent or empty.
    pub n: Option<String>,
}

impl NearestParams {
    /// Parsed origin, or `None` when either coordinate is missing or not a
    /// number. Range checks are left to the query engine.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = parse_number(self.lat.as_deref())?;
        let lon = parse_number(self.lon.as_deref())?;
        Some((lat, lon))
    }

    pub fn limit(&self) -> usize {
        let raw = self
            .limit
            .as_deref()
            .filter(|v| !v.is_empty())
            .or(self.n.as_deref());
        nearest_limit(raw)
    }

    /// Like [`NearestParams::coordinates`], with the 400 problem for
    /// missing or non-numeric values.
    pub fn origin(&self, request_id: &str) -> Result<(f64, f64), Box<ProblemDetails>> {
        self.coordinates().ok_or_else(|| {
            Box::new(ProblemDetails::bad_request(
                "lat and lon must be numbers",
                request_id,
            ))
        })
    }
}

impl Validate for NearestParams {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        self.origin(request_id).map(|_| ())
    }
}

/// `GET /nearest/by-zip` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearestByZipParams {
    /// Seven-digit postal code without hyphen.
    pub zip: Option<String>,
    pub limit: Option<String>,
}

impl NearestByZipParams {
    pub fn zip(&self) -> &str {
        self.zip.as_deref().unwrap_or("")
    }

    pub fn limit(&self) -> usize {
        nearest_limit(self.limit.as_deref())
    }
}

impl Validate for NearestByZipParams {
    fn validate(&self, request_id: &str) -> Result<(), Box<ProblemDetails>> {
        if validate_postal_code(self.zip()).is_err() {
            return Err(Box::new(ProblemDetails::bad_request(
                "zip must be 7 digits (no hyphen)",
                request_id,
            )));
        }
        Ok(())
    }
}

fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nearest(lat: Option<&str>, lon: Option<&str>) -> NearestParams {
        NearestParams {
            lat: lat.map(String::from),
            lon: lon.map(String::from),
            ..NearestParams::default()
        }
    }

    #[test]
    fn test_nearest_coordinates() {
        assert_eq!(
            nearest(Some("35.5"), Some(" 139.25")).coordinates(),
            Some((35.5, 139.25))
        );
        assert!(nearest(Some("abc"), Some("139")).coordinates().is_none());
        assert!(nearest(None, Some("139")).coordinates().is_none());
        assert!(nearest(Some("NaN"), Some("139")).coordinates().is_none());
    }

    #[test]
    fn test_nearest_validation_message() {
        let problem = nearest(Some("x"), Some("1")).validate("req-1").unwrap_err();
        assert_eq!(problem.status, 400);
        assert_eq!(problem.detail.as_deref(), Some("lat and lon must be numbers"));

        // Out-of-range values are numeric and pass here.
        assert!(nearest(Some("999"), Some("0")).validate("req-2").is_ok());
    }

    #[test]
    fn test_nearest_limit_alias() {
        let mut params = nearest(Some("0"), Some("0"));
        assert_eq!(params.limit(), 5);

        params.n = Some("7".into());
        assert_eq!(params.limit(), 7);

        params.limit = Some(String::new());
        assert_eq!(params.limit(), 7);

        params.limit = Some("2".into());
        assert_eq!(params.limit(), 2);

        params.limit = Some("500".into());
        assert_eq!(params.limit(), 50);
    }

    #[test]
    fn test_zip_validation() {
        let valid = NearestByZipParams {
            zip: Some("1600022".into()),
            limit: None,
        };
        assert!(valid.validate("req").is_ok());
        assert_eq!(valid.limit(), 5);

        for zip in [None, Some("160-0022"), Some("16000"), Some("abcdefg")] {
            let params = NearestByZipParams {
                zip: zip.map(String::from),
                limit: None,
            };
            let problem = params.validate("req").unwrap_err();
            assert_eq!(problem.detail.as_deref(), Some("zip must be 7 digits (no hyphen)"));
        }
    }

    #[test]
    fn test_list_params_into_query() {
        let params = ListSheltersParams {
            q: Some("park".into()),
            bbox: None,
            limit: Some("10".into()),
            offset: None,
        };
        let query = ListQuery::from(params);
        assert_eq!(query.q.as_deref(), Some("park"));
        assert_eq!(query.limit.as_deref(), Some("10"));
    }

    #[test]
    fn test_params_deserialize_from_query_string() {
        let params: NearestParams =
            serde_json::from_value(serde_json::json!({"lat": "35", "lon": "139", "n": "3"}))
                .unwrap();
        assert_eq!(params.limit(), 3);
    }
}
