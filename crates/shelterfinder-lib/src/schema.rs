//! Column-naming conventions for shelter CSV files.
//!
//! Each supported header convention is described as data: an ordered list of
//! candidate column names per logical field. [`ColumnMap`] resolves those
//! candidates against a concrete header once per file, and then picks the
//! first candidate whose cell is non-blank for every row.

use std::fmt;

use csv::StringRecord;

use crate::shelter::ShelterFields;

/// Facility name column in the national registry export.
pub const COLUMN_FACILITY_NAME: &str = "施設・場所名";
/// Latitude column in the national registry export.
pub const COLUMN_LATITUDE: &str = "緯度";
/// Longitude column in the national registry export.
pub const COLUMN_LONGITUDE: &str = "経度";
/// Common identifier column in the national registry export.
pub const COLUMN_COMMON_ID: &str = "共通ID";
/// Address column in the national registry export.
pub const COLUMN_ADDRESS: &str = "住所";
/// Remarks column in the national registry export.
pub const COLUMN_REMARKS: &str = "備考";

/// Ordered candidate column names for each logical shelter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldAliases {
    pub id: &'static [&'static str],
    pub name: &'static [&'static str],
    pub address: &'static [&'static str],
    pub latitude: &'static [&'static str],
    pub longitude: &'static [&'static str],
    pub notes: &'static [&'static str],
}

const FACILITY_REGISTRY_ALIASES: FieldAliases = FieldAliases {
    id: &[COLUMN_COMMON_ID],
    name: &[COLUMN_FACILITY_NAME],
    address: &[COLUMN_ADDRESS],
    latitude: &[COLUMN_LATITUDE],
    longitude: &[COLUMN_LONGITUDE],
    notes: &[COLUMN_REMARKS],
};

const GENERIC_ALIASES: FieldAliases = FieldAliases {
    id: &["id", COLUMN_COMMON_ID],
    name: &["name", "place", COLUMN_FACILITY_NAME],
    address: &["address", COLUMN_ADDRESS],
    latitude: &["lat", "latitude", COLUMN_LATITUDE],
    longitude: &["lon", "lng", "longitude", COLUMN_LONGITUDE],
    notes: &["notes", COLUMN_REMARKS],
};

/// Supported CSV header conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// National facility registry export (Japanese column names).
    FacilityRegistry,
    /// Arbitrary merged extract; fields are looked up through alias chains.
    Generic,
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            SchemaVariant::FacilityRegistry => "facility_registry",
            SchemaVariant::Generic => "generic",
        };
        f.write_str(value)
    }
}

impl SchemaVariant {
    /// Pick the variant for a header row.
    ///
    /// The registry variant needs the facility name, latitude and longitude
    /// columns all present; anything else falls back to the generic variant.
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> Self {
        let has = |column: &str| headers.iter().any(|h| h.as_ref().trim() == column);
        if has(COLUMN_FACILITY_NAME) && has(COLUMN_LATITUDE) && has(COLUMN_LONGITUDE) {
            SchemaVariant::FacilityRegistry
        } else {
            SchemaVariant::Generic
        }
    }

    pub fn aliases(self) -> &'static FieldAliases {
        match self {
            SchemaVariant::FacilityRegistry => &FACILITY_REGISTRY_ALIASES,
            SchemaVariant::Generic => &GENERIC_ALIASES,
        }
    }
}

/// Column indices for each field, in alias priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    id: Vec<usize>,
    name: Vec<usize>,
    address: Vec<usize>,
    latitude: Vec<usize>,
    longitude: Vec<usize>,
    notes: Vec<usize>,
}

impl ColumnMap {
    /// Resolve a variant's aliases against a header row. Aliases missing from
    /// the header are dropped; duplicate headers resolve to the last column.
    pub fn resolve<S: AsRef<str>>(variant: SchemaVariant, headers: &[S]) -> Self {
        let aliases = variant.aliases();
        let lookup = |candidates: &[&str]| -> Vec<usize> {
            candidates
                .iter()
                .filter_map(|candidate| headers.iter().rposition(|h| h.as_ref().trim() == *candidate))
                .collect()
        };

        Self {
            id: lookup(aliases.id),
            name: lookup(aliases.name),
            address: lookup(aliases.address),
            latitude: lookup(aliases.latitude),
            longitude: lookup(aliases.longitude),
            notes: lookup(aliases.notes),
        }
    }

    /// Whether both coordinate fields can be found in this header.
    pub fn has_coordinates(&self) -> bool {
        !self.latitude.is_empty() && !self.longitude.is_empty()
    }

    /// Pick the raw values for one record.
    pub fn fields<'r>(&self, record: &'r StringRecord) -> ShelterFields<'r> {
        ShelterFields {
            id: first_present(record, &self.id),
            name: first_present(record, &self.name),
            address: first_present(record, &self.address),
            latitude: first_present(record, &self.latitude),
            longitude: first_present(record, &self.longitude),
            notes: first_present(record, &self.notes),
        }
    }
}

/// First non-blank cell among the candidate columns.
fn first_present<'r>(record: &'r StringRecord, columns: &[usize]) -> Option<&'r str> {
    columns
        .iter()
        .filter_map(|&index| record.get(index))
        .find(|value| !value.trim().is_empty())
}
