//! CSV ingestion: locate the shelter file, detect its header convention and
//! turn rows into [`Shelter`] records.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::schema::{ColumnMap, SchemaVariant};
use crate::shelter::{RowOutcome, Shelter, SkipReason};

/// Candidate data files, in lookup order, relative to the data root.
pub const DATA_FILE_CANDIDATES: &[&str] = &["mergeFromCity_2.csv", "13121_2.csv"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Outcome of ingesting one CSV source.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub variant: SchemaVariant,
    pub shelters: Vec<Shelter>,
    /// Data rows read, excluding the header.
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Candidate file paths under `root`, in lookup order.
pub fn data_file_candidates(root: &Path) -> Vec<PathBuf> {
    DATA_FILE_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .collect()
}

/// Return the first candidate data file that exists under `root`.
pub fn locate_data_file(root: &Path) -> Result<PathBuf> {
    let candidates = data_file_candidates(root);
    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(Error::DataSourceNotFound { candidates }),
    }
}

/// Locate and ingest the shelter file under `root`.
pub fn load_from_dir(root: &Path) -> Result<IngestReport> {
    let path = locate_data_file(root)?;
    load_shelters(&path)
}

/// Ingest a specific CSV file.
pub fn load_shelters(path: &Path) -> Result<IngestReport> {
    info!(path = %path.display(), "loading shelter data");
    let bytes = fs::read(path)?;
    let report = read_shelters_from_bytes(&bytes, &path.display().to_string())?;
    info!(
        path = %path.display(),
        variant = %report.variant,
        shelters = report.shelters.len(),
        skipped = report.rows_skipped,
        "shelter data loaded"
    );
    Ok(report)
}

/// Ingest CSV data from any reader.
pub fn read_shelters<R: Read>(mut reader: R) -> Result<IngestReport> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    read_shelters_from_bytes(&bytes, "reader")
}

fn read_shelters_from_bytes(bytes: &[u8], source_name: &str) -> Result<IngestReport> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(body);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|err| Error::InvalidHeader {
            source_name: source_name.to_string(),
            message: err.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let variant = SchemaVariant::detect(&headers);
    let columns = ColumnMap::resolve(variant, &headers);
    debug!(
        source = source_name,
        variant = %variant,
        columns = headers.len(),
        has_coordinates = columns.has_coordinates(),
        "detected shelter schema"
    );

    let mut shelters = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_skipped = 0usize;
    let mut record = StringRecord::new();

    loop {
        let outcome = match csv_reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => Shelter::from_fields(columns.fields(&record)),
            Err(err) if is_row_error(&err) => {
                RowOutcome::Skipped(SkipReason::Unreadable(err.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        rows_read += 1;

        match outcome {
            RowOutcome::Valid(shelter) => shelters.push(shelter),
            RowOutcome::Skipped(reason) => {
                rows_skipped += 1;
                // Header + 1-based data row.
                debug!(row = rows_read + 1, %reason, "skipping shelter row");
            }
        }
    }

    Ok(IngestReport {
        variant,
        shelters,
        rows_read,
        rows_skipped,
    })
}

/// Errors confined to a single record; anything else aborts ingestion.
fn is_row_error(err: &csv::Error) -> bool {
    matches!(
        err.kind(),
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_byte_order_mark() {
        let data = "\u{feff}施設・場所名,緯度,経度\nHall,35.0,139.0\n";
        let report = read_shelters(data.as_bytes()).expect("ingest");
        assert_eq!(report.variant, SchemaVariant::FacilityRegistry);
        assert_eq!(report.shelters.len(), 1);
    }

    #[test]
    fn counts_skipped_rows() {
        let data = "name,lat,lon\nA,35.0,139.0\nB,,139.0\nC,abc,139.0\nD,36.0,140.0\n";
        let report = read_shelters(data.as_bytes()).expect("ingest");
        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_skipped, 2);
        let names: Vec<&str> = report.shelters.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn invalid_utf8_row_is_skipped() {
        let mut data = b"name,lat,lon\nA,35.0,139.0\n".to_vec();
        data.extend_from_slice(b"\xff\xfe,35.0,139.0\n");
        data.extend_from_slice(b"C,36.0,140.0\n");

        let report = read_shelters(data.as_slice()).expect("ingest");
        assert_eq!(report.shelters.len(), 2);
        assert_eq!(report.rows_skipped, 1);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = read_shelters(&b""[..]).expect("ingest");
        assert!(report.shelters.is_empty());
        assert_eq!(report.variant, SchemaVariant::Generic);
    }
}
