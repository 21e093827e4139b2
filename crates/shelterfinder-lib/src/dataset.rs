//! Lazily loaded, process-wide shelter dataset.
//!
//! [`DatasetProvider`] owns a [`DatasetSource`] and a one-time initialization
//! guard. The first successful [`DatasetProvider::get`] stores the dataset;
//! every later call returns the same `Arc`. Concurrent first callers block on
//! the same initialization, so the source runs at most once per successful
//! load.
//!
//! A failed load is not remembered: the error is returned to the caller and
//! the next call tries the source again, so a data file that appears after
//! startup is picked up on the following request.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::error::Result;
use crate::ingest;
use crate::shelter::Shelter;

/// Immutable, ordered collection of shelters (CSV row order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    shelters: Vec<Shelter>,
}

impl Dataset {
    pub fn new(shelters: Vec<Shelter>) -> Self {
        Self { shelters }
    }

    pub fn shelters(&self) -> &[Shelter] {
        &self.shelters
    }

    pub fn len(&self) -> usize {
        self.shelters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shelters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Shelter> {
        self.shelters.iter()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Shelter;
    type IntoIter = std::slice::Iter<'a, Shelter>;

    fn into_iter(self) -> Self::IntoIter {
        self.shelters.iter()
    }
}

/// Something that can produce the full list of shelters.
pub trait DatasetSource: Send + Sync {
    fn load(&self) -> Result<Vec<Shelter>>;

    /// Human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Reads the first candidate CSV file found under a data root directory.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    root: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DatasetSource for CsvDirectorySource {
    fn load(&self) -> Result<Vec<Shelter>> {
        Ok(ingest::load_from_dir(&self.root)?.shelters)
    }

    fn describe(&self) -> String {
        format!("csv directory {}", self.root.display())
    }
}

/// Fixed in-memory shelters; useful for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    shelters: Vec<Shelter>,
}

impl StaticSource {
    pub fn new(shelters: Vec<Shelter>) -> Self {
        Self { shelters }
    }
}

impl DatasetSource for StaticSource {
    fn load(&self) -> Result<Vec<Shelter>> {
        Ok(self.shelters.clone())
    }

    fn describe(&self) -> String {
        format!("{} static shelters", self.shelters.len())
    }
}

/// Single-flight, memoizing holder of the dataset.
pub struct DatasetProvider {
    source: Box<dyn DatasetSource>,
    cell: OnceCell<Arc<Dataset>>,
}

impl DatasetProvider {
    pub fn new(source: impl DatasetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cell: OnceCell::new(),
        }
    }

    /// Provider backed by the CSV files under `root`.
    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(CsvDirectorySource::new(root))
    }

    /// Provider that already holds `shelters`; the source is never consulted.
    pub fn preloaded(shelters: Vec<Shelter>) -> Self {
        let provider = Self::new(StaticSource::new(shelters.clone()));
        let _ = provider.cell.set(Arc::new(Dataset::new(shelters)));
        provider
    }

    /// Return the dataset, loading it on first use.
    pub fn get(&self) -> Result<Arc<Dataset>> {
        self.cell
            .get_or_try_init(|| {
                let description = self.source.describe();
                match self.source.load() {
                    Ok(shelters) => {
                        info!(
                            source = %description,
                            shelters = shelters.len(),
                            "shelter dataset cached"
                        );
                        Ok(Arc::new(Dataset::new(shelters)))
                    }
                    Err(err) => {
                        warn!(source = %description, error = %err, "failed to load shelter dataset");
                        Err(err)
                    }
                }
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Number of cached shelters, without triggering a load.
    pub fn loaded_len(&self) -> Option<usize> {
        self.cell.get().map(|dataset| dataset.len())
    }
}

impl fmt::Debug for DatasetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetProvider")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
