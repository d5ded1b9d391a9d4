//! Persisting merged tables and indicator results
//!
//! Layout under the store's base directory:
//!
//! ```text
//! processed/
//!   merged/survey_<year>.parquet
//!   indicators/<name>_<year>.csv
//!   indicators/metadata_<year>.json
//! ```

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::csv::WriterBuilder;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::info;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use super::{Result, StorageError, read_parquet};
use crate::indicators::IndicatorOutcome;
use crate::utils::logging::log_warning;

const MERGED_PREFIX: &str = "survey_";

/// Metadata written next to a year's indicator files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub year: i32,
    pub processed_at: DateTime<Utc>,
    /// Indicators that produced a table
    pub indicators: Vec<String>,
    /// Row count of each stored indicator
    pub rows: BTreeMap<String, usize>,
}

/// Where a year's indicators were written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredIndicators {
    /// CSV path per indicator
    pub files: BTreeMap<String, PathBuf>,
    /// Metadata file, absent when nothing was computed
    pub metadata: Option<PathBuf>,
}

/// Destination for pipeline results
pub trait ResultStore {
    /// Persist a merged year table
    ///
    /// # Errors
    /// Returns an error if the table cannot be written
    fn save_merged(&self, year: i32, table: &RecordBatch) -> Result<PathBuf>;

    /// Persist the computed indicators of a year; other outcomes are skipped
    ///
    /// # Errors
    /// Returns an error if a file cannot be written
    fn save_indicators(
        &self,
        year: i32,
        outcomes: &BTreeMap<String, IndicatorOutcome>,
    ) -> Result<StoredIndicators>;

    /// Read back a merged year table
    ///
    /// # Errors
    /// Returns [`StorageError::MissingYear`] if the year was never stored
    fn load_merged(&self, year: i32) -> Result<RecordBatch>;

    /// Years with a stored merged table, ascending
    ///
    /// # Errors
    /// Returns an error if the merged directory cannot be listed
    fn list_processed_years(&self) -> Result<Vec<i32>>;
}

/// Stores results as Parquet, CSV and JSON files under a base directory
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a store, creating its directories if needed
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        };
        for dir in [store.merged_dir(), store.indicators_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        }
        Ok(store)
    }

    #[must_use]
    pub fn merged_dir(&self) -> PathBuf {
        self.base_dir.join("processed").join("merged")
    }

    #[must_use]
    pub fn indicators_dir(&self) -> PathBuf {
        self.base_dir.join("processed").join("indicators")
    }

    fn merged_path(&self, year: i32) -> PathBuf {
        self.merged_dir().join(format!("{MERGED_PREFIX}{year}.parquet"))
    }

    fn write_csv(path: &Path, table: &RecordBatch) -> Result<()> {
        let file = File::create(path).map_err(|e| StorageError::io(path, e))?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        writer.write(table)?;
        Ok(())
    }
}

impl ResultStore for FileStore {
    fn save_merged(&self, year: i32, table: &RecordBatch) -> Result<PathBuf> {
        let path = self.merged_path(year);
        let file = File::create(&path).map_err(|e| StorageError::io(&path, e))?;
        let mut writer = ArrowWriter::try_new(file, table.schema(), None)?;
        writer.write(table)?;
        writer.close()?;

        info!("Saved merged table for {year} to {}", path.display());
        Ok(path)
    }

    fn save_indicators(
        &self,
        year: i32,
        outcomes: &BTreeMap<String, IndicatorOutcome>,
    ) -> Result<StoredIndicators> {
        let computed = outcomes
            .iter()
            .filter_map(|(name, outcome)| outcome.table().map(|table| (name, table)))
            .collect_vec();

        if computed.is_empty() {
            log_warning(
                &format!("No computed indicators to save for {year}"),
                Some(&self.indicators_dir()),
            );
            return Ok(StoredIndicators::default());
        }

        let mut stored = StoredIndicators::default();
        let mut rows = BTreeMap::new();
        for (name, table) in computed {
            let path = self.indicators_dir().join(format!("{name}_{year}.csv"));
            Self::write_csv(&path, table)?;
            rows.insert(name.clone(), table.num_rows());
            stored.files.insert(name.clone(), path);
        }

        let metadata = IndicatorMetadata {
            year,
            processed_at: Utc::now(),
            indicators: rows.keys().cloned().collect(),
            rows,
        };
        let metadata_path = self.indicators_dir().join(format!("metadata_{year}.json"));
        let file = File::create(&metadata_path).map_err(|e| StorageError::io(&metadata_path, e))?;
        serde_json::to_writer_pretty(file, &metadata)?;

        info!(
            "Saved {} indicators for {year} to {}",
            stored.files.len(),
            self.indicators_dir().display()
        );
        stored.metadata = Some(metadata_path);
        Ok(stored)
    }

    fn load_merged(&self, year: i32) -> Result<RecordBatch> {
        let path = self.merged_path(year);
        if !path.exists() {
            return Err(StorageError::MissingYear { year, path });
        }
        read_parquet(&path)
    }

    fn list_processed_years(&self) -> Result<Vec<i32>> {
        let dir = self.merged_dir();
        let entries = fs::read_dir(&dir).map_err(|e| StorageError::io(&dir, e))?;

        let years = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.strip_prefix(MERGED_PREFIX))
                    .and_then(|year| year.parse::<i32>().ok())
            })
            .sorted()
            .collect_vec();
        Ok(years)
    }
}
