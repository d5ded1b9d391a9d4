//! Loading raw module tables for a survey year
//!
//! Parquet exports are expected at `<base>/<year>/<file stem>.parquet`, with
//! the stem taken from [`ModuleKind::file_stem`]. A missing file yields an
//! absence marker rather than an error, as does a file that cannot be read.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::{Result, StorageError};
use crate::config::ModuleKind;
use crate::table::ModuleTables;
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Produces the raw module tables of a year
pub trait ModuleLoader {
    /// Load every module for a year, marking the ones not found as absent
    ///
    /// # Errors
    /// Returns an error only when the year as a whole cannot be read
    fn load_year(&self, year: i32) -> Result<ModuleTables>;
}

/// Reads module tables from per-year directories of Parquet files
#[derive(Debug, Clone)]
pub struct ParquetModuleLoader {
    base_dir: PathBuf,
}

impl ParquetModuleLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Expected path of one module's file
    #[must_use]
    pub fn module_path(&self, year: i32, kind: ModuleKind) -> PathBuf {
        self.base_dir
            .join(year.to_string())
            .join(format!("{}.parquet", kind.file_stem(year)))
    }
}

impl ModuleLoader for ParquetModuleLoader {
    fn load_year(&self, year: i32) -> Result<ModuleTables> {
        let year_dir = self.base_dir.join(year.to_string());
        if !year_dir.is_dir() {
            return Err(StorageError::MissingYear {
                year,
                path: year_dir,
            });
        }

        let mut tables = ModuleTables::new(year);
        for kind in ModuleKind::ALL {
            let path = self.module_path(year, kind);
            if !path.exists() {
                debug!("No {kind} file for {year} at {}", path.display());
                tables.mark_absent(kind);
                continue;
            }
            match read_parquet(&path) {
                Ok(batch) => tables.insert(kind, batch),
                Err(e) => {
                    log_warning(&format!("Could not read {kind} for {year}: {e}"), Some(&path));
                    tables.mark_absent(kind);
                }
            }
        }
        Ok(tables)
    }
}

/// Serves module tables held in memory, keyed by year
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    years: BTreeMap<i32, ModuleTables>,
}

impl InMemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a year's tables
    #[must_use]
    pub fn with_year(mut self, tables: ModuleTables) -> Self {
        self.years.insert(tables.year(), tables);
        self
    }
}

impl ModuleLoader for InMemoryLoader {
    fn load_year(&self, year: i32) -> Result<ModuleTables> {
        self.years
            .get(&year)
            .cloned()
            .ok_or_else(|| StorageError::MissingYear {
                year,
                path: PathBuf::from("<memory>"),
            })
    }
}

/// Read a whole Parquet file into a single record batch
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded
pub fn read_parquet(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path).map_err(|e| StorageError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;

    log_operation_complete("read", path, batch.num_rows(), Some(start.elapsed()));
    Ok(batch)
}
