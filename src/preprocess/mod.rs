//! Per-module preparation: column normalisation, value cleaning and validation
//!
//! Raw module tables from a loader pass through [`normalize_columns`], then
//! [`ModuleCleaner::clean`], then [`validate_module`]. Tables that fail
//! validation are marked absent rather than aborting the year.

pub mod clean;
pub mod normalize;
pub mod validate;

use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::config::{CleanerConfig, ModuleKind};
use crate::table::ModuleTables;

pub use clean::{CleanError, ModuleCleaner};
pub use normalize::normalize_columns;
pub use validate::{ValidationError, ValidationReport, validate_module};

/// Runs normalisation, cleaning and validation over module tables
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    cleaner: ModuleCleaner,
}

impl Preprocessor {
    /// Create a preprocessor with the given cleaner configuration
    #[must_use]
    pub const fn new(config: CleanerConfig) -> Self {
        Self {
            cleaner: ModuleCleaner::new(config),
        }
    }

    /// Normalise and clean one module table, returning it with its validation report
    pub fn prepare(
        &self,
        batch: &RecordBatch,
        kind: ModuleKind,
    ) -> clean::Result<(RecordBatch, ValidationReport)> {
        let normalized = normalize_columns(batch, kind)?;
        let cleaned = self.cleaner.clean(&normalized)?;
        let report = validate_module(&cleaned, kind);
        Ok((cleaned, report))
    }

    /// Prepare every present module of a year
    ///
    /// Modules failing validation are marked absent; absence markers from the
    /// loader are carried through unchanged.
    pub fn prepare_year(&self, raw: ModuleTables) -> clean::Result<ModuleTables> {
        let mut prepared = ModuleTables::new(raw.year());

        for (kind, table) in raw {
            let Some(table) = table else {
                prepared.mark_absent(kind);
                continue;
            };

            let (cleaned, report) = self.prepare(&table, kind)?;
            info!(
                "{kind}: {}x{} -> {}x{}",
                table.num_rows(),
                table.num_columns(),
                cleaned.num_rows(),
                cleaned.num_columns()
            );

            if report.passed() {
                prepared.insert(kind, cleaned);
            } else {
                warn!("Skipping module {kind}: failed validation");
                prepared.mark_absent(kind);
            }
        }

        Ok(prepared)
    }
}
