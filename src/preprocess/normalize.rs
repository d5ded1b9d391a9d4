//! Column name normalisation.

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{debug, warn};

use crate::config::{ModuleKind, YEAR_COLUMN, YEAR_VARIANTS};
use crate::table::with_column_names;

/// Standardise the column names of a module table
///
/// Names are trimmed and lower-cased, spellings of the year column are folded
/// to [`YEAR_COLUMN`], and the module's rename rules are applied. A rename is
/// skipped when its source is absent or when its target already exists.
/// The input batch is left untouched.
///
/// # Errors
/// Returns an error if the renamed batch cannot be rebuilt
pub fn normalize_columns(batch: &RecordBatch, kind: ModuleKind) -> Result<RecordBatch, ArrowError> {
    let mut names: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().trim().to_lowercase())
        .collect();

    if !names.iter().any(|n| n == YEAR_COLUMN) {
        if let Some(slot) = names
            .iter_mut()
            .find(|n| YEAR_VARIANTS.contains(&n.as_str()))
        {
            debug!("{kind}: folding year column '{slot}' to '{YEAR_COLUMN}'");
            *slot = YEAR_COLUMN.to_string();
        }
    }

    for (from, to) in kind.rename_rules() {
        let Some(position) = names.iter().position(|n| n == from) else {
            continue;
        };
        if names.iter().any(|n| n == to) {
            debug!("{kind}: keeping '{from}', '{to}' already present");
            continue;
        }
        names[position] = (*to).to_string();
    }

    let duplicates = names.iter().duplicates().collect_vec();
    if !duplicates.is_empty() {
        warn!("{kind}: duplicate column names after normalisation: {duplicates:?}");
    }

    with_column_names(batch, &names)
}
