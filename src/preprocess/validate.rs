//! Key-column validation for module tables.

use arrow::record_batch::RecordBatch;
use log::warn;

use crate::config::ModuleKind;

/// Errors raised when a module table cannot take part in a merge
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// One or more declared key columns are absent
    #[error("Module {module} is missing key columns: {missing:?}")]
    MissingKeyColumns {
        /// Module that failed validation
        module: ModuleKind,
        /// Key columns that were not found
        missing: Vec<String>,
    },
}

/// Outcome of validating one module table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Module that was validated
    pub module: ModuleKind,
    /// Declared key columns not present in the table
    pub missing_keys: Vec<String>,
    /// Expected analytic variables not present in the table
    pub missing_critical: Vec<String>,
}

impl ValidationReport {
    /// Whether every key column is present
    #[must_use]
    pub fn passed(&self) -> bool {
        self.missing_keys.is_empty()
    }

    /// Convert a failed report into a [`ValidationError`]
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.passed() {
            Ok(())
        } else {
            Err(ValidationError::MissingKeyColumns {
                module: self.module,
                missing: self.missing_keys,
            })
        }
    }
}

/// Check that a module table carries the key columns declared for its module
///
/// Missing critical variables are logged but never fail validation.
#[must_use]
pub fn validate_module(batch: &RecordBatch, kind: ModuleKind) -> ValidationReport {
    let schema = batch.schema();
    let absent = |names: &[&str]| -> Vec<String> {
        names
            .iter()
            .filter(|name| schema.field_with_name(name).is_err())
            .map(|name| (*name).to_string())
            .collect()
    };

    let report = ValidationReport {
        module: kind,
        missing_keys: absent(kind.key_columns()),
        missing_critical: absent(kind.critical_vars()),
    };

    if !report.passed() {
        warn!("Module {kind} is missing key columns: {:?}", report.missing_keys);
    }
    if !report.missing_critical.is_empty() {
        warn!(
            "Module {kind} is missing analysis variables: {:?}",
            report.missing_critical
        );
    }

    report
}
