//! Value cleaning for module tables
//!
//! Three passes run in order, each depending on the types left by the one
//! before it:
//!
//! 1. sentinel missing codes in numeric columns become nulls,
//! 2. text columns holding numbers are coerced to numeric types,
//! 3. remaining text is trimmed and upper-cased.
//!
//! Columns produced by coercion also go through missing-code recoding, so a
//! cleaned table never carries sentinels and cleaning it again changes nothing.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::kernels::cast;
use arrow::compute::kernels::nullif::nullif;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use log::debug;

use crate::config::{CleanerConfig, CoercionPolicy};
use crate::table::{is_numeric, is_text};

/// Errors raised while cleaning a module table
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// A numeric-looking text column held a value that does not parse
    #[error("Column '{column}' holds non-numeric value '{value}'")]
    Coercion {
        /// Column being coerced
        column: String,
        /// First value that failed to parse
        value: String,
    },
}

/// Result alias for cleaning operations
pub type Result<T> = std::result::Result<T, CleanError>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Parsed {
    Int(i64),
    Float(f64),
}

fn parse_number(value: &str) -> Option<Parsed> {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Parsed::Int(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Parsed::Float)
}

/// Cleans the values of normalised module tables
#[derive(Debug, Clone, Default)]
pub struct ModuleCleaner {
    config: CleanerConfig,
}

impl ModuleCleaner {
    /// Create a cleaner with the given configuration
    #[must_use]
    pub const fn new(config: CleanerConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &CleanerConfig {
        &self.config
    }

    /// Clean a table, returning a new batch
    ///
    /// # Errors
    /// Returns an error under [`CoercionPolicy::Strict`] when a numeric-looking
    /// text column holds an unparseable value, or if Arrow fails to rebuild a column
    pub fn clean(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let schema = batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();

        for (field, column) in fields.iter_mut().zip(columns.iter_mut()) {
            if is_numeric(field.data_type()) {
                *column = self.recode_missing(column)?;
            }
        }

        for (field, column) in fields.iter_mut().zip(columns.iter_mut()) {
            if !is_text(field.data_type()) {
                continue;
            }
            if let Some(coerced) = self.coerce_numeric(field.name(), column)? {
                debug!("Coerced text column '{}' to {}", field.name(), coerced.data_type());
                let recoded = self.recode_missing(&coerced)?;
                *field = Field::new(field.name(), recoded.data_type().clone(), true);
                *column = recoded;
            }
        }

        if self.config.normalize_text {
            for (field, column) in fields.iter_mut().zip(columns.iter_mut()) {
                if is_text(field.data_type()) {
                    *column = normalize_text(column)?;
                    *field = Field::new(field.name(), DataType::Utf8, field.is_nullable());
                }
            }
        }

        Ok(RecordBatch::try_new(
            Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
            columns,
        )?)
    }

    /// Replace sentinel missing codes in a numeric column with nulls
    ///
    /// Values outside the sentinel set are left exactly as they were.
    ///
    /// # Errors
    /// Returns an error if the column cannot be compared as floating point
    pub fn recode_missing(&self, column: &ArrayRef) -> Result<ArrayRef> {
        let values = cast::cast(column.as_ref(), &DataType::Float64)?;
        let values = values.as_primitive::<arrow::datatypes::Float64Type>();

        #[allow(clippy::cast_precision_loss)]
        let codes: Vec<f64> = self.config.missing_codes.iter().map(|c| *c as f64).collect();

        let mask: BooleanArray = values
            .iter()
            .map(|v| Some(v.is_some_and(|v| codes.contains(&v))))
            .collect();

        if mask.true_count() == 0 {
            return Ok(Arc::clone(column));
        }
        debug!("Recoding {} missing-code values to null", mask.true_count());
        Ok(nullif(column.as_ref(), &mask)?)
    }

    /// Try to reinterpret a text column as numeric
    ///
    /// Returns `None` when the column should stay text. A column is only a
    /// candidate when at least one non-null value parses; what happens to the
    /// values that do not parse depends on the [`CoercionPolicy`].
    fn coerce_numeric(&self, name: &str, column: &ArrayRef) -> Result<Option<ArrayRef>> {
        let text = cast::cast(column.as_ref(), &DataType::Utf8)?;
        let text: &StringArray = text.as_string::<i32>();

        let parsed: Vec<Option<Option<Parsed>>> = text
            .iter()
            .map(|v| v.map(parse_number))
            .collect();

        let parsed_count = parsed.iter().filter(|p| matches!(p, Some(Some(_)))).count();
        if parsed_count == 0 {
            return Ok(None);
        }

        let failure = parsed
            .iter()
            .position(|p| matches!(p, Some(None)))
            .map(|row| text.value(row).to_string());

        if let Some(value) = failure {
            match self.config.coercion {
                CoercionPolicy::KeepText => return Ok(None),
                CoercionPolicy::Strict => {
                    return Err(CleanError::Coercion {
                        column: name.to_string(),
                        value,
                    });
                }
                CoercionPolicy::NullOnFailure => {}
            }
        }

        let all_int = parsed
            .iter()
            .flatten()
            .flatten()
            .all(|p| matches!(p, Parsed::Int(_)));
        let values = parsed.into_iter().map(Option::flatten);

        let array: ArrayRef = if all_int {
            Arc::new(
                values
                    .map(|p| match p {
                        Some(Parsed::Int(i)) => Some(i),
                        _ => None,
                    })
                    .collect::<Int64Array>(),
            )
        } else {
            #[allow(clippy::cast_precision_loss)]
            Arc::new(
                values
                    .map(|p| match p {
                        Some(Parsed::Int(i)) => Some(i as f64),
                        Some(Parsed::Float(f)) => Some(f),
                        None => None,
                    })
                    .collect::<Float64Array>(),
            )
        };
        Ok(Some(array))
    }
}

fn normalize_text(column: &ArrayRef) -> Result<ArrayRef> {
    let text = cast::cast(column.as_ref(), &DataType::Utf8)?;
    let normalized: StringArray = text
        .as_string::<i32>()
        .iter()
        .map(|v| v.map(|s| s.trim().to_uppercase()))
        .collect();
    Ok(Arc::new(normalized))
}
