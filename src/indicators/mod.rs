//! Indicator registry and calculator
//!
//! An indicator is a named function from the merged year table to an
//! aggregate result table. Functions return `Ok(None)` when the columns they
//! need are not in the table; that is a normal "not computable" outcome and is
//! kept apart from computation faults, which are `Err`.

pub mod aggregate;
pub mod builtin;
pub mod calculator;
pub mod registry;
pub mod source;

use std::sync::Arc;

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

pub use aggregate::{Aggregation, GroupedAggregation};
pub use calculator::IndicatorCalculator;
pub use registry::IndicatorRegistry;
pub use source::{DefinitionFile, IndicatorDefinition, IndicatorSource, RowFilter, StaticSource};

/// Errors raised by indicator lookup, computation and loading
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// No indicator is registered under the name
    #[error("Indicator '{0}' not found")]
    UnknownIndicator(String),

    /// An indicator function failed
    #[error("Indicator computation failed: {0}")]
    Computation(String),

    /// An external definition source could not be read
    #[error("Indicator source '{location}' is unavailable: {reason}")]
    SourceUnavailable {
        /// Where the source was looked for
        location: String,
        /// Underlying cause
        reason: String,
    },

    /// An external definition source was read but is not valid
    #[error("Indicator source '{location}' is malformed: {reason}")]
    MalformedSource {
        /// Source location
        location: String,
        /// What is wrong with it
        reason: String,
    },

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// Result alias for indicator operations
pub type Result<T> = std::result::Result<T, IndicatorError>;

/// Signature shared by every indicator
///
/// `Ok(None)` means the indicator cannot be computed from this table. Faults
/// should be returned as errors; a panic is caught by
/// [`IndicatorCalculator::calculate_all`] and recorded as a failure.
pub type IndicatorFn =
    Arc<dyn Fn(&RecordBatch, &IndicatorOptions) -> Result<Option<RecordBatch>> + Send + Sync>;

/// Wrap a closure or function as an [`IndicatorFn`]
pub fn indicator_fn<F>(f: F) -> IndicatorFn
where
    F: Fn(&RecordBatch, &IndicatorOptions) -> Result<Option<RecordBatch>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Per-call options passed to an indicator function
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorOptions {
    /// Expansion-factor column to weight with; each indicator has its own default
    pub weight_column: Option<String>,
    /// Grouping dimensions replacing the indicator's defaults
    pub group_by: Option<Vec<String>>,
}

impl IndicatorOptions {
    /// Use a specific weight column
    #[must_use]
    pub fn with_weight(mut self, column: impl Into<String>) -> Self {
        self.weight_column = Some(column.into());
        self
    }

    /// Use specific grouping dimensions
    #[must_use]
    pub fn with_group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Requested weight column, or the given default
    #[must_use]
    pub fn weight_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.weight_column.as_deref().unwrap_or(default)
    }

    /// Requested grouping dimensions, or the given defaults
    #[must_use]
    pub fn group_by_or(&self, defaults: &[&str]) -> Vec<String> {
        self.group_by.clone().unwrap_or_else(|| {
            defaults.iter().map(|d| (*d).to_string()).collect()
        })
    }
}

/// Result of one indicator within a batch calculation
#[derive(Debug, Clone)]
pub enum IndicatorOutcome {
    /// The indicator produced a table
    Computed(RecordBatch),
    /// The table lacks the columns the indicator needs
    NotComputable,
    /// The indicator is unknown or its computation failed
    Failed(String),
}

impl IndicatorOutcome {
    /// Result table, if computed
    #[must_use]
    pub const fn table(&self) -> Option<&RecordBatch> {
        match self {
            Self::Computed(table) => Some(table),
            _ => None,
        }
    }

    /// Whether a table was produced
    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }

    /// Whether the indicator failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<Result<Option<RecordBatch>>> for IndicatorOutcome {
    fn from(result: Result<Option<RecordBatch>>) -> Self {
        match result {
            Ok(Some(table)) => Self::Computed(table),
            Ok(None) => Self::NotComputable,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}
