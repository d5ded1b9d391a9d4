//! Crate-level error type
//!
//! Each stage has its own error enum; [`SurveyError`] wraps them so the
//! pipeline and its callers can propagate any of them with `?`.

use crate::indicators::IndicatorError;
use crate::io::StorageError;
use crate::merge::MergeError;
use crate::preprocess::{CleanError, ValidationError};

/// Any error raised while processing survey data
#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    /// Cleaning a module table failed
    #[error(transparent)]
    Clean(#[from] CleanError),

    /// A module table failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Merging a year's modules failed
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Looking up or computing an indicator failed
    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    /// Reading inputs or writing results failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A year had no module tables at all
    #[error("No module data found for year {0}")]
    EmptyYear(i32),
}

impl SurveyError {
    /// Whether the error is a merge cardinality violation
    #[must_use]
    pub const fn is_cardinality_violation(&self) -> bool {
        matches!(self, Self::Merge(e) if e.is_cardinality_violation())
    }
}

/// Result type for survey operations
pub type Result<T> = std::result::Result<T, SurveyError>;
