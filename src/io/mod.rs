//! File-system collaborators: reading raw module exports and persisting results

pub mod loader;
pub mod store;

use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

pub use loader::{InMemoryLoader, ModuleLoader, ParquetModuleLoader, read_parquet};
pub use store::{FileStore, IndicatorMetadata, ResultStore, StoredIndicators};

/// Errors raised while reading inputs or writing results
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File-system error at a path
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// No data exists for the requested year
    #[error("No data for year {year} at {path}")]
    MissingYear {
        /// Requested year
        year: i32,
        /// Where the data was expected
        path: PathBuf,
    },

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Metadata serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
