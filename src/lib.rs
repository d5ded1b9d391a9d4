//! Assembles the annual modules of a household survey into one analysis-ready
//! table per year and computes weighted indicators over it.
//!
//! The processing chain for a year is:
//!
//! 1. a [`io::ModuleLoader`] produces the raw module tables,
//! 2. [`preprocess::Preprocessor`] normalises, cleans and validates each one,
//! 3. [`merge::MergeEngine`] joins them under cardinality contracts,
//! 4. [`indicators::IndicatorCalculator`] computes registered indicators,
//! 5. a [`io::ResultStore`] persists the merged table and indicator results.
//!
//! [`pipeline::SurveyPipeline`] drives the chain over a range of years.

pub mod config;
pub mod error;
pub mod indicators;
pub mod io;
pub mod merge;
pub mod pipeline;
pub mod preprocess;
pub mod table;
pub mod utils;

// Core types
pub use config::{CleanerConfig, CoercionPolicy, MergeConfig, ModuleKind, SurveyConfig};
pub use error::{Result, SurveyError};
pub use table::ModuleTables;

// Stages
pub use indicators::{
    IndicatorCalculator, IndicatorFn, IndicatorOptions, IndicatorOutcome, IndicatorRegistry,
};
pub use merge::{MergeEngine, MergeReport, MergedYear};
pub use preprocess::{ModuleCleaner, Preprocessor, ValidationReport, validate_module};

// Collaborators
pub use io::{FileStore, ModuleLoader, ParquetModuleLoader, ResultStore};
pub use pipeline::{SurveyPipeline, YearSummary};

// Arrow types
pub use arrow::record_batch::RecordBatch;
