//! Year-by-year driver: load, prepare, merge, store, compute indicators

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::config::SurveyConfig;
use crate::error::{Result, SurveyError};
use crate::indicators::{IndicatorCalculator, IndicatorOutcome, IndicatorRegistry};
use crate::io::{ModuleLoader, ResultStore, StoredIndicators};
use crate::merge::{MergeEngine, MergeReport, MergedYear};
use crate::preprocess::Preprocessor;
use crate::table::ModuleTables;
use crate::utils::logging::{create_year_progress_bar, finish_progress_bar, log_shape};

/// What processing one year produced
#[derive(Debug, Clone)]
pub struct YearSummary {
    pub year: i32,
    /// Merge diagnostics
    pub merge: MergeReport,
    /// Where the merged table was written
    pub merged_path: PathBuf,
    /// Indicators that produced a table
    pub computed: Vec<String>,
    /// Indicators the merged table lacked columns for
    pub not_computable: Vec<String>,
    /// Indicators that failed, with reasons
    pub failed: BTreeMap<String, String>,
    /// Indicator files written
    pub stored: StoredIndicators,
    pub elapsed: Duration,
}

/// Runs the full processing chain for survey years
#[derive(Debug)]
pub struct SurveyPipeline<L, S> {
    loader: L,
    store: S,
    preprocessor: Preprocessor,
    engine: MergeEngine,
    registry: IndicatorRegistry,
}

impl<L: ModuleLoader, S: ResultStore> SurveyPipeline<L, S> {
    /// Create a pipeline computing the built-in indicators
    pub fn new(loader: L, store: S, config: SurveyConfig) -> Self {
        Self {
            loader,
            store,
            preprocessor: Preprocessor::new(config.cleaner),
            engine: MergeEngine::new(config.merge),
            registry: IndicatorRegistry::builtin(),
        }
    }

    /// Replace the indicator set computed for each year
    #[must_use]
    pub fn with_registry(mut self, registry: IndicatorRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Normalise, clean and validate every module of a year
    pub fn prepare_modules(&self, raw: ModuleTables) -> Result<ModuleTables> {
        Ok(self.preprocessor.prepare_year(raw)?)
    }

    /// Load, prepare and merge one year without storing anything
    ///
    /// # Errors
    /// - [`SurveyError::EmptyYear`] if the loader found no module for the year
    /// - any load, cleaning or merge error
    pub fn merge_year(&self, year: i32) -> Result<MergedYear> {
        let raw = self.loader.load_year(year)?;
        if raw.is_empty() {
            return Err(SurveyError::EmptyYear(year));
        }
        info!("Loaded {} modules for {year}", raw.len());

        let prepared = self.prepare_modules(raw)?;
        Ok(self.engine.merge(&prepared)?)
    }

    /// Process one year end to end
    ///
    /// The merged table is stored before indicators are computed, so a year
    /// whose indicators all fail still leaves its merged table behind.
    pub fn process_year(&self, year: i32, compute_indicators: bool) -> Result<YearSummary> {
        let start = Instant::now();
        info!("Processing year {year}");

        let MergedYear { table, report } = self.merge_year(year)?;
        log_shape(&format!("Merged {year}"), &table);
        let merged_path = self.store.save_merged(year, &table)?;

        let mut summary = YearSummary {
            year,
            merge: report,
            merged_path,
            computed: Vec::new(),
            not_computable: Vec::new(),
            failed: BTreeMap::new(),
            stored: StoredIndicators::default(),
            elapsed: Duration::ZERO,
        };

        if compute_indicators {
            let calculator = IndicatorCalculator::new(table, self.registry.clone());
            let outcomes = calculator.calculate_all(None);
            summary.stored = self.store.save_indicators(year, &outcomes)?;

            for (name, outcome) in outcomes {
                match outcome {
                    IndicatorOutcome::Computed(_) => summary.computed.push(name),
                    IndicatorOutcome::NotComputable => summary.not_computable.push(name),
                    IndicatorOutcome::Failed(reason) => {
                        summary.failed.insert(name, reason);
                    }
                }
            }
        }

        summary.elapsed = start.elapsed();
        info!("Year {year} completed in {:?}", summary.elapsed);
        Ok(summary)
    }

    /// Process several years, continuing past failures
    ///
    /// Returns whether each year succeeded.
    pub fn process_years<I>(&self, years: I, compute_indicators: bool) -> BTreeMap<i32, bool>
    where
        I: IntoIterator<Item = i32>,
    {
        let years: Vec<i32> = years.into_iter().collect();
        let pb = create_year_progress_bar(years.len() as u64, Some("Processing survey years"));

        let mut results = BTreeMap::new();
        for year in years {
            pb.set_message(format!("year {year}"));
            let ok = match self.process_year(year, compute_indicators) {
                Ok(_) => true,
                Err(e) => {
                    error!("Error processing {year}: {e}");
                    false
                }
            };
            results.insert(year, ok);
            pb.inc(1);
        }
        finish_progress_bar(&pb, Some("Done"));

        let succeeded = results.values().filter(|ok| **ok).count();
        let total = results.len();
        #[allow(clippy::cast_precision_loss)]
        let rate = if total == 0 { 0.0 } else { succeeded as f64 / total as f64 * 100.0 };
        info!("Years processed successfully: {succeeded}/{total} ({rate:.1}%)");

        let failed: Vec<i32> = results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(year, _)| *year)
            .collect();
        if !failed.is_empty() {
            warn!("Years with errors: {failed:?}");
        }
        results
    }
}
