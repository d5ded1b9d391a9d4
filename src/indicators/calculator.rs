//! Runs registered indicators against one merged year table

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use log::{debug, error, info, warn};

use super::{
    IndicatorError, IndicatorFn, IndicatorOptions, IndicatorOutcome, IndicatorRegistry,
    IndicatorSource, Result,
};

/// Holds a merged table and the indicators that can be computed from it
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    data: RecordBatch,
    registry: IndicatorRegistry,
}

impl IndicatorCalculator {
    /// Create a calculator with an explicit baseline registry
    #[must_use]
    pub const fn new(data: RecordBatch, registry: IndicatorRegistry) -> Self {
        Self { data, registry }
    }

    /// Create a calculator seeded with the built-in indicators
    #[must_use]
    pub fn with_builtins(data: RecordBatch) -> Self {
        Self::new(data, IndicatorRegistry::builtin())
    }

    /// Table indicators are computed from
    #[must_use]
    pub const fn data(&self) -> &RecordBatch {
        &self.data
    }

    #[must_use]
    pub const fn registry(&self) -> &IndicatorRegistry {
        &self.registry
    }

    /// Register or replace an indicator
    pub fn register(&mut self, name: impl Into<String>, function: IndicatorFn) {
        let name = name.into();
        if self.registry.register(name.clone(), function).is_some() {
            debug!("Replaced indicator '{name}'");
        } else {
            debug!("Registered indicator '{name}'");
        }
    }

    /// Import every indicator from an external source
    ///
    /// A broken source leaves the registry unchanged; the error is logged and
    /// returned so the caller can report it.
    ///
    /// # Errors
    /// Returns the source's error if its indicators cannot be produced
    pub fn load_external(&mut self, source: &dyn IndicatorSource) -> Result<usize> {
        match source.indicators() {
            Ok(entries) => {
                let count = self.registry.extend(entries);
                info!("Loaded {count} indicators from source '{}'", source.name());
                Ok(count)
            }
            Err(e) => {
                warn!("Could not load indicators from source '{}': {e}", source.name());
                Err(e)
            }
        }
    }

    /// Compute one indicator
    ///
    /// `Ok(None)` means the table lacks the columns the indicator needs.
    ///
    /// # Errors
    /// - [`IndicatorError::UnknownIndicator`] if no indicator has this name
    /// - any error the indicator function itself returns
    pub fn calculate(&self, name: &str, options: &IndicatorOptions) -> Result<Option<RecordBatch>> {
        let function = self
            .registry
            .get(name)
            .ok_or_else(|| IndicatorError::UnknownIndicator(name.to_string()))?;

        let start = Instant::now();
        let result = function(&self.data, options)?;
        match &result {
            Some(table) => info!(
                "{name}: {} rows computed in {:?}",
                table.num_rows(),
                start.elapsed()
            ),
            None => info!("{name}: not computable, required columns missing"),
        }
        Ok(result)
    }

    /// Compute several indicators independently with default options
    ///
    /// With `None`, every registered indicator runs. A failing, panicking or
    /// unknown indicator is recorded as [`IndicatorOutcome::Failed`] and the
    /// rest still run.
    #[must_use]
    pub fn calculate_all(&self, names: Option<&[&str]>) -> BTreeMap<String, IndicatorOutcome> {
        let names: Vec<String> = match names {
            Some(names) => names.iter().map(|n| (*n).to_string()).collect(),
            None => self.registry.names(),
        };

        let options = IndicatorOptions::default();
        let mut outcomes = BTreeMap::new();
        for name in names {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| {
                self.calculate(&name, &options)
            })) {
                Ok(result) => IndicatorOutcome::from(result),
                Err(payload) => IndicatorOutcome::Failed(panic_reason(payload.as_ref())),
            };
            if let IndicatorOutcome::Failed(reason) = &outcome {
                error!("Error calculating {name}: {reason}");
            }
            outcomes.insert(name, outcome);
        }

        let computed = outcomes.values().filter(|o| o.is_computed()).count();
        info!("Calculated {computed}/{} indicators", outcomes.len());
        outcomes
    }

    /// Names of registered indicators
    #[must_use]
    pub fn list_indicators(&self) -> Vec<String> {
        self.registry.names()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|m| (*m).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("indicator panicked: {message}")
}
