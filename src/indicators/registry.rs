//! Name-to-function mapping of indicators.

use std::collections::BTreeMap;
use std::fmt;

use super::builtin::{
    EDUCATION_YEARS, EMPLOYMENT_RATE, HOUSEHOLD_HEADSHIP, HOUSEHOLD_SIZE, education_years,
    employment_rate, household_headship, household_size,
};
use super::{IndicatorFn, indicator_fn};

/// Registered indicators, iterated in name order
#[derive(Clone, Default)]
pub struct IndicatorRegistry {
    indicators: BTreeMap<String, IndicatorFn>,
}

impl IndicatorRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in indicators
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(HOUSEHOLD_SIZE, indicator_fn(household_size));
        registry.register(HOUSEHOLD_HEADSHIP, indicator_fn(household_headship));
        registry.register(EDUCATION_YEARS, indicator_fn(education_years));
        registry.register(EMPLOYMENT_RATE, indicator_fn(employment_rate));
        registry
    }

    /// Insert or replace an indicator, returning the one it replaced
    pub fn register(&mut self, name: impl Into<String>, function: IndicatorFn) -> Option<IndicatorFn> {
        self.indicators.insert(name.into(), function)
    }

    /// Merge entries into the registry; later entries win
    pub fn extend<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, IndicatorFn)>,
    {
        let mut count = 0;
        for (name, function) in entries {
            self.indicators.insert(name, function);
            count += 1;
        }
        count
    }

    /// Function registered under a name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndicatorFn> {
        self.indicators.get(name)
    }

    /// Whether a name is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.indicators.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.indicators.keys().cloned().collect()
    }

    /// Number of registered indicators
    #[must_use]
    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    /// Whether no indicator is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

impl fmt::Debug for IndicatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorRegistry")
            .field("indicators", &self.indicators.keys().collect::<Vec<_>>())
            .finish()
    }
}
