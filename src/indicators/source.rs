//! External indicator sources
//!
//! A source exposes a named collection of indicator functions that a
//! calculator imports wholesale. [`StaticSource`] wraps functions built in
//! Rust; [`DefinitionFile`] compiles declarative JSON definitions into
//! grouped aggregations.
//!
//! ```json
//! {
//!   "indicators": [
//!     {
//!       "name": "heads_by_domain",
//!       "group_by": ["year", "dominio"],
//!       "metric": "mieperho",
//!       "aggregation": "mean",
//!       "weight": "factor07_sum",
//!       "filter": { "column": "p203", "equals": 1 }
//!     }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::Float64Array;
use arrow::record_batch::RecordBatch;
use log::debug;
use serde::{Deserialize, Serialize};

use super::{
    Aggregation, GroupedAggregation, IndicatorError, IndicatorFn, IndicatorOptions, Result,
    indicator_fn,
};
use crate::table::{filter_rows, find_weight_column, resolve_column, resolve_columns, with_column};

const ROW_MARKER: &str = "__row";

/// A named collection of indicator functions
pub trait IndicatorSource {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Every indicator the source provides
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or is not valid
    fn indicators(&self) -> Result<Vec<(String, IndicatorFn)>>;
}

/// Indicators supplied directly as Rust functions
#[derive(Clone)]
pub struct StaticSource {
    name: String,
    entries: Vec<(String, IndicatorFn)>,
}

impl StaticSource {
    /// Create an empty source with a display name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Add an indicator to the source
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, function: IndicatorFn) -> Self {
        self.entries.push((name.into(), function));
        self
    }
}

impl IndicatorSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn indicators(&self) -> Result<Vec<(String, IndicatorFn)>> {
        Ok(self.entries.clone())
    }
}

/// Keep only rows where a column equals a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
    /// Column compared, resolved like any analytic column
    pub column: String,
    /// Value a row must hold to be kept
    pub equals: f64,
}

/// One declarative indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    /// Registry name
    pub name: String,
    /// Grouping dimensions
    pub group_by: Vec<String>,
    /// Column to aggregate; optional only for `count`
    #[serde(default)]
    pub metric: Option<String>,
    /// Reduction applied to the metric
    pub aggregation: Aggregation,
    /// Expansion factor summed alongside the metric
    #[serde(default)]
    pub weight: Option<String>,
    /// Row filter applied before grouping
    #[serde(default)]
    pub filter: Option<RowFilter>,
    /// Output column name; defaults to `<aggregation>_<metric>`
    #[serde(default)]
    pub output: Option<String>,
}

impl IndicatorDefinition {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("indicator name is empty".to_string());
        }
        if self.group_by.is_empty() {
            return Err(format!("indicator '{}' has no group_by columns", self.name));
        }
        if self.metric.is_none() && self.aggregation != Aggregation::Count {
            return Err(format!(
                "indicator '{}' needs a metric for {} aggregation",
                self.name, self.aggregation
            ));
        }
        Ok(())
    }

    fn output_name(&self) -> String {
        self.output.clone().unwrap_or_else(|| match &self.metric {
            Some(metric) => format!("{}_{metric}", self.aggregation),
            None => self.aggregation.to_string(),
        })
    }

    /// Evaluate the definition against a table
    ///
    /// Call-time options override the definition's weight and grouping.
    ///
    /// # Errors
    /// Returns an error if filtering or aggregation fails
    pub fn evaluate(
        &self,
        data: &RecordBatch,
        options: &IndicatorOptions,
    ) -> Result<Option<RecordBatch>> {
        let schema = data.schema();
        let group_by = options.group_by.clone().unwrap_or_else(|| self.group_by.clone());
        if resolve_columns(&schema, &group_by).is_none() {
            debug!("{}: grouping dimensions {group_by:?} not all present", self.name);
            return Ok(None);
        }

        let filtered = match &self.filter {
            Some(filter) => {
                let Some(column) = resolve_column(&schema, &filter.column) else {
                    return Ok(None);
                };
                filter_rows(data, &column, |v| v == filter.equals)?
            }
            None => data.clone(),
        };

        // Without a metric, rows are counted through a marker that is never null
        let (filtered, metric) = match &self.metric {
            Some(metric) => match resolve_column(&schema, metric) {
                Some(_) => (filtered, metric.clone()),
                None => return Ok(None),
            },
            None => {
                let marker = Float64Array::from(vec![1.0; filtered.num_rows()]);
                let marked = with_column(&filtered, ROW_MARKER, Arc::new(marker))?;
                (marked, ROW_MARKER.to_string())
            }
        };

        let mut aggregation = GroupedAggregation::new(group_by)
            .metric(metric, self.aggregation, self.output_name());

        let weight = options.weight_column.as_ref().or(self.weight.as_ref());
        if let Some(preferred) = weight {
            let Some(weight) = find_weight_column(&schema, preferred) else {
                return Ok(None);
            };
            aggregation = aggregation.metric(weight.as_str(), Aggregation::Sum, weight.as_str());
        }

        Ok(Some(aggregation.apply(&filtered)?))
    }
}

#[derive(Debug, Deserialize)]
struct DefinitionSet {
    indicators: Vec<IndicatorDefinition>,
}

/// Indicator definitions read from a JSON file
#[derive(Debug, Clone)]
pub struct DefinitionFile {
    path: PathBuf,
}

impl DefinitionFile {
    /// Source reading the JSON file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read and validate the definitions
    ///
    /// # Errors
    /// - [`IndicatorError::SourceUnavailable`] if the file cannot be read
    /// - [`IndicatorError::MalformedSource`] if it is not a valid definition set
    pub fn definitions(&self) -> Result<Vec<IndicatorDefinition>> {
        let location = self.path.display().to_string();
        let content = fs::read_to_string(&self.path).map_err(|e| IndicatorError::SourceUnavailable {
            location: location.clone(),
            reason: e.to_string(),
        })?;
        let set: DefinitionSet =
            serde_json::from_str(&content).map_err(|e| IndicatorError::MalformedSource {
                location: location.clone(),
                reason: e.to_string(),
            })?;

        for definition in &set.indicators {
            definition
                .validate()
                .map_err(|reason| IndicatorError::MalformedSource {
                    location: location.clone(),
                    reason,
                })?;
        }
        Ok(set.indicators)
    }
}

impl IndicatorSource for DefinitionFile {
    fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("definitions")
    }

    fn indicators(&self) -> Result<Vec<(String, IndicatorFn)>> {
        Ok(self
            .definitions()?
            .into_iter()
            .map(|definition| {
                let name = definition.name.clone();
                let function = indicator_fn(move |data, options| definition.evaluate(data, options));
                (name, function)
            })
            .collect())
    }
}
