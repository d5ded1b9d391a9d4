//! Grouped aggregation over record batches
//!
//! Groups are formed from normalised composite keys, so a group column read as
//! `Int32` in one year and `Float64` in another still groups identically. Rows
//! with a null in any group column are dropped and output groups are sorted by
//! key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::table::{CompositeKey, KeyColumns, column_as_f64, resolve_column};

/// Reduction applied to a metric column within each group; nulls are skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Sum of non-null values (0 for an all-null group)
    Sum,
    /// Mean of non-null values (null for an all-null group)
    Mean,
    /// First non-null value in row order
    First,
    /// Number of non-null values
    Count,
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::First => "first",
            Self::Count => "count",
        };
        f.write_str(name)
    }
}

impl Aggregation {
    #[allow(clippy::cast_precision_loss)]
    fn reduce(self, values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
        let mut present = values.flatten();
        match self {
            Self::First => present.next(),
            Self::Sum => Some(present.sum()),
            Self::Count => Some(present.count() as f64),
            Self::Mean => {
                let (sum, n) = present.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Metric {
    column: String,
    aggregation: Aggregation,
    output: String,
}

/// A group-by with one or more metric reductions
///
/// Column names are resolved with [`resolve_column`], so `dominio` finds
/// `dominio_sum` in a merged table. Output columns use the requested names.
#[derive(Debug, Clone)]
pub struct GroupedAggregation {
    group_by: Vec<String>,
    metrics: Vec<Metric>,
}

impl GroupedAggregation {
    /// Start an aggregation over the given group columns
    pub fn new<I, S>(group_by: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: group_by.into_iter().map(Into::into).collect(),
            metrics: Vec::new(),
        }
    }

    /// Add a metric reduction written to `output`
    #[must_use]
    pub fn metric(
        mut self,
        column: impl Into<String>,
        aggregation: Aggregation,
        output: impl Into<String>,
    ) -> Self {
        self.metrics.push(Metric {
            column: column.into(),
            aggregation,
            output: output.into(),
        });
        self
    }

    /// Group columns as requested
    #[must_use]
    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    /// Run the aggregation
    ///
    /// # Errors
    /// Returns an error if a group or metric column cannot be resolved or read
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch, ArrowError> {
        let schema = batch.schema();
        let resolve = |name: &str| {
            resolve_column(&schema, name)
                .ok_or_else(|| ArrowError::SchemaError(format!("Column '{name}' not found")))
        };

        let group_columns = self
            .group_by
            .iter()
            .map(|name| resolve(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let keys = KeyColumns::try_new(batch, &group_columns)?;

        let mut groups: BTreeMap<CompositeKey, Vec<usize>> = BTreeMap::new();
        for row in 0..batch.num_rows() {
            if keys.has_null(row) {
                continue;
            }
            groups.entry(keys.key(row)).or_default().push(row);
        }

        #[allow(clippy::cast_possible_truncation)]
        let first_rows = UInt32Array::from(
            groups.values().map(|rows| rows[0] as u32).collect::<Vec<_>>(),
        );

        let mut fields = Vec::with_capacity(self.group_by.len() + self.metrics.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

        for (requested, source) in self.group_by.iter().zip(&group_columns) {
            let column = batch
                .column_by_name(source)
                .ok_or_else(|| ArrowError::SchemaError(format!("Column '{source}' not found")))?;
            fields.push(Field::new(requested, column.data_type().clone(), true));
            columns.push(take(column.as_ref(), &first_rows, None)?);
        }

        for metric in &self.metrics {
            let source = resolve(metric.column.as_str())?;
            let values: Float64Array = match metric.aggregation {
                Aggregation::Count => {
                    let column = batch.column_by_name(&source).ok_or_else(|| {
                        ArrowError::SchemaError(format!("Column '{source}' not found"))
                    })?;
                    groups
                        .values()
                        .map(|rows| {
                            Aggregation::Count
                                .reduce(rows.iter().map(|&r| column.is_valid(r).then_some(1.0)))
                        })
                        .collect()
                }
                aggregation => {
                    let column = column_as_f64(batch, &source)?;
                    groups
                        .values()
                        .map(|rows| {
                            aggregation.reduce(
                                rows.iter().map(|&r| column.is_valid(r).then(|| column.value(r))),
                            )
                        })
                        .collect()
                }
            };
            fields.push(Field::new(&metric.output, DataType::Float64, true));
            columns.push(Arc::new(values));
        }

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
    }
}
