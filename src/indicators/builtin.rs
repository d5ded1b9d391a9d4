//! Baseline indicators every calculator starts with

use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use log::debug;
use std::sync::Arc;

use super::{Aggregation, GroupedAggregation, IndicatorError, IndicatorOptions, Result};
use crate::config::{EMPLOYMENT_WEIGHT, HOUSEHOLD_KEY, HOUSEHOLD_WEIGHT, PERSON_WEIGHT, YEAR_COLUMN};
use crate::merge::{Cardinality, JoinSpec, JoinType, join};
use crate::table::{column_as_f64, filter_rows, find_weight_column, resolve_column, resolve_columns, with_column};

pub const HOUSEHOLD_SIZE: &str = "household_size";
pub const HOUSEHOLD_HEADSHIP: &str = "household_headship";
pub const EDUCATION_YEARS: &str = "education_years";
pub const EMPLOYMENT_RATE: &str = "employment_rate";

/// Names of the built-in indicators
pub const BUILTIN_INDICATORS: [&str; 4] =
    [HOUSEHOLD_SIZE, HOUSEHOLD_HEADSHIP, EDUCATION_YEARS, EMPLOYMENT_RATE];

/// Household member count
pub const MEMBERS: &str = "mieperho";
/// Relationship to the household head (1 = head)
pub const RELATIONSHIP: &str = "p203";
/// Sex
pub const SEX: &str = "p207";
/// Years of schooling
pub const SCHOOLING: &str = "p301a";
/// Employment condition
pub const OCCUPATION: &str = "ocu500";
/// Survey domain
pub const DOMAIN: &str = "dominio";

/// Analytic dimensions used when the caller does not supply `group_by`
pub const DEFAULT_DIMENSIONS: [&str; 3] = [YEAR_COLUMN, DOMAIN, SEX];

const HEAD_OF_HOUSEHOLD: f64 = 1.0;
const EMPLOYED_CODES: [f64; 3] = [1.0, 2.0, 3.0];
const MAX_SCHOOLING_YEARS: f64 = 20.0;

/// Output column of [`household_headship`]
pub const HEADSHIP_PCT: &str = "headship_pct";
/// Output column of [`education_years`]
pub const MEAN_YEARS_OF_SCHOOLING: &str = "mean_years_of_schooling";
/// Output column of [`employment_rate`]
pub const EMPLOYMENT_RATE_COLUMN: &str = "employment_rate";

/// Resolve the required source columns, or `None` if any is absent
fn required(schema: &Schema, indicator: &str, columns: &[&str]) -> Option<Vec<String>> {
    let resolved = resolve_columns(schema, columns);
    if resolved.is_none() {
        debug!("{indicator}: required columns {columns:?} not all present");
    }
    resolved
}

fn dimensions(schema: &Schema, indicator: &str, options: &IndicatorOptions, defaults: &[&str]) -> Option<Vec<String>> {
    let dims = options.group_by_or(defaults);
    if resolve_columns(schema, &dims).is_none() {
        debug!("{indicator}: grouping dimensions {dims:?} not all present");
        return None;
    }
    Some(dims)
}

fn weight(schema: &Schema, indicator: &str, options: &IndicatorOptions, default: &str) -> Option<String> {
    let weight = find_weight_column(schema, options.weight_or(default));
    if weight.is_none() {
        debug!("{indicator}: no expansion factor column found");
    }
    weight
}

/// Household size: first member count and first weight per household
pub fn household_size(data: &RecordBatch, options: &IndicatorOptions) -> Result<Option<RecordBatch>> {
    let schema = data.schema();
    let Some(members) = resolve_column(&schema, MEMBERS) else {
        return Ok(None);
    };
    let Some(group_by) = dimensions(&schema, HOUSEHOLD_SIZE, options, &HOUSEHOLD_KEY) else {
        return Ok(None);
    };
    let Some(weight) = weight(&schema, HOUSEHOLD_SIZE, options, HOUSEHOLD_WEIGHT) else {
        return Ok(None);
    };

    let result = GroupedAggregation::new(group_by)
        .metric(members, Aggregation::First, MEMBERS)
        .metric(weight.as_str(), Aggregation::First, weight.as_str())
        .apply(data)?;
    Ok(Some(result))
}

/// Share of weighted household heads by sex within each domain and year
///
/// Heads (`p203 == 1`) are weighted and summed per group, then divided by the
/// total weight of the group without the sex dimension, times 100.
pub fn household_headship(data: &RecordBatch, options: &IndicatorOptions) -> Result<Option<RecordBatch>> {
    let schema = data.schema();
    let Some(columns) = required(&schema, HOUSEHOLD_HEADSHIP, &[RELATIONSHIP, SEX]) else {
        return Ok(None);
    };
    let Some(group_by) = dimensions(&schema, HOUSEHOLD_HEADSHIP, options, &DEFAULT_DIMENSIONS) else {
        return Ok(None);
    };
    let Some(weight) = weight(&schema, HOUSEHOLD_HEADSHIP, options, HOUSEHOLD_WEIGHT) else {
        return Ok(None);
    };

    let total_dims: Vec<&str> = group_by
        .iter()
        .map(String::as_str)
        .filter(|d| *d != SEX)
        .collect();

    let heads = filter_rows(data, &columns[0], |v| v == HEAD_OF_HOUSEHOLD)?;
    let heads = GroupedAggregation::new(group_by.iter().map(String::as_str))
        .metric(weight.as_str(), Aggregation::Sum, "heads_weight")
        .apply(&heads)?;
    let totals = GroupedAggregation::new(total_dims.iter().copied())
        .metric(weight.as_str(), Aggregation::Sum, "total_weight")
        .apply(data)?;

    let joined = join(
        &heads,
        &totals,
        &JoinSpec {
            on: &total_dims,
            how: JoinType::Inner,
            validate: Cardinality::ManyToOne,
            suffixes: ("", ""),
            left_label: "household heads",
            right_label: "group totals",
        },
    )
    .map_err(|e| IndicatorError::Computation(e.to_string()))?;

    let heads_weight = column_as_f64(&joined, "heads_weight")?;
    let total_weight = column_as_f64(&joined, "total_weight")?;
    let pct: Float64Array = heads_weight
        .iter()
        .zip(total_weight.iter())
        .map(|(h, t)| match (h, t) {
            (Some(h), Some(t)) if t != 0.0 => Some(h / t * 100.0),
            _ => None,
        })
        .collect();

    let schema = joined.schema();
    let projection = group_by
        .iter()
        .map(|d| schema.index_of(d))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let result = with_column(&joined.project(&projection)?, HEADSHIP_PCT, Arc::new(pct))?;
    Ok(Some(result))
}

/// Mean years of schooling and weight sum, over rows with 0 to 20 years
pub fn education_years(data: &RecordBatch, options: &IndicatorOptions) -> Result<Option<RecordBatch>> {
    let schema = data.schema();
    let Some(columns) = required(&schema, EDUCATION_YEARS, &[SCHOOLING]) else {
        return Ok(None);
    };
    let Some(group_by) = dimensions(&schema, EDUCATION_YEARS, options, &DEFAULT_DIMENSIONS) else {
        return Ok(None);
    };
    let Some(weight) = weight(&schema, EDUCATION_YEARS, options, PERSON_WEIGHT) else {
        return Ok(None);
    };

    let schooled = filter_rows(data, &columns[0], |v| (0.0..=MAX_SCHOOLING_YEARS).contains(&v))?;
    let result = GroupedAggregation::new(group_by)
        .metric(columns[0].as_str(), Aggregation::Mean, MEAN_YEARS_OF_SCHOOLING)
        .metric(weight.as_str(), Aggregation::Sum, weight.as_str())
        .apply(&schooled)?;
    Ok(Some(result))
}

/// Share of people employed (`ocu500` in 1..=3) and weight sum
///
/// A null employment condition counts as not employed.
pub fn employment_rate(data: &RecordBatch, options: &IndicatorOptions) -> Result<Option<RecordBatch>> {
    let schema = data.schema();
    let Some(columns) = required(&schema, EMPLOYMENT_RATE, &[OCCUPATION]) else {
        return Ok(None);
    };
    let Some(group_by) = dimensions(&schema, EMPLOYMENT_RATE, options, &DEFAULT_DIMENSIONS) else {
        return Ok(None);
    };
    let Some(weight) = weight(&schema, EMPLOYMENT_RATE, options, EMPLOYMENT_WEIGHT) else {
        return Ok(None);
    };

    let employed: Float64Array = column_as_f64(data, &columns[0])?
        .iter()
        .map(|v| Some(if v.is_some_and(|v| EMPLOYED_CODES.contains(&v)) { 1.0 } else { 0.0 }))
        .collect();
    let flagged = with_column(data, "employed", Arc::new(employed) as ArrayRef)?;

    let result = GroupedAggregation::new(group_by)
        .metric("employed", Aggregation::Mean, EMPLOYMENT_RATE_COLUMN)
        .metric(weight.as_str(), Aggregation::Sum, weight.as_str())
        .apply(&flagged)?;
    Ok(Some(result))
}
