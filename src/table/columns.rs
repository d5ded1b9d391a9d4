//! Column-level helpers shared by the cleaner, merge engine and indicators.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array};
use arrow::compute::filter_record_batch;
use arrow::compute::kernels::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;

use crate::config::{ModuleKind, WEIGHT_BASE_TOKEN};

/// Check if an Arrow data type is numeric
#[must_use]
pub const fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if an Arrow data type holds text
#[must_use]
pub const fn is_text(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Find an analytic column by name, falling back to its merge-suffixed variants
///
/// Columns that collided during a merge carry a module suffix. The fallback
/// walks suffixes in module precedence order, so `dominio` resolves to
/// `dominio_sum` before `dominio_viv`.
#[must_use]
pub fn resolve_column(schema: &Schema, name: &str) -> Option<String> {
    if schema.field_with_name(name).is_ok() {
        return Some(name.to_string());
    }
    ModuleKind::ALL
        .iter()
        .map(|kind| format!("{name}{}", kind.suffix()))
        .find(|candidate| schema.field_with_name(candidate).is_ok())
}

/// Resolve every name, or `None` if any of them is absent
#[must_use]
pub fn resolve_columns<S: AsRef<str>>(schema: &Schema, names: &[S]) -> Option<Vec<String>> {
    names
        .iter()
        .map(|name| resolve_column(schema, name.as_ref()))
        .collect()
}

/// Pick the expansion-factor column to weight with
///
/// The preferred name wins when present; otherwise the first column whose
/// name contains the base factor token is used.
#[must_use]
pub fn find_weight_column(schema: &Schema, preferred: &str) -> Option<String> {
    if schema.field_with_name(preferred).is_ok() {
        return Some(preferred.to_string());
    }
    schema
        .fields()
        .iter()
        .map(|f| f.name())
        .find(|name| name.contains(WEIGHT_BASE_TOKEN))
        .cloned()
}

/// Read a numeric (or numeric-castable) column as `Float64`
///
/// # Errors
/// Returns an error if the column is missing or cannot be cast
pub fn column_as_f64(batch: &RecordBatch, name: &str) -> Result<Float64Array, ArrowError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| ArrowError::SchemaError(format!("Column '{name}' not found")))?;
    let cast = cast::cast(column.as_ref(), &DataType::Float64)?;
    Ok(cast.as_primitive::<Float64Type>().clone())
}

/// Rebuild a schema with the given field names, keeping types and metadata
fn renamed_schema(schema: &Schema, names: &[String]) -> SchemaRef {
    let fields = schema
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| field.as_ref().clone().with_name(name.as_str()))
        .collect::<Vec<Field>>();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

/// Return a copy of the batch with columns renamed
///
/// Renames whose source is absent are ignored, as are renames whose target
/// already names another column.
///
/// # Errors
/// Returns an error if the batch cannot be rebuilt
pub fn rename_columns(
    batch: &RecordBatch,
    renames: &[(String, String)],
) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let mut names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    for (from, to) in renames {
        if from == to || names.iter().any(|n| n == to) {
            continue;
        }
        if let Some(slot) = names.iter_mut().find(|n| n.as_str() == from.as_str()) {
            slot.clone_from(to);
        }
    }

    with_column_names(batch, &names)
}

/// Return a copy of the batch with every column renamed positionally
///
/// # Errors
/// Returns an error if the name count does not match the column count
pub fn with_column_names(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch, ArrowError> {
    if names.len() != batch.num_columns() {
        return Err(ArrowError::InvalidArgumentError(format!(
            "Expected {} column names, got {}",
            batch.num_columns(),
            names.len()
        )));
    }
    RecordBatch::try_new(
        renamed_schema(batch.schema().as_ref(), names),
        batch.columns().to_vec(),
    )
}

/// Return a copy of the batch with one column appended
///
/// # Errors
/// Returns an error if the array length does not match the batch
pub fn with_column(
    batch: &RecordBatch,
    name: &str,
    array: ArrayRef,
) -> Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields.push(Field::new(name, array.data_type().clone(), true));

    let mut columns = batch.columns().to_vec();
    columns.push(array);

    RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )
}

/// Keep the rows of a batch where a numeric column satisfies a predicate
///
/// Null cells never satisfy the predicate.
///
/// # Errors
/// Returns an error if the column is missing, not numeric, or filtering fails
pub fn filter_rows<F>(batch: &RecordBatch, column: &str, predicate: F) -> Result<RecordBatch, ArrowError>
where
    F: Fn(f64) -> bool,
{
    let values = column_as_f64(batch, column)?;
    let mask: BooleanArray = values
        .iter()
        .map(|v| Some(v.is_some_and(&predicate)))
        .collect();
    filter_record_batch(batch, &mask)
}
