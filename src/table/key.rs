//! Hashable composite keys over Arrow columns
//!
//! Joins and group-bys both need to compare rows across tables whose key
//! columns may have been loaded with different physical types (a cluster id
//! read as `Int32` in one module and `Float64` in another). Key cells are
//! normalised to [`KeyPart`] so equal survey identifiers hash equally.

use arrow::array::{Array, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::kernels::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// One normalised key cell
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    /// Missing value; nulls compare equal to each other
    Null,
    /// Integer, or a float with no fractional part
    Int(i64),
    /// Non-integral float, keyed by its bit pattern
    Float(u64),
    /// Text value
    Text(String),
}

/// A full composite key for one row
pub type CompositeKey = SmallVec<[KeyPart; 4]>;

#[derive(Debug)]
enum KeyColumn {
    Int(Int64Array),
    Float(Float64Array),
    Text(StringArray),
}

impl KeyColumn {
    fn from_array(name: &str, array: &dyn Array) -> Result<Self, ArrowError> {
        match array.data_type() {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Boolean => {
                let cast = cast::cast(array, &DataType::Int64)?;
                Ok(Self::Int(cast.as_primitive::<Int64Type>().clone()))
            }
            DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                let cast = cast::cast(array, &DataType::Float64)?;
                Ok(Self::Float(cast.as_primitive::<Float64Type>().clone()))
            }
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => {
                let cast = cast::cast(array, &DataType::Utf8)?;
                Ok(Self::Text(cast.as_string::<i32>().clone()))
            }
            other => Err(ArrowError::InvalidArgumentError(format!(
                "Column '{name}' of type {other} cannot be used as a key"
            ))),
        }
    }

    fn part(&self, row: usize) -> KeyPart {
        match self {
            Self::Int(a) if a.is_valid(row) => KeyPart::Int(a.value(row)),
            Self::Float(a) if a.is_valid(row) => float_part(a.value(row)),
            Self::Text(a) if a.is_valid(row) => KeyPart::Text(a.value(row).to_string()),
            _ => KeyPart::Null,
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_part(value: f64) -> KeyPart {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        KeyPart::Int(value as i64)
    } else {
        KeyPart::Float(value.to_bits())
    }
}

/// Key columns of one table, ready for row-wise key extraction
#[derive(Debug)]
pub struct KeyColumns {
    columns: Vec<KeyColumn>,
    num_rows: usize,
}

impl KeyColumns {
    /// Extract the named key columns from a record batch
    ///
    /// # Errors
    /// Returns an error if a column is missing or has a type that cannot be keyed
    pub fn try_new<S: AsRef<str>>(batch: &RecordBatch, names: &[S]) -> Result<Self, ArrowError> {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let column = batch.column_by_name(name).ok_or_else(|| {
                    ArrowError::SchemaError(format!("Key column '{name}' not found"))
                })?;
                KeyColumn::from_array(name, column.as_ref())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            columns,
            num_rows: batch.num_rows(),
        })
    }

    /// Number of rows covered
    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Composite key of one row
    #[must_use]
    pub fn key(&self, row: usize) -> CompositeKey {
        self.columns.iter().map(|c| c.part(row)).collect()
    }

    /// Whether any part of the row's key is null
    #[must_use]
    pub fn has_null(&self, row: usize) -> bool {
        self.columns.iter().any(|c| c.part(row) == KeyPart::Null)
    }

    /// Map each distinct key to the rows carrying it, in row order
    #[must_use]
    pub fn index(&self) -> FxHashMap<CompositeKey, SmallVec<[u32; 1]>> {
        let mut index: FxHashMap<CompositeKey, SmallVec<[u32; 1]>> = FxHashMap::default();
        for row in 0..self.num_rows {
            #[allow(clippy::cast_possible_truncation)]
            index.entry(self.key(row)).or_default().push(row as u32);
        }
        index
    }

    /// Count rows whose key already appeared on an earlier row
    #[must_use]
    pub fn count_duplicates(&self) -> usize {
        let mut seen = rustc_hash::FxHashSet::default();
        (0..self.num_rows).filter(|&row| !seen.insert(self.key(row))).count()
    }
}
