//! Key-based joins between record batches with cardinality contracts
//!
//! Rows are matched on normalised composite keys (see [`KeyColumns`]) and the
//! output is assembled with Arrow's `take` kernel, so column types survive
//! the join and unmatched left-join rows receive nulls.

use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::take;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use rustc_hash::FxHashSet;

use super::MergeError;
use crate::table::KeyColumns;

/// Which left rows survive a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Only rows with a match on both sides
    Inner,
    /// Every left row, with nulls where the right side has no match
    Left,
}

/// Key multiplicity a join must respect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Keys are unique on both sides
    OneToOne,
    /// Keys may repeat on the left but are unique on the right
    ManyToOne,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneToOne => f.write_str("1:1"),
            Self::ManyToOne => f.write_str("m:1"),
        }
    }
}

/// Side of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    /// Left input
    Left,
    /// Right input
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// Description of one join
#[derive(Debug, Clone)]
pub struct JoinSpec<'a> {
    /// Key columns, present under the same name on both sides
    pub on: &'a [&'a str],
    /// Join type
    pub how: JoinType,
    /// Cardinality contract checked before joining
    pub validate: Cardinality,
    /// Suffixes appended to colliding non-key columns of the left and right input
    pub suffixes: (&'a str, &'a str),
    /// Label of the left input, used in errors and logs
    pub left_label: &'a str,
    /// Label of the right input, used in errors and logs
    pub right_label: &'a str,
}

impl JoinSpec<'_> {
    fn check_unique(&self, keys: &KeyColumns, side: JoinSide) -> Result<(), MergeError> {
        let duplicates = keys.count_duplicates();
        if duplicates == 0 {
            return Ok(());
        }
        Err(MergeError::CardinalityViolation {
            left: self.left_label.to_string(),
            right: self.right_label.to_string(),
            cardinality: self.validate,
            side,
            duplicates,
        })
    }

    fn key_columns(&self, batch: &RecordBatch, label: &str) -> Result<KeyColumns, MergeError> {
        let schema = batch.schema();
        if let Some(column) = self.on.iter().find(|c| schema.field_with_name(c).is_err()) {
            return Err(MergeError::MissingJoinColumn {
                table: label.to_string(),
                column: (*column).to_string(),
            });
        }
        Ok(KeyColumns::try_new(batch, self.on)?)
    }
}

fn suffixed(name: &str, suffix: &str, collides: bool) -> String {
    if collides {
        format!("{name}{suffix}")
    } else {
        name.to_string()
    }
}

/// Join two record batches on shared key columns
///
/// Output columns are every left column in its original position (keys
/// included) followed by the right non-key columns. Non-key names present on
/// both sides receive the configured suffixes. Output rows follow left row order.
///
/// # Errors
/// - [`MergeError::MissingJoinColumn`] if a key column is absent on either side
/// - [`MergeError::CardinalityViolation`] if the right side (or, for 1:1 joins,
///   the left side) repeats a key
/// - [`MergeError::ColumnCollision`] if suffixing still leaves duplicate names
pub fn join(left: &RecordBatch, right: &RecordBatch, spec: &JoinSpec<'_>) -> Result<RecordBatch, MergeError> {
    let left_keys = spec.key_columns(left, spec.left_label)?;
    let right_keys = spec.key_columns(right, spec.right_label)?;

    if spec.validate == Cardinality::OneToOne {
        spec.check_unique(&left_keys, JoinSide::Left)?;
    }
    spec.check_unique(&right_keys, JoinSide::Right)?;

    let index = right_keys.index();
    let mut left_rows: Vec<u32> = Vec::with_capacity(left.num_rows());
    let mut right_rows: Vec<Option<u32>> = Vec::with_capacity(left.num_rows());

    for row in 0..left.num_rows() {
        let matched = index.get(&left_keys.key(row)).and_then(|rows| rows.first().copied());
        if matched.is_none() && spec.how == JoinType::Inner {
            continue;
        }
        #[allow(clippy::cast_possible_truncation)]
        left_rows.push(row as u32);
        right_rows.push(matched);
    }

    let left_schema = left.schema();
    let right_schema = right.schema();
    let keys: FxHashSet<&str> = spec.on.iter().copied().collect();

    let left_names: FxHashSet<&str> = left_schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .filter(|n| !keys.contains(n))
        .collect();
    let right_value_fields = right_schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !keys.contains(f.name().as_str()))
        .collect_vec();
    let right_names: FxHashSet<&str> = right_value_fields
        .iter()
        .map(|(_, f)| f.name().as_str())
        .collect();

    let left_indices = UInt32Array::from(left_rows);
    let right_indices = UInt32Array::from(right_rows);

    let mut fields: Vec<Field> = Vec::with_capacity(left.num_columns() + right_value_fields.len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (field, column) in left_schema.fields().iter().zip(left.columns()) {
        let name = field.name().as_str();
        let collides = !keys.contains(name) && right_names.contains(name);
        fields.push(
            Field::clone(field)
                .with_name(suffixed(name, spec.suffixes.0, collides))
                .with_nullable(true),
        );
        columns.push(take(column.as_ref(), &left_indices, None)?);
    }

    for (position, field) in &right_value_fields {
        let name = field.name().as_str();
        let collides = left_names.contains(name);
        fields.push(
            Field::clone(field)
                .with_name(suffixed(name, spec.suffixes.1, collides))
                .with_nullable(true),
        );
        columns.push(take(right.column(*position).as_ref(), &right_indices, None)?);
    }

    if let Some(duplicate) = fields.iter().map(Field::name).duplicates().next() {
        return Err(MergeError::ColumnCollision(duplicate.clone()));
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
