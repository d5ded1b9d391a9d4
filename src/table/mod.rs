//! Table containers and key/column helpers over Arrow record batches.

pub mod columns;
pub mod key;

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;

use crate::config::ModuleKind;

pub use columns::{
    column_as_f64, filter_rows, find_weight_column, is_numeric, is_text, rename_columns, resolve_column,
    resolve_columns, with_column, with_column_names,
};
pub use key::{CompositeKey, KeyColumns, KeyPart};

/// The module tables of one survey year
///
/// Each module maps to either a table or an explicit absence marker, so a
/// loader can record that it looked for a module and did not find it.
#[derive(Debug, Clone, Default)]
pub struct ModuleTables {
    year: i32,
    tables: BTreeMap<ModuleKind, Option<RecordBatch>>,
}

impl ModuleTables {
    /// Create an empty set of tables for a survey year
    #[must_use]
    pub const fn new(year: i32) -> Self {
        Self {
            year,
            tables: BTreeMap::new(),
        }
    }

    /// Survey year the tables belong to
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Add a module table, replacing any previous entry
    pub fn insert(&mut self, kind: ModuleKind, table: RecordBatch) {
        self.tables.insert(kind, Some(table));
    }

    /// Builder-style variant of [`ModuleTables::insert`]
    #[must_use]
    pub fn with(mut self, kind: ModuleKind, table: RecordBatch) -> Self {
        self.insert(kind, table);
        self
    }

    /// Record that a module is absent for this year
    pub fn mark_absent(&mut self, kind: ModuleKind) {
        self.tables.insert(kind, None);
    }

    /// Table for a module, if present
    #[must_use]
    pub fn get(&self, kind: ModuleKind) -> Option<&RecordBatch> {
        self.tables.get(&kind).and_then(Option::as_ref)
    }

    /// Whether a table is present for the module
    #[must_use]
    pub fn is_present(&self, kind: ModuleKind) -> bool {
        self.get(kind).is_some()
    }

    /// Modules with a table, in precedence order
    pub fn present(&self) -> impl Iterator<Item = ModuleKind> + '_ {
        self.tables
            .iter()
            .filter(|(_, table)| table.is_some())
            .map(|(kind, _)| *kind)
    }

    /// All entries, including absence markers
    pub fn iter(&self) -> impl Iterator<Item = (ModuleKind, Option<&RecordBatch>)> {
        self.tables.iter().map(|(kind, table)| (*kind, table.as_ref()))
    }

    /// Number of present tables
    #[must_use]
    pub fn len(&self) -> usize {
        self.present().count()
    }

    /// Whether no table is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoIterator for ModuleTables {
    type Item = (ModuleKind, Option<RecordBatch>);
    type IntoIter = std::collections::btree_map::IntoIter<ModuleKind, Option<RecordBatch>>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}
