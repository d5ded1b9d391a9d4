//! Merge engine: joins one year's cleaned module tables into a single table
//!
//! The merge runs in a fixed dependency order:
//!
//! 1. **Household backbone**: household summary inner-joined 1:1 with the
//!    dwelling module on the household key. Summary-origin weight columns are
//!    then renamed to their canonical household-weight names.
//! 2. **Persons**: the person module left-joined m:1 onto the backbone, making
//!    the working table one row per person.
//! 3. **Person-level attachments**: education and employment left-joined 1:1
//!    on the person key.
//!
//! Weight columns of person-level modules are tagged with their module suffix
//! before joining, so each module's expansion factor survives under its own
//! name (`factor07_per`, `factor07_edu`, `factor07_emp`).
//!
//! The household summary is mandatory. Every other module is optional and its
//! absence only narrows the merged column set. Cardinality violations are
//! fatal for the year.

pub mod join;

use std::time::Instant;

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{HOUSEHOLD_KEY, MergeConfig, ModuleKind};
use crate::preprocess::validate_module;
use crate::table::{KeyColumns, ModuleTables, rename_columns};
use crate::utils::logging::log_shape;

pub use join::{Cardinality, JoinSide, JoinSpec, JoinType, join};

/// Errors raised while merging a year's modules
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The household summary is absent or failed validation
    #[error("Required module {0} is missing or failed validation")]
    MissingRequiredModule(ModuleKind),

    /// A join's key-multiplicity contract does not hold
    #[error("{cardinality} join of {left} with {right} violated: {side} side has {duplicates} duplicate key rows")]
    CardinalityViolation {
        /// Left input label
        left: String,
        /// Right input label
        right: String,
        /// Contract that was checked
        cardinality: Cardinality,
        /// Side with repeated keys
        side: JoinSide,
        /// Number of rows repeating an earlier key
        duplicates: usize,
    },

    /// A join key column is absent from one input
    #[error("Join column '{column}' is missing from {table}")]
    MissingJoinColumn {
        /// Input label
        table: String,
        /// Missing column
        column: String,
    },

    /// Two output columns share a name even after suffixing
    #[error("Column '{0}' collides after applying merge suffixes")]
    ColumnCollision(String),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl MergeError {
    /// Whether the error is a cardinality-contract violation
    #[must_use]
    pub const fn is_cardinality_violation(&self) -> bool {
        matches!(self, Self::CardinalityViolation { .. })
    }
}

/// Result alias for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;

/// A module left out of the merge, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedModule {
    /// Module left out
    pub module: ModuleKind,
    /// Human-readable reason
    pub reason: String,
}

/// What happened during one year's merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Survey year
    pub year: i32,
    /// Rows in the merged table
    pub rows: usize,
    /// Columns in the merged table
    pub columns: usize,
    /// Modules joined, in merge order
    pub merged: Vec<ModuleKind>,
    /// Modules left out
    pub skipped: Vec<SkippedModule>,
    /// Person rows repeating an earlier household key (expected for multi-person households)
    pub duplicate_household_keys_in_person: usize,
    /// Person rows repeating an earlier person key
    pub duplicate_person_keys: usize,
}

impl MergeReport {
    fn skip(&mut self, module: ModuleKind, reason: impl Into<String>) {
        let reason = reason.into();
        warn!("Skipping module {module}: {reason}");
        self.skipped.push(SkippedModule { module, reason });
    }
}

/// A merged year table with its report
#[derive(Debug, Clone)]
pub struct MergedYear {
    /// One row per person when a person module was merged, else one per household
    pub table: RecordBatch,
    /// Merge diagnostics
    pub report: MergeReport,
}

/// Joins cleaned module tables into one table per year
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    /// Create an engine with the given configuration
    #[must_use]
    pub const fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Return the module table if present and valid, recording why not otherwise
    fn usable<'a>(
        modules: &'a ModuleTables,
        kind: ModuleKind,
        report: &mut MergeReport,
    ) -> Option<&'a RecordBatch> {
        let Some(table) = modules.get(kind) else {
            report.skip(kind, "not supplied");
            return None;
        };
        let validation = validate_module(table, kind);
        if validation.passed() {
            Some(table)
        } else {
            report.skip(
                kind,
                format!("missing key columns {:?}", validation.missing_keys),
            );
            None
        }
    }

    /// Merge one year's modules
    ///
    /// # Errors
    /// - [`MergeError::MissingRequiredModule`] if the household summary is absent or invalid
    /// - [`MergeError::CardinalityViolation`] if any join's key contract is broken
    /// - [`MergeError::ColumnCollision`] or [`MergeError::Arrow`] if the output cannot be assembled
    pub fn merge(&self, modules: &ModuleTables) -> Result<MergedYear> {
        let start = Instant::now();
        let mut report = MergeReport {
            year: modules.year(),
            ..MergeReport::default()
        };

        let summary_kind = ModuleKind::HouseholdSummary;
        let Some(summary) = modules
            .get(summary_kind)
            .filter(|t| validate_module(t, summary_kind).passed())
        else {
            return Err(MergeError::MissingRequiredModule(summary_kind));
        };
        report.merged.push(summary_kind);

        let mut working = self.household_backbone(summary, modules, &mut report)?;

        let has_persons = match Self::usable(modules, ModuleKind::Person, &mut report) {
            Some(person) => {
                let person = self.tag_weights(person, ModuleKind::Person)?;
                working = Self::attach_persons(&person, &working, &mut report)?;
                true
            }
            None => false,
        };

        for &kind in &self.config.attachment_order {
            let Some(table) = Self::usable(modules, kind, &mut report) else {
                continue;
            };
            if !has_persons {
                report.skip(kind, "no person module to attach person-level records to");
                continue;
            }

            let table = self.tag_weights(table, kind)?;
            working = join(
                &working,
                &table,
                &JoinSpec {
                    on: kind.key_columns(),
                    how: JoinType::Left,
                    validate: Cardinality::OneToOne,
                    suffixes: ("", kind.suffix()),
                    left_label: "merged table",
                    right_label: kind.name(),
                },
            )?;
            report.merged.push(kind);
            log_shape(&format!("Merged {kind}"), &working);
        }

        report.rows = working.num_rows();
        report.columns = working.num_columns();
        info!(
            "Merged year {}: {} rows x {} columns from {:?} in {:?}",
            report.year,
            report.rows,
            report.columns,
            report.merged,
            start.elapsed()
        );

        Ok(MergedYear {
            table: working,
            report,
        })
    }

    /// Rename a module's weight columns to their module-suffixed names
    fn tag_weights(&self, table: &RecordBatch, kind: ModuleKind) -> Result<RecordBatch> {
        let renames: Vec<(String, String)> = self
            .config
            .person_weight_columns
            .iter()
            .map(|column| (column.clone(), format!("{column}{}", kind.suffix())))
            .collect();
        Ok(rename_columns(table, &renames)?)
    }

    /// Step 1: summary joined 1:1 with dwellings, then weight renames
    fn household_backbone(
        &self,
        summary: &RecordBatch,
        modules: &ModuleTables,
        report: &mut MergeReport,
    ) -> Result<RecordBatch> {
        let summary_kind = ModuleKind::HouseholdSummary;
        let backbone = match Self::usable(modules, ModuleKind::Dwelling, report) {
            Some(dwelling) => {
                let joined = join(
                    summary,
                    dwelling,
                    &JoinSpec {
                        on: &HOUSEHOLD_KEY,
                        how: JoinType::Inner,
                        validate: Cardinality::OneToOne,
                        suffixes: (summary_kind.suffix(), ModuleKind::Dwelling.suffix()),
                        left_label: summary_kind.name(),
                        right_label: ModuleKind::Dwelling.name(),
                    },
                )?;
                report.merged.push(ModuleKind::Dwelling);
                joined
            }
            None => summary.clone(),
        };

        // Only rename columns that came from the summary unsuffixed
        let summary_schema = summary.schema();
        let renames: Vec<(String, String)> = self
            .config
            .household_weight_renames
            .iter()
            .filter(|(from, _)| summary_schema.field_with_name(from).is_ok())
            .cloned()
            .collect();
        debug!("Household weight renames: {renames:?}");
        let backbone = rename_columns(&backbone, &renames)?;

        log_shape("Household backbone", &backbone);
        Ok(backbone)
    }

    /// Step 2: person rows left-joined m:1 onto the backbone
    fn attach_persons(
        person: &RecordBatch,
        backbone: &RecordBatch,
        report: &mut MergeReport,
    ) -> Result<RecordBatch> {
        let kind = ModuleKind::Person;

        report.duplicate_household_keys_in_person =
            KeyColumns::try_new(person, &HOUSEHOLD_KEY)?.count_duplicates();
        if report.duplicate_household_keys_in_person > 0 {
            info!(
                "Found {} duplicate household keys in {kind}",
                report.duplicate_household_keys_in_person
            );
        }
        report.duplicate_person_keys = KeyColumns::try_new(person, kind.key_columns())?.count_duplicates();
        if report.duplicate_person_keys > 0 {
            warn!(
                "Found {} duplicate person keys in {kind}",
                report.duplicate_person_keys
            );
        }

        let merged = join(
            person,
            backbone,
            &JoinSpec {
                on: &HOUSEHOLD_KEY,
                how: JoinType::Left,
                validate: Cardinality::ManyToOne,
                suffixes: (kind.suffix(), ""),
                left_label: kind.name(),
                right_label: "household backbone",
            },
        )?;
        report.merged.push(kind);
        log_shape(&format!("Merged {kind}"), &merged);
        Ok(merged)
    }
}
