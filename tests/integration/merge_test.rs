use arrow::array::{Array, AsArray};
use arrow::datatypes::Float64Type;
use survey_merge::config::HOUSEHOLD_KEY;
use survey_merge::indicators::{Aggregation, GroupedAggregation};
use survey_merge::merge::{JoinSide, MergeEngine, MergeError};
use survey_merge::table::{column_as_f64, resolve_column};
use survey_merge::{ModuleKind, ModuleTables};

use crate::utils::{
    HOUSEHOLDS, YEAR, column_names, dwelling, education, full_year, people, person, prepared,
    summary,
};

#[test]
fn test_end_to_end_merge_recovers_household_sizes() {
    let merged = MergeEngine::default().merge(&prepared(full_year())).unwrap();

    assert_eq!(merged.table.num_rows(), 5);
    assert_eq!(merged.report.rows, 5);
    assert_eq!(merged.report.year, YEAR);
    assert_eq!(merged.report.merged, ModuleKind::ALL.to_vec());
    assert!(merged.report.skipped.is_empty());

    let sizes = GroupedAggregation::new(HOUSEHOLD_KEY)
        .metric("codperso", Aggregation::Count, "size")
        .apply(&merged.table)
        .unwrap();
    let sizes = sizes.column_by_name("size").unwrap().as_primitive::<Float64Type>();
    assert_eq!(sizes.values().to_vec(), vec![3.0, 2.0]);
}

#[test]
fn test_backbone_requires_unique_household_keys() {
    let duplicated = [HOUSEHOLDS[0], HOUSEHOLDS[0]];

    let dup_summary = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&duplicated, &[3, 3]))
        .with(ModuleKind::Dwelling, dwelling(&HOUSEHOLDS));
    let err = MergeEngine::default().merge(&prepared(dup_summary)).unwrap_err();
    assert!(matches!(
        err,
        MergeError::CardinalityViolation {
            side: JoinSide::Left,
            duplicates: 1,
            ..
        }
    ));

    let dup_dwelling = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Dwelling, dwelling(&duplicated));
    let err = MergeEngine::default().merge(&prepared(dup_dwelling)).unwrap_err();
    assert!(matches!(
        err,
        MergeError::CardinalityViolation {
            side: JoinSide::Right,
            ..
        }
    ));

    let unique = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Dwelling, dwelling(&HOUSEHOLDS));
    let merged = MergeEngine::default().merge(&prepared(unique)).unwrap();
    assert_eq!(merged.table.num_rows(), 2);
}

#[test]
fn test_person_rows_share_household_columns() {
    let persons = people();
    let tables = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Dwelling, dwelling(&HOUSEHOLDS))
        .with(ModuleKind::Person, person(&persons));
    let merged = MergeEngine::default().merge(&prepared(tables)).unwrap();

    assert_eq!(merged.table.num_rows(), persons.len());
    assert_eq!(merged.report.duplicate_household_keys_in_person, 3);
    assert_eq!(merged.report.duplicate_person_keys, 0);

    // The first three rows are the three members of the first household
    let members = column_as_f64(&merged.table, "mieperho").unwrap();
    assert_eq!(&members.values()[..3], &[3.0, 3.0, 3.0]);
    let weights = column_as_f64(&merged.table, "factor07_sum").unwrap();
    assert_eq!(&weights.values()[..3], &[150.0, 150.0, 150.0]);
}

#[test]
fn test_person_without_household_gets_null_household_columns() {
    let mut persons = people();
    persons.push(((500, 9, 9), 1, 1, 1));
    let tables = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Person, person(&persons));
    let merged = MergeEngine::default().merge(&prepared(tables)).unwrap();

    assert_eq!(merged.table.num_rows(), 6);
    let members = merged.table.column_by_name("mieperho").unwrap();
    assert!(members.is_null(5));
}

#[test]
fn test_duplicate_education_records_are_fatal() {
    let mut persons = people();
    let repeated = persons[0];
    persons.push(repeated);
    let tables = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Person, person(&people()))
        .with(ModuleKind::Education, education(&persons, &[1, 2, 3, 4, 5, 6]));

    let err = MergeEngine::default().merge(&prepared(tables)).unwrap_err();
    assert!(err.is_cardinality_violation());
}

#[test]
fn test_collisions_and_weights_are_named_by_module() {
    let merged = MergeEngine::default().merge(&prepared(full_year())).unwrap();
    let names = column_names(&merged.table);

    for expected in [
        "year",
        "dominio_sum",
        "dominio_viv",
        "factor07_sum",
        "factora07_sum",
        "factor07_per",
        "factor07_edu",
        "factor07_emp",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected} in {names:?}");
    }
    assert!(!names.iter().any(|n| n == "factor07"));

    let schema = merged.table.schema();
    assert_eq!(resolve_column(&schema, "dominio").as_deref(), Some("dominio_sum"));
}

#[test]
fn test_person_level_modules_attach_on_person_key() {
    let merged = MergeEngine::default().merge(&prepared(full_year())).unwrap();

    let schooling = column_as_f64(&merged.table, "p301a").unwrap();
    assert_eq!(schooling.value(0), 11.0);
    assert_eq!(schooling.value(4), 99.0);
    let occupation = column_as_f64(&merged.table, "ocu500").unwrap();
    assert_eq!(occupation.value(1), 4.0);
}
