use arrow::array::{Array, AsArray};
use arrow::datatypes::DataType;
use survey_merge::merge::{MergeEngine, MergeError};
use survey_merge::preprocess::ModuleCleaner;
use survey_merge::{ModuleKind, ModuleTables, Preprocessor, RecordBatch};

use crate::utils::{
    HOUSEHOLDS, YEAR, batch, column_names, dwelling, full_year, ints, prepared, strings, summary,
};

/// Remove a column from a raw batch by its upper-case export name
fn without(table: &RecordBatch, column: &str) -> RecordBatch {
    let schema = table.schema();
    let keep: Vec<usize> = (0..schema.fields().len())
        .filter(|i| schema.field(*i).name() != column)
        .collect();
    table.project(&keep).unwrap()
}

#[test]
fn test_module_missing_a_key_column_is_excluded() {
    for kind in ModuleKind::ALL {
        for key in kind.key_columns() {
            let mut raw = full_year();
            let damaged = without(raw.get(kind).unwrap(), &key.to_uppercase());
            raw.insert(kind, damaged);

            let prepared = prepared(raw);
            assert!(!prepared.is_present(kind), "{kind} kept without {key}");

            let result = MergeEngine::default().merge(&prepared);
            if kind == ModuleKind::HouseholdSummary {
                assert!(matches!(
                    result,
                    Err(MergeError::MissingRequiredModule(ModuleKind::HouseholdSummary))
                ));
                continue;
            }

            let merged = result.unwrap();
            assert!(!merged.report.merged.contains(&kind));
            assert!(merged.report.skipped.iter().any(|s| s.module == kind));
        }
    }
}

#[test]
fn test_missing_person_module_skips_person_level_modules() {
    let mut raw = full_year();
    let damaged = without(raw.get(ModuleKind::Person).unwrap(), "CODPERSO");
    raw.insert(ModuleKind::Person, damaged);

    let merged = MergeEngine::default().merge(&prepared(raw)).unwrap();
    assert_eq!(merged.table.num_rows(), HOUSEHOLDS.len());
    assert_eq!(
        merged.report.merged,
        vec![ModuleKind::HouseholdSummary, ModuleKind::Dwelling]
    );
    let skipped: Vec<ModuleKind> = merged.report.skipped.iter().map(|s| s.module).collect();
    assert_eq!(
        skipped,
        vec![ModuleKind::Person, ModuleKind::Education, ModuleKind::Employment]
    );
}

#[test]
fn test_sentinel_codes_become_null_end_to_end() {
    let raw = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 999]))
        .with(
            ModuleKind::Dwelling,
            batch(vec![
                ("CONGLOME", ints(&[101, 101])),
                ("VIVIENDA", ints(&[1, 2])),
                ("HOGAR", ints(&[1, 1])),
                ("P101", strings(&["1", " 9999 "])),
            ]),
        );

    let merged = MergeEngine::default().merge(&prepared(raw)).unwrap();
    let members = merged.table.column_by_name("mieperho").unwrap();
    assert!(!members.is_null(0));
    assert!(members.is_null(1));

    let walls = merged.table.column_by_name("p101").unwrap();
    assert!(!matches!(walls.data_type(), DataType::Utf8 | DataType::LargeUtf8));
    assert!(!walls.is_null(0));
    assert!(walls.is_null(1));
}

#[test]
fn test_raw_names_are_normalised() {
    let prepared = prepared(full_year());

    let summary_names = column_names(prepared.get(ModuleKind::HouseholdSummary).unwrap());
    assert!(summary_names.contains(&"year".to_string()));
    assert!(!summary_names.iter().any(|n| n == "año"));
    assert!(summary_names.contains(&"factora07".to_string()));
    assert!(summary_names.contains(&"conglome".to_string()));

    let employment_names = column_names(prepared.get(ModuleKind::Employment).unwrap());
    assert!(employment_names.contains(&"factor07".to_string()));
    assert!(!employment_names.iter().any(|n| n == "fac500a"));

    let person_names = column_names(prepared.get(ModuleKind::Person).unwrap());
    assert!(person_names.contains(&"factor07".to_string()));
}

#[test]
fn test_text_is_trimmed_and_upper_cased() {
    let prepared = prepared(
        ModuleTables::new(YEAR).with(ModuleKind::Dwelling, dwelling(&HOUSEHOLDS)),
    );
    let table = prepared.get(ModuleKind::Dwelling).unwrap();
    let domain = table.column_by_name("dominio").unwrap().as_string::<i32>();
    assert_eq!(domain.value(0), "COSTA");
}

#[test]
fn test_preparing_twice_changes_nothing() {
    let preprocessor = Preprocessor::default();
    let once = prepared(full_year());
    let twice = preprocessor.prepare_year(once.clone()).unwrap();

    for kind in ModuleKind::ALL {
        assert_eq!(once.get(kind), twice.get(kind), "{kind}");
    }

    let cleaner = ModuleCleaner::default();
    let summary = once.get(ModuleKind::HouseholdSummary).unwrap();
    assert_eq!(&cleaner.clean(summary).unwrap(), summary);
}
