use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::array::AsArray;
use arrow::datatypes::Float64Type;
use survey_merge::indicators::builtin::{
    EDUCATION_YEARS, EMPLOYMENT_RATE, EMPLOYMENT_RATE_COLUMN, HEADSHIP_PCT, HOUSEHOLD_HEADSHIP,
    HOUSEHOLD_SIZE, MEAN_YEARS_OF_SCHOOLING,
};
use survey_merge::indicators::{
    DefinitionFile, IndicatorCalculator, IndicatorError, IndicatorOptions, IndicatorOutcome,
    IndicatorRegistry, StaticSource, indicator_fn,
};
use survey_merge::merge::MergeEngine;
use survey_merge::{ModuleKind, ModuleTables, RecordBatch};

use crate::utils::{HOUSEHOLDS, YEAR, full_year, prepared, summary};

fn merged_year() -> RecordBatch {
    MergeEngine::default().merge(&prepared(full_year())).unwrap().table
}

fn rows_indicator() -> survey_merge::IndicatorFn {
    indicator_fn(|data, _| Ok(Some(data.slice(0, 1))))
}

#[test]
fn test_registered_indicator_receives_held_table() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut calculator = IndicatorCalculator::with_builtins(merged_year());
    calculator.register(
        "row_count",
        indicator_fn(move |data, _| {
            seen.fetch_add(data.num_rows(), Ordering::SeqCst);
            Ok(Some(data.clone()))
        }),
    );

    let result = calculator
        .calculate("row_count", &IndicatorOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(result.num_rows(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert!(calculator.list_indicators().contains(&"row_count".to_string()));
}

#[test]
fn test_unknown_indicator_is_distinguishable() {
    let calculator = IndicatorCalculator::with_builtins(merged_year());
    let err = calculator
        .calculate("not_registered", &IndicatorOptions::default())
        .unwrap_err();
    assert!(matches!(err, IndicatorError::UnknownIndicator(name) if name == "not_registered"));
}

#[test]
fn test_one_failing_indicator_does_not_stop_the_others() {
    let mut registry = IndicatorRegistry::new();
    registry.register("a", rows_indicator());
    registry.register("b", rows_indicator());
    registry.register(
        "broken",
        indicator_fn(|_, _| Err(IndicatorError::Computation("division by zero".into()))),
    );
    registry.register("d", rows_indicator());

    let outcomes = IndicatorCalculator::new(merged_year(), registry).calculate_all(None);

    assert_eq!(outcomes.len(), 4);
    let failed: Vec<&String> = outcomes
        .iter()
        .filter(|(_, o)| o.is_failed())
        .map(|(name, _)| name)
        .collect();
    assert_eq!(failed, vec!["broken"]);
    assert_eq!(outcomes.values().filter(|o| o.is_computed()).count(), 3);
}

#[test]
fn test_panicking_indicator_is_recorded_as_failed() {
    let mut registry = IndicatorRegistry::new();
    registry.register("a", rows_indicator());
    registry.register("exploding", indicator_fn(|_, _| panic!("bad column index")));
    registry.register("z", rows_indicator());

    let outcomes = IndicatorCalculator::new(merged_year(), registry).calculate_all(None);

    assert_eq!(outcomes.len(), 3);
    match &outcomes["exploding"] {
        IndicatorOutcome::Failed(reason) => assert!(reason.contains("bad column index")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(outcomes["a"].is_computed());
    assert!(outcomes["z"].is_computed());
}

#[test]
fn test_calculate_all_subset_records_unknown_names() {
    let calculator = IndicatorCalculator::with_builtins(merged_year());
    let outcomes = calculator.calculate_all(Some(&[HOUSEHOLD_SIZE, "missing"][..]));

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[HOUSEHOLD_SIZE].is_computed());
    assert!(outcomes["missing"].is_failed());
}

#[test]
fn test_builtins_over_merged_year() {
    let calculator = IndicatorCalculator::with_builtins(merged_year());
    let outcomes = calculator.calculate_all(None);
    assert!(outcomes.values().all(IndicatorOutcome::is_computed), "{outcomes:?}");

    let size = outcomes[HOUSEHOLD_SIZE].table().unwrap();
    assert_eq!(size.num_rows(), HOUSEHOLDS.len());
    assert!(size.column_by_name("factor07_sum").is_some());

    // One female head (weight 150) over 5 people of weight 150
    let headship = outcomes[HOUSEHOLD_HEADSHIP].table().unwrap();
    let pct = headship.column_by_name(HEADSHIP_PCT).unwrap().as_primitive::<Float64Type>();
    assert_eq!(pct.values().to_vec(), vec![20.0, 20.0]);

    // Schooling: men 11 and 6; women 14 and 9, with 99 filtered out
    let schooling = outcomes[EDUCATION_YEARS].table().unwrap();
    let mean = schooling
        .column_by_name(MEAN_YEARS_OF_SCHOOLING)
        .unwrap()
        .as_primitive::<Float64Type>();
    assert_eq!(mean.values().to_vec(), vec![8.5, 11.5]);
    assert!(schooling.column_by_name("factor07_per").is_some());

    // Occupation: men 1 and 2; women 4, 3 and 6
    let employment = outcomes[EMPLOYMENT_RATE].table().unwrap();
    let rate = employment
        .column_by_name(EMPLOYMENT_RATE_COLUMN)
        .unwrap()
        .as_primitive::<Float64Type>();
    assert_eq!(rate.value(0), 1.0);
    assert!((rate.value(1) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_builtins_not_computable_without_their_modules() {
    let households_only = ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]));
    let table = MergeEngine::default().merge(&prepared(households_only)).unwrap().table;

    let outcomes = IndicatorCalculator::with_builtins(table).calculate_all(None);
    assert!(outcomes[HOUSEHOLD_SIZE].is_computed());
    for name in [HOUSEHOLD_HEADSHIP, EDUCATION_YEARS, EMPLOYMENT_RATE] {
        assert!(matches!(outcomes[name], IndicatorOutcome::NotComputable), "{name}");
    }
}

#[test]
fn test_options_override_dimensions_and_weight() {
    let calculator = IndicatorCalculator::with_builtins(merged_year());
    let options = IndicatorOptions::default()
        .with_group_by(["year"])
        .with_weight("factor07_per");

    let result = calculator.calculate(EMPLOYMENT_RATE, &options).unwrap().unwrap();
    assert_eq!(result.num_rows(), 1);
    let weight = result.column_by_name("factor07_per").unwrap().as_primitive::<Float64Type>();
    assert_eq!(weight.value(0), 500.0);
}

#[test]
fn test_load_external_sources() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "indicators": [
                {{
                    "name": "heads_by_sex",
                    "group_by": ["year", "p207"],
                    "aggregation": "count",
                    "weight": "factor07_sum",
                    "filter": {{ "column": "p203", "equals": 1 }}
                }}
            ]
        }}"#
    )
    .unwrap();

    let mut calculator = IndicatorCalculator::with_builtins(merged_year());
    let loaded = calculator.load_external(&DefinitionFile::new(file.path())).unwrap();
    assert_eq!(loaded, 1);

    let heads = calculator
        .calculate("heads_by_sex", &IndicatorOptions::default())
        .unwrap()
        .unwrap();
    let counts = heads.column_by_name("count").unwrap().as_primitive::<Float64Type>();
    assert_eq!(counts.values().to_vec(), vec![1.0, 1.0]);

    let source = StaticSource::new("extras").with(HOUSEHOLD_SIZE, rows_indicator());
    assert_eq!(calculator.load_external(&source).unwrap(), 1);
    let replaced = calculator
        .calculate(HOUSEHOLD_SIZE, &IndicatorOptions::default())
        .unwrap()
        .unwrap();
    assert_eq!(replaced.num_rows(), 1);
}

#[test]
fn test_broken_source_leaves_registry_unchanged() {
    let mut calculator = IndicatorCalculator::with_builtins(merged_year());
    let before = calculator.list_indicators();

    let err = calculator
        .load_external(&DefinitionFile::new("/nonexistent/definitions.json"))
        .unwrap_err();
    assert!(matches!(err, IndicatorError::SourceUnavailable { .. }));
    assert_eq!(calculator.list_indicators(), before);

    let outcomes: BTreeMap<_, _> = calculator.calculate_all(None);
    assert_eq!(outcomes.len(), before.len());
}
