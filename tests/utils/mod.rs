//! In-memory module fixtures shaped like the survey's raw exports

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use survey_merge::{ModuleKind, ModuleTables, Preprocessor};

/// Household key as (conglome, vivienda, hogar)
pub type Household = (i32, i32, i32);

/// Two households: the first with three members, the second with two
pub const HOUSEHOLDS: [Household; 2] = [(101, 1, 1), (101, 2, 1)];

pub const YEAR: i32 = 2019;

#[must_use]
pub fn ints(values: &[i32]) -> ArrayRef {
    Arc::new(Int32Array::from(values.to_vec()))
}

#[must_use]
pub fn floats(values: &[f64]) -> ArrayRef {
    Arc::new(Float64Array::from(values.to_vec()))
}

#[must_use]
pub fn strings(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

/// Build a batch from named columns
#[must_use]
pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    let fields = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect::<Vec<_>>();
    RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        columns.into_iter().map(|(_, array)| array).collect(),
    )
    .expect("fixture columns have equal length")
}

fn key_columns(households: &[Household]) -> Vec<(&'static str, ArrayRef)> {
    vec![
        ("CONGLOME", ints(&households.iter().map(|h| h.0).collect::<Vec<_>>())),
        ("VIVIENDA", ints(&households.iter().map(|h| h.1).collect::<Vec<_>>())),
        ("HOGAR", ints(&households.iter().map(|h| h.2).collect::<Vec<_>>())),
    ]
}

/// Household summary with upper-case raw names, a year column and weights
#[must_use]
pub fn summary(households: &[Household], members: &[i32]) -> RecordBatch {
    let n = households.len();
    let mut columns = key_columns(households);
    columns.extend([
        ("AÑO", ints(&vec![YEAR; n])),
        ("MIEPERHO", ints(members)),
        ("DOMINIO", strings(&vec!["costa"; n])),
        ("FACTOR07", floats(&vec![150.0; n])),
        ("FACTOR07A", floats(&vec![140.0; n])),
    ]);
    batch(columns)
}

/// Dwelling characteristics; shares `dominio` with the summary
#[must_use]
pub fn dwelling(households: &[Household]) -> RecordBatch {
    let n = households.len();
    let mut columns = key_columns(households);
    columns.extend([
        ("P101", ints(&vec![1; n])),
        ("DOMINIO", strings(&vec!["costa"; n])),
    ]);
    batch(columns)
}

/// One person row: household, person id, relationship (1 = head), sex
pub type Person = (Household, i32, i32, i32);

/// The five people living in [`HOUSEHOLDS`]
#[must_use]
pub fn people() -> Vec<Person> {
    let [a, b] = HOUSEHOLDS;
    vec![
        (a, 1, 1, 1),
        (a, 2, 2, 2),
        (a, 3, 3, 1),
        (b, 1, 1, 2),
        (b, 2, 3, 2),
    ]
}

fn person_keys(persons: &[Person]) -> Vec<(&'static str, ArrayRef)> {
    let households: Vec<Household> = persons.iter().map(|p| p.0).collect();
    let mut columns = key_columns(&households);
    columns.push(("CODPERSO", ints(&persons.iter().map(|p| p.1).collect::<Vec<_>>())));
    columns
}

/// Person module with the legacy person weight name
#[must_use]
pub fn person(persons: &[Person]) -> RecordBatch {
    let n = persons.len();
    let mut columns = person_keys(persons);
    columns.extend([
        ("P203", ints(&persons.iter().map(|p| p.2).collect::<Vec<_>>())),
        ("P207", ints(&persons.iter().map(|p| p.3).collect::<Vec<_>>())),
        ("FACPOB07", floats(&vec![100.0; n])),
    ]);
    batch(columns)
}

/// Education module; `schooling` holds one value per person
#[must_use]
pub fn education(persons: &[Person], schooling: &[i32]) -> RecordBatch {
    let n = persons.len();
    let mut columns = person_keys(persons);
    columns.extend([
        ("P301A", ints(schooling)),
        ("FACPOB07", floats(&vec![110.0; n])),
    ]);
    batch(columns)
}

/// Employment module; `occupation` holds one value per person
#[must_use]
pub fn employment(persons: &[Person], occupation: &[i32]) -> RecordBatch {
    let n = persons.len();
    let mut columns = person_keys(persons);
    columns.extend([
        ("OCU500", ints(occupation)),
        ("FAC500A", floats(&vec![120.0; n])),
    ]);
    batch(columns)
}

/// Every module of [`YEAR`] for the two fixture households
#[must_use]
pub fn full_year() -> ModuleTables {
    let persons = people();
    ModuleTables::new(YEAR)
        .with(ModuleKind::HouseholdSummary, summary(&HOUSEHOLDS, &[3, 2]))
        .with(ModuleKind::Dwelling, dwelling(&HOUSEHOLDS))
        .with(ModuleKind::Person, person(&persons))
        .with(ModuleKind::Education, education(&persons, &[11, 14, 6, 9, 99]))
        .with(ModuleKind::Employment, employment(&persons, &[1, 4, 2, 3, 6]))
}

/// Normalise and clean raw tables as the pipeline does
#[must_use]
pub fn prepared(raw: ModuleTables) -> ModuleTables {
    Preprocessor::default()
        .prepare_year(raw)
        .expect("fixture tables clean without error")
}

/// Column names of a batch
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch.schema().fields().iter().map(|f| f.name().clone()).collect()
}
