//! Static catalogue of survey modules
//!
//! Each module of the annual survey is a separate extract with its own record
//! granularity. This module holds the per-module key columns, the variables
//! analysts expect to find, the file name template used by loaders and the
//! column renames that harmonise expansion factors across survey vintages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cluster (conglomerate) identifier, first part of the household key
pub const CONGLOME: &str = "conglome";
/// Dwelling identifier within a cluster
pub const DWELLING_ID: &str = "vivienda";
/// Household identifier within a dwelling
pub const HOUSEHOLD_ID: &str = "hogar";
/// Person identifier, unique within a household
pub const PERSON_ID: &str = "codperso";

/// Composite key identifying one household
pub const HOUSEHOLD_KEY: [&str; 3] = [CONGLOME, DWELLING_ID, HOUSEHOLD_ID];
/// Composite key identifying one person
pub const PERSON_KEY: [&str; 4] = [CONGLOME, DWELLING_ID, HOUSEHOLD_ID, PERSON_ID];

/// Canonical name of the survey year column
pub const YEAR_COLUMN: &str = "year";
/// Spellings of the year column seen across vintages, after lower-casing
pub const YEAR_VARIANTS: [&str; 4] = ["año", "ano", "anio", "a_o"];

/// Token shared by every expansion-factor column
pub const WEIGHT_BASE_TOKEN: &str = "factor07";
/// Household weight as it appears after the backbone join
pub const HOUSEHOLD_WEIGHT: &str = "factor07_sum";
/// Person-level weight
pub const PERSON_WEIGHT: &str = "factor07_per";
/// Education-module weight
pub const EDUCATION_WEIGHT: &str = "factor07_edu";
/// Employment-module weight
pub const EMPLOYMENT_WEIGHT: &str = "factor07_emp";

/// Expansion-factor columns carried by the survey modules after renaming
pub const WEIGHT_COLUMNS: [&str; 2] = ["factor07", "factora07"];

/// Summary-origin weight columns and the household-weight names indicators rely on
pub const HOUSEHOLD_WEIGHT_RENAMES: [(&str, &str); 2] = [
    ("factor07", "factor07_sum"),
    ("factora07", "factora07_sum"),
];

/// One record type of the annual survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// Household summary (one row per household, carries the household weight)
    HouseholdSummary,
    /// Dwelling characteristics (one row per household)
    Dwelling,
    /// Household members (one row per person)
    Person,
    /// Education questionnaire (one row per person)
    Education,
    /// Employment and income questionnaire (one row per person)
    Employment,
}

impl ModuleKind {
    /// Every module, in merge precedence order
    pub const ALL: [Self; 5] = [
        Self::HouseholdSummary,
        Self::Dwelling,
        Self::Person,
        Self::Education,
        Self::Employment,
    ];

    /// Stable snake-case name used in logs, reports and storage
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HouseholdSummary => "household_summary",
            Self::Dwelling => "dwelling",
            Self::Person => "person",
            Self::Education => "education",
            Self::Employment => "employment",
        }
    }

    /// Columns that uniquely identify a record at this module's granularity
    #[must_use]
    pub const fn key_columns(self) -> &'static [&'static str] {
        match self {
            Self::HouseholdSummary | Self::Dwelling => &HOUSEHOLD_KEY,
            Self::Person | Self::Education | Self::Employment => &PERSON_KEY,
        }
    }

    /// Variables expected for analysis; their absence only produces warnings
    #[must_use]
    pub const fn critical_vars(self) -> &'static [&'static str] {
        match self {
            Self::HouseholdSummary => &[
                "factor07", "factor", "mieperho", "pobreza", "dominio", "estrato",
            ],
            Self::Dwelling => &["p101", "p102", "p103", "p104", "p105"],
            Self::Person => &["p203", "p204", "p205", "p207"],
            Self::Education => &["p306", "p307"],
            Self::Employment => &["ocu500"],
        }
    }

    /// File name template, without extension; `{year}` is substituted by loaders
    #[must_use]
    pub const fn filename_pattern(self) -> &'static str {
        match self {
            Self::HouseholdSummary => "sumaria-{year}",
            Self::Dwelling => "enaho01-{year}-100",
            Self::Person => "enaho01-{year}-200",
            Self::Education => "enaho01a-{year}-300",
            Self::Employment => "enaho01a-{year}-500",
        }
    }

    /// Resolve the file name template for one year
    #[must_use]
    pub fn file_stem(self, year: i32) -> String {
        self.filename_pattern().replace("{year}", &year.to_string())
    }

    /// Source-to-canonical column renames for this module
    #[must_use]
    pub const fn rename_rules(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::HouseholdSummary => &[("factor07a", "factora07")],
            Self::Dwelling => &[],
            Self::Person | Self::Education => &[("facpob07", "factor07")],
            Self::Employment => &[("fac500a", "factor07"), ("fac500", "factor07")],
        }
    }

    /// Suffix marking columns of this module that collided during a merge
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::HouseholdSummary => "_sum",
            Self::Dwelling => "_viv",
            Self::Person => "_per",
            Self::Education => "_edu",
            Self::Employment => "_emp",
        }
    }

    /// Whether records of this module are people rather than households
    #[must_use]
    pub const fn is_person_level(self) -> bool {
        matches!(self, Self::Person | Self::Education | Self::Employment)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "household_summary" | "sumarias" | "sumaria" => Ok(Self::HouseholdSummary),
            "dwelling" | "vivienda" => Ok(Self::Dwelling),
            "person" | "personas" => Ok(Self::Person),
            "education" | "educacion" => Ok(Self::Education),
            "employment" | "empleo_ingresos" => Ok(Self::Employment),
            other => Err(format!("Unknown survey module: {other}")),
        }
    }
}
