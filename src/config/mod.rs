//! Configuration for module cleaning and merging.

pub mod modules;

pub use modules::*;

/// Digit-repeated codes the survey instruments use for "missing", sized to the field width
pub const MISSING_CODES: [i64; 6] = [999, 9999, 99999, 999_999, 9_999_999, 99_999_999];

/// What to do with a text column whose values only partly parse as numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Convert only when every non-null value parses, otherwise keep the column as text
    #[default]
    KeepText,
    /// Convert once any value parses; cells that do not parse become null
    NullOnFailure,
    /// Convert once any value parses; any cell that does not parse is an error
    Strict,
}

/// Configuration for the module cleaner
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// Sentinel values recoded to null in numeric columns
    pub missing_codes: Vec<i64>,
    /// Text-to-numeric coercion behavior
    pub coercion: CoercionPolicy,
    /// Trim and upper-case remaining text columns
    pub normalize_text: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            missing_codes: MISSING_CODES.to_vec(),
            coercion: CoercionPolicy::default(),
            normalize_text: true,
        }
    }
}

/// Configuration for the merge engine
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Summary-origin columns renamed to canonical household-weight names after the backbone join
    pub household_weight_renames: Vec<(String, String)>,
    /// Weight columns of person-level modules, tagged with the module suffix before joining
    pub person_weight_columns: Vec<String>,
    /// Person-level modules attached after the person module, in this order
    pub attachment_order: Vec<ModuleKind>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            household_weight_renames: HOUSEHOLD_WEIGHT_RENAMES
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
                .collect(),
            person_weight_columns: WEIGHT_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
            attachment_order: vec![ModuleKind::Education, ModuleKind::Employment],
        }
    }
}

/// Configuration for the whole survey pipeline
#[derive(Debug, Clone, Default)]
pub struct SurveyConfig {
    /// Module cleaner settings
    pub cleaner: CleanerConfig,
    /// Merge engine settings
    pub merge: MergeConfig,
}
