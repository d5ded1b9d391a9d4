use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use log::{info, warn};
use survey_merge::indicators::{DefinitionFile, IndicatorSource};
use survey_merge::{
    FileStore, IndicatorRegistry, ParquetModuleLoader, SurveyConfig, SurveyPipeline,
};

/// First and last year of the survey's current methodology
const DEFAULT_YEARS: (i32, i32) = (2004, 2024);

/// Merge annual household-survey modules and compute indicators per year
#[derive(Parser, Debug)]
#[command(name = "survey-merge", version, long_about = None)]
struct Args {
    /// Directory holding one sub-directory of Parquet exports per year
    raw_dir: PathBuf,

    /// Directory the processed tables are written under
    output_dir: PathBuf,

    /// First year to process
    #[arg(default_value_t = DEFAULT_YEARS.0)]
    first_year: i32,

    /// Last year to process; defaults to the latest methodology year
    last_year: Option<i32>,

    /// Merge only, without computing indicators
    #[arg(long)]
    no_indicators: bool,

    /// JSON file with extra indicator definitions
    #[arg(long, value_name = "FILE")]
    definitions: Option<PathBuf>,
}

impl Args {
    fn years(&self) -> (i32, i32) {
        let last = self
            .last_year
            .unwrap_or_else(|| DEFAULT_YEARS.1.max(self.first_year));
        (self.first_year, last)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if !args.raw_dir.is_dir() {
        bail!("Raw data directory not found: {}", args.raw_dir.display());
    }

    let store = FileStore::new(&args.output_dir)
        .with_context(|| format!("Failed to prepare {}", args.output_dir.display()))?;

    let mut registry = IndicatorRegistry::builtin();
    if let Some(path) = &args.definitions {
        match DefinitionFile::new(path).indicators() {
            Ok(entries) => {
                let count = registry.extend(entries);
                info!("Loaded {count} indicator definitions from {}", path.display());
            }
            Err(e) => warn!("Ignoring indicator definitions: {e}"),
        }
    }

    let pipeline = SurveyPipeline::new(
        ParquetModuleLoader::new(&args.raw_dir),
        store,
        SurveyConfig::default(),
    )
    .with_registry(registry);

    let (first, last) = args.years();
    info!("Processing years {first}-{last} from {}", args.raw_dir.display());
    let results = pipeline.process_years(first..=last, !args.no_indicators);

    info!("Merged tables: {}", pipeline.store().merged_dir().display());
    info!("Indicators: {}", pipeline.store().indicators_dir().display());
    if results.values().all(|ok| !ok) && !results.is_empty() {
        bail!("No year was processed successfully");
    }
    Ok(())
}
