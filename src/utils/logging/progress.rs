//! Progress bars for multi-year runs, using indicatif

use indicatif::{ProgressBar, ProgressStyle};

/// Template for the per-year progress bar
pub const YEAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} years {msg}";

/// Create a progress bar over a number of survey years
///
/// Falls back to indicatif's default style if the template does not parse.
#[must_use]
pub fn create_year_progress_bar(years: u64, description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(years);
    match ProgressStyle::default_bar().template(YEAR_TEMPLATE) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Using default progress style: {e}"),
    }

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

/// Finish a progress bar, optionally replacing its message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    if let Some(msg) = message {
        pb.finish_with_message(msg.to_string());
    } else {
        pb.finish();
    }
}
