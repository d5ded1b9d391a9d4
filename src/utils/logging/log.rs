//! Consistently formatted log lines for file operations and table shapes

use std::path::Path;
use std::time::Duration;

use arrow::record_batch::RecordBatch;

/// Log the start of a file operation
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{operation} {}", path.display());
}

/// Log the completion of a file operation
///
/// # Arguments
/// * `operation` - Past-tense verb describing the operation
/// * `path` - File or directory operated on
/// * `rows` - Number of rows handled
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(operation: &str, path: &Path, rows: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {operation} {rows} rows from {} in {duration:?}",
            path.display()
        ),
        None => log::info!("Successfully {operation} {rows} rows from {}", path.display()),
    }
}

/// Log a warning, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{message}: {}", path.display());
    } else {
        log::warn!("{message}");
    }
}

/// Log a table's shape as `rows x columns`
pub fn log_shape(label: &str, table: &RecordBatch) {
    log::info!("{label}: {} rows x {} columns", table.num_rows(), table.num_columns());
}
