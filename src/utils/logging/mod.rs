//! Logging and progress helpers

pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_shape, log_warning};
pub use progress::{create_year_progress_bar, finish_progress_bar};
