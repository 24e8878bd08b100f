//! External-facing driver: repairs whole file sets with bounded concurrency.

mod runner;
mod scheduler;

pub use runner::{repair_file, repair_files, FileOutcome, FileReport, RunReport, RunTotals};
pub use scheduler::{FilePermit, FileScheduler};
