//! Streaming repair of delimiter-corrupted TSV extracts.
//!
//! Warehouse exports that carry free text often arrive with embedded newlines
//! written out raw, tearing logical records across physical lines. This crate
//! reassembles them in two passes per file: [`engine::discover_width`] infers
//! the canonical delimiter count from the spacing of anchor matches, then
//! [`engine::reconstruct_records`] streams the file through a single-record
//! accumulator, splicing a placeholder where newlines were destroyed and
//! routing every record to an accepted or rejected stream. The
//! [`driver`] fans that pipeline across file sets with bounded concurrency.
//!
//! Malformed records are data, not faults: they land byte-for-byte in the
//! reject output and never abort a run. Only I/O failures do.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod io;

pub use config::{AnchorSpec, StitchConfig};
pub use driver::{repair_file, repair_files, FileOutcome, FileReport, RunReport, RunTotals};
pub use engine::{discover_width, reconstruct_records, RepairStats, WidthReport};
pub use error::StitchError;
