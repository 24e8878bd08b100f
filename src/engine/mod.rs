//! The reconstruction core: width discovery and streaming record repair.
//!
//! The engine runs in two passes over each input. `discover_width` scans the
//! file once and infers the canonical record width from the spacing of anchor
//! matches. `reconstruct_records` then streams the file again, reassembling
//! logical records around destroyed newlines and routing every record to
//! either the accepted or the rejected stream. Both passes share the same
//! line framing and never buffer more than one record.

mod accumulator;
mod discovery;
mod reconstruct;

pub use accumulator::RecordAccumulator;
pub use discovery::{discover_width, WidthReport};
pub use reconstruct::{reconstruct_records, Disposition, RepairStats};

/// Counts occurrences of the delimiter byte in a slice.
pub(crate) fn count_delimiters(bytes: &[u8], delimiter: u8) -> usize {
    bytes.iter().filter(|&&b| b == delimiter).count()
}
