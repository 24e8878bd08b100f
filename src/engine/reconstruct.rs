//! Streaming reconstruction: reassembling logical records from corrupted
//! physical lines.
//!
//! The pass walks the input line by line, feeding a single
//! [`RecordAccumulator`]. A record finalizes as soon as its delimiter count
//! reaches the canonical width, or earlier when a guardrail ceiling trips,
//! or at end of stream with whatever remains buffered. Finalized records are
//! classified against the width: exact and near-width records are regularized
//! and accepted, everything else is routed byte-for-byte to the reject
//! stream. Nothing is ever dropped; accepted plus rejected always equals the
//! number of finalized records.

use std::io::{BufRead, Write};

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StitchConfig;
use crate::engine::RecordAccumulator;
use crate::error::StitchError;
use crate::io::LineReader;

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of one finalized record against the canonical width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Exactly the canonical width; accepted unchanged.
    Exact,
    /// Short within tolerance; accepted after padding with empty fields.
    Padded,
    /// Long within tolerance; accepted after truncating trailing fields.
    Truncated,
    /// Implausibly short; rejected untouched.
    Fragment,
    /// Outside the repairable band in either direction; rejected untouched.
    Ambiguous,
}

/// Counters for one reconstruction pass.
///
/// `accepted + rejected == records` holds on every return, and
/// `padded + truncated <= accepted` while
/// `fragments + ambiguous + overflows == rejected`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairStats {
    /// Canonical width the pass ran against.
    pub width: usize,
    /// Records finalized in total.
    pub records: u64,
    /// Records written to the accepted stream.
    pub accepted: u64,
    /// Records written to the reject stream.
    pub rejected: u64,
    /// Accepted records that needed trailing padding.
    pub padded: u64,
    /// Accepted records that had trailing fields truncated.
    pub truncated: u64,
    /// Rejects classified as fragments.
    pub fragments: u64,
    /// Rejects outside the repairable band.
    pub ambiguous: u64,
    /// Rejects force-flushed by a guardrail ceiling.
    pub overflows: u64,
    /// Placeholder splices performed while reassembling.
    pub splices: u64,
    /// Physical lines consumed.
    pub lines: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Streams one input through the accumulator, writing regularized records to
/// `accepted` and everything unrepairable to `rejected`.
///
/// `width` is the canonical delimiter count, from [`discover_width`] or a
/// configured override. The two output streams receive complete
/// newline-terminated lines in input order; reject lines are the record
/// bytes exactly as accumulated, splices included but never regularized.
///
/// [`discover_width`]: crate::engine::discover_width
pub fn reconstruct_records<R, A, J>(
    reader: R,
    width: usize,
    config: &StitchConfig,
    accepted: &mut A,
    rejected: &mut J,
) -> Result<RepairStats, StitchError>
where
    R: BufRead,
    A: Write,
    J: Write,
{
    let mut acc = RecordAccumulator::new(
        config.delimiter_byte(),
        config.placeholder.as_bytes(),
        config.max_record_bytes,
        width.saturating_mul(config.width_multiplier),
    );
    let mut stats = RepairStats {
        width,
        ..Default::default()
    };
    let mut lines = LineReader::new(reader);

    while let Some(line) = lines.next_line()? {
        acc.begin_line();
        if acc.append(line) {
            stats.splices += 1;
        }

        // Guardrails outrank the natural boundary: a record that blew a
        // ceiling goes to the rejects even if its delimiter count happens to
        // land in the acceptable band.
        if acc.is_runaway() {
            flush_overflow(&mut acc, rejected, &mut stats)?;
        } else if acc.delimiters() >= width {
            finalize(&mut acc, width, config, accepted, rejected, &mut stats)?;
        }
    }

    // End of stream: whatever is still buffered finalizes under the same
    // policy as a natural boundary.
    if !acc.is_empty() {
        finalize(&mut acc, width, config, accepted, rejected, &mut stats)?;
    }

    stats.lines = lines.lines_read();
    debug!(
        width,
        records = stats.records,
        accepted = stats.accepted,
        rejected = stats.rejected,
        splices = stats.splices,
        lines = stats.lines,
        "[REPAIR] reconstruction pass complete"
    );
    Ok(stats)
}

// ─────────────────────────────────────────────────────────────────────────────
// Finalization Policy
// ─────────────────────────────────────────────────────────────────────────────

/// Classifies a finalized record by its delimiter count.
fn classify(delimiters: usize, width: usize, config: &StitchConfig) -> Disposition {
    if delimiters == width {
        return Disposition::Exact;
    }
    if delimiters < width {
        if width - delimiters <= config.repair_tolerance {
            return Disposition::Padded;
        }
    } else if delimiters - width <= config.repair_tolerance {
        return Disposition::Truncated;
    }
    if delimiters < config.min_delimiters
        || (delimiters as f64) < config.fragment_fraction * width as f64
    {
        Disposition::Fragment
    } else {
        Disposition::Ambiguous
    }
}

/// Appends empty trailing fields until the record has exactly `width`
/// delimiters.
fn pad_record(record: &mut Vec<u8>, delimiters: usize, width: usize, delimiter: u8) {
    for _ in delimiters..width {
        record.push(delimiter);
    }
}

/// Cuts the record at the delimiter that would start field `width + 2`,
/// keeping the leading `width + 1` fields.
fn truncate_record(record: &mut Vec<u8>, width: usize, delimiter: u8) {
    let mut seen = 0usize;
    for (idx, &byte) in record.iter().enumerate() {
        if byte == delimiter {
            seen += 1;
            if seen > width {
                record.truncate(idx);
                return;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn finalize<A, J>(
    acc: &mut RecordAccumulator,
    width: usize,
    config: &StitchConfig,
    accepted: &mut A,
    rejected: &mut J,
    stats: &mut RepairStats,
) -> Result<(), StitchError>
where
    A: Write,
    J: Write,
{
    let (mut record, delimiters) = acc.take_record();
    stats.records += 1;

    match classify(delimiters, width, config) {
        Disposition::Exact => {
            write_record(accepted, &record)?;
            stats.accepted += 1;
        }
        Disposition::Padded => {
            pad_record(&mut record, delimiters, width, config.delimiter_byte());
            write_record(accepted, &record)?;
            stats.accepted += 1;
            stats.padded += 1;
        }
        Disposition::Truncated => {
            truncate_record(&mut record, width, config.delimiter_byte());
            write_record(accepted, &record)?;
            stats.accepted += 1;
            stats.truncated += 1;
        }
        Disposition::Fragment => {
            debug!(
                record = stats.records,
                delimiters, width, "[REPAIR] fragment rejected"
            );
            write_record(rejected, &record)?;
            stats.rejected += 1;
            stats.fragments += 1;
        }
        Disposition::Ambiguous => {
            debug!(
                record = stats.records,
                delimiters, width, "[REPAIR] ambiguous record rejected"
            );
            write_record(rejected, &record)?;
            stats.rejected += 1;
            stats.ambiguous += 1;
        }
    }
    Ok(())
}

fn flush_overflow<J: Write>(
    acc: &mut RecordAccumulator,
    rejected: &mut J,
    stats: &mut RepairStats,
) -> Result<(), StitchError> {
    let (record, delimiters) = acc.take_record();
    stats.records += 1;
    stats.rejected += 1;
    stats.overflows += 1;
    warn!(
        record = stats.records,
        delimiters,
        bytes = record.len(),
        "[REPAIR] accumulator ceiling hit, record force-flushed to rejects; \
         the width or anchor pattern may not fit this input"
    );
    write_record(rejected, &record)
}

fn write_record<W: Write>(sink: &mut W, record: &[u8]) -> Result<(), StitchError> {
    sink.write_all(record)?;
    sink.write_all(b"\n")?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
