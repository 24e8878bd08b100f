//! Anchor discovery: inferring the canonical record width.
//!
//! The pass keeps one running number, the absolute delimiter count since the
//! start of the file, and records its value at the start of every anchor
//! match. Because destroyed newlines remove line structure but never remove
//! delimiters, the count deltas between consecutive anchors survive the
//! corruption intact. The histogram of those deltas peaks at the true record
//! width; noise (anchor-shaped bytes inside a corrupted field) lands on
//! scattered small deltas that lose the vote.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Serialize;
use tracing::debug;

use crate::config::StitchConfig;
use crate::engine::count_delimiters;
use crate::error::StitchError;
use crate::io::{LineEndings, LineReader};

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of the discovery pass over one input.
#[derive(Debug, Clone, Serialize)]
pub struct WidthReport {
    /// Inferred canonical width: delimiters per well-formed record.
    pub width: usize,
    /// Total anchor matches observed.
    pub anchors: u64,
    /// Frequency of every observed delta between consecutive anchors,
    /// including degenerate zero deltas excluded from the vote.
    pub histogram: BTreeMap<usize, u64>,
    /// Physical lines scanned.
    pub lines: u64,
    /// Line-ending style seen while scanning.
    pub line_endings: LineEndings,
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Scans the whole input and infers the canonical record width.
///
/// The width is the mode of the anchor-to-anchor delimiter deltas; a tie is
/// broken toward the larger delta, since spurious anchor matches inside
/// corrupted fields shorten deltas but never lengthen them. Fewer than two
/// usable anchors means the input does not carry the expected structure at
/// all, which is the one condition the engine refuses to guess through.
pub fn discover_width<R: BufRead>(
    reader: R,
    config: &StitchConfig,
) -> Result<WidthReport, StitchError> {
    let anchor = config.anchor.compile()?;
    let delimiter = config.delimiter_byte();

    let mut lines = LineReader::new(reader);
    let mut total: u64 = 0;
    let mut previous: Option<u64> = None;
    let mut first: Option<u64> = None;
    let mut anchors: u64 = 0;
    let mut histogram: BTreeMap<usize, u64> = BTreeMap::new();

    while let Some(line) = lines.next_line()? {
        for m in anchor.find_iter(line) {
            let at_match = total + count_delimiters(&line[..m.start()], delimiter) as u64;
            anchors += 1;
            if first.is_none() {
                first = Some(at_match);
            }
            if let Some(prev) = previous {
                let delta = (at_match - prev) as usize;
                *histogram.entry(delta).or_insert(0) += 1;
            }
            previous = Some(at_match);
        }
        total += count_delimiters(line, delimiter) as u64;
    }

    // Zero deltas come from anchors with no delimiter between them, which can
    // never describe a record; they stay in the histogram as a diagnostic but
    // do not vote.
    let width = histogram
        .iter()
        .filter(|(delta, _)| **delta > 0)
        .max_by_key(|(delta, count)| (**count, **delta))
        .map(|(delta, _)| *delta)
        .ok_or(StitchError::FormatUnrecognized { anchors })?;

    if let Some(observed) = first {
        if observed != config.anchor.offset as u64 {
            debug!(
                expected = config.anchor.offset,
                observed,
                "[WIDTH] first anchor offset differs from the configured hint"
            );
        }
    }

    let report = WidthReport {
        width,
        anchors,
        histogram,
        lines: lines.lines_read(),
        line_endings: lines.line_endings(),
    };
    debug!(
        width = report.width,
        anchors = report.anchors,
        lines = report.lines,
        "[WIDTH] canonical width inferred"
    );
    Ok(report)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StitchConfig;

    /// A well-formed record in the default anchor shape: the timestamp and
    /// identifier pair sit at delimiter offset 2, five delimiters total.
    fn record(i: usize) -> String {
        format!("name{i}\tcode{i}\t1700000000\t1234567890123\t9876543210987\tnote{i}")
    }

    fn discover(input: &str, config: &StitchConfig) -> Result<WidthReport, StitchError> {
        discover_width(input.as_bytes(), config)
    }

    #[test]
    fn infers_width_from_clean_records() {
        let input: String = (0..4).map(|i| record(i) + "\n").collect();
        let report =
            discover(&input, &StitchConfig::default()).expect("Discovery should succeed");

        assert_eq!(report.width, 5);
        assert_eq!(report.anchors, 4);
        assert_eq!(report.histogram.get(&5), Some(&3));
        assert_eq!(report.lines, 4);
        assert_eq!(report.line_endings, LineEndings::LF);
    }

    #[test]
    fn destroyed_newlines_do_not_disturb_the_deltas() {
        // Record 1 is torn across three physical lines; the absolute
        // delimiter count is unchanged, so the inferred width is too.
        let mut input = record(0) + "\n";
        let torn = record(1);
        input.push_str(&torn[..4]);
        input.push('\n');
        input.push_str(&torn[4..9]);
        input.push('\n');
        input.push_str(&torn[9..]);
        input.push('\n');
        input.push_str(&record(2));
        input.push('\n');

        let report =
            discover(&input, &StitchConfig::default()).expect("Discovery should succeed");
        assert_eq!(report.width, 5);
        assert_eq!(report.anchors, 3);
        assert_eq!(report.lines, 5);
    }

    #[test]
    fn tie_breaks_toward_the_larger_delta() {
        let config = StitchConfig::default().anchor_pattern(r"@\d");
        // Anchor positions 0, 4, 8, 14, 20: deltas 4, 4, 6, 6.
        let input = "@1\ta\tb\tc\t@2\ta\tb\tc\t@3\ta\tb\tc\td\te\t@4\ta\tb\tc\td\te\t@5\n";
        let report = discover(input, &config).expect("Discovery should succeed");

        assert_eq!(report.histogram.get(&4), Some(&2));
        assert_eq!(report.histogram.get(&6), Some(&2));
        assert_eq!(report.width, 6, "A tie must resolve to the larger delta");
    }

    #[test]
    fn anchors_across_lines_and_within_one_line_both_count() {
        let config = StitchConfig::default().anchor_pattern(r"@\d");
        let input = "@1\ta\tb\t@2\nx\ty\tz\t@3\n";
        let report = discover(input, &config).expect("Discovery should succeed");
        assert_eq!(report.anchors, 3);
        assert_eq!(report.histogram.get(&3), Some(&2));
        assert_eq!(report.width, 3);
    }

    #[test]
    fn zero_anchors_is_format_unrecognized() {
        let err = discover("plain\ttext\twithout\tanchors\n", &StitchConfig::default())
            .expect_err("No anchors should fail discovery");
        assert!(matches!(err, StitchError::FormatUnrecognized { anchors: 0 }));
    }

    #[test]
    fn a_single_anchor_is_format_unrecognized() {
        let input = record(0) + "\n";
        let err = discover(&input, &StitchConfig::default())
            .expect_err("One anchor yields no delta to vote with");
        assert!(matches!(err, StitchError::FormatUnrecognized { anchors: 1 }));
    }

    #[test]
    fn adjacent_anchors_with_no_delimiters_are_unusable() {
        let config = StitchConfig::default().anchor_pattern(r"@\d");
        let err = discover("@1@2\n", &config)
            .expect_err("Only a zero delta should leave nothing to vote with");
        assert!(matches!(err, StitchError::FormatUnrecognized { anchors: 2 }));
    }

    #[test]
    fn empty_input_is_format_unrecognized() {
        let err = discover("", &StitchConfig::default())
            .expect_err("An empty input has no anchors");
        assert!(matches!(err, StitchError::FormatUnrecognized { anchors: 0 }));
    }

    #[test]
    fn reports_crlf_line_endings() {
        let input: String = (0..3).map(|i| record(i) + "\r\n").collect();
        let report =
            discover(&input, &StitchConfig::default()).expect("Discovery should succeed");
        assert_eq!(report.width, 5);
        assert_eq!(report.line_endings, LineEndings::CRLF);
    }
}
