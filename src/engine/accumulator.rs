//! The single-record accumulator driving streaming reconstruction.
//!
//! One accumulator instance carries the record currently being assembled:
//! a byte buffer, a running delimiter count, and a pending-join flag. The
//! flag is raised whenever a new physical line arrives while content is
//! already buffered, which means the previous line break was a destroyed
//! embedded newline rather than a record boundary. The next `append` then
//! splices the configured placeholder before the new content, consuming
//! the flag.
//!
//! The accumulator never decides *when* a record is complete. Callers
//! inspect `delimiters()` and `is_runaway()` after each append and call
//! `take_record` to drain the buffer once a boundary or guardrail is hit.

use crate::engine::count_delimiters;

#[derive(Debug)]
pub struct RecordAccumulator {
    buf: Vec<u8>,
    delimiters: usize,
    pending_join: bool,
    delimiter: u8,
    placeholder: Vec<u8>,
    max_bytes: usize,
    max_delimiters: usize,
}

impl RecordAccumulator {
    /// Creates an empty accumulator.
    ///
    /// `max_bytes` and `max_delimiters` are the hard ceilings checked by
    /// `is_runaway`; the placeholder must not contain the delimiter so that
    /// splicing never perturbs the delimiter count.
    pub fn new(delimiter: u8, placeholder: &[u8], max_bytes: usize, max_delimiters: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            delimiters: 0,
            pending_join: false,
            delimiter,
            placeholder: placeholder.to_vec(),
            max_bytes,
            max_delimiters,
        }
    }

    /// Marks the start of a new physical line.
    ///
    /// When content is already buffered the new line continues the current
    /// record, so a placeholder splice becomes pending. On an empty
    /// accumulator this is a no-op.
    pub fn begin_line(&mut self) {
        if !self.buf.is_empty() {
            self.pending_join = true;
        }
    }

    /// Appends one physical line's content, splicing the placeholder first
    /// if a join is pending. Returns whether a splice happened.
    pub fn append(&mut self, line: &[u8]) -> bool {
        let spliced = self.pending_join;
        if spliced {
            self.buf.extend_from_slice(&self.placeholder);
            self.pending_join = false;
        }
        self.buf.extend_from_slice(line);
        self.delimiters += count_delimiters(line, self.delimiter);
        spliced
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// Running delimiter count of the buffered record.
    pub fn delimiters(&self) -> usize {
        self.delimiters
    }

    pub fn pending_join(&self) -> bool {
        self.pending_join
    }

    /// Whether the buffered record has crossed a guardrail ceiling and must
    /// be force-flushed regardless of its delimiter count.
    pub fn is_runaway(&self) -> bool {
        self.buf.len() > self.max_bytes || self.delimiters > self.max_delimiters
    }

    /// Drains the buffered record and resets to the empty state.
    ///
    /// Returns the record bytes together with their delimiter count as
    /// observed while accumulating.
    pub fn take_record(&mut self) -> (Vec<u8>, usize) {
        let record = std::mem::take(&mut self.buf);
        let delimiters = self.delimiters;
        self.delimiters = 0;
        self.pending_join = false;
        (record, delimiters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acc() -> RecordAccumulator {
        RecordAccumulator::new(b'\t', b"\\n", 1024, 64)
    }

    #[test]
    fn starts_empty() {
        let acc = acc();
        assert!(acc.is_empty());
        assert_eq!(acc.byte_len(), 0);
        assert_eq!(acc.delimiters(), 0);
        assert!(!acc.pending_join());
        assert!(!acc.is_runaway());
    }

    #[test]
    fn first_line_appends_without_splice() {
        let mut acc = acc();
        acc.begin_line();
        let spliced = acc.append(b"a\tb\tc");
        assert!(!spliced, "Nothing buffered, so no join should be pending");
        assert_eq!(acc.byte_len(), 5);
        assert_eq!(acc.delimiters(), 2);
    }

    #[test]
    fn continuation_line_splices_placeholder_once() {
        let mut acc = acc();
        acc.begin_line();
        acc.append(b"alpha");
        acc.begin_line();
        assert!(acc.pending_join());
        let spliced = acc.append(b"beta\tgamma");
        assert!(spliced);
        assert!(!acc.pending_join(), "Splice must consume the pending flag");

        let (record, delimiters) = acc.take_record();
        assert_eq!(record, b"alpha\\nbeta\tgamma");
        assert_eq!(delimiters, 1);
    }

    #[test]
    fn placeholder_never_changes_delimiter_count() {
        let mut acc = RecordAccumulator::new(b'\t', b"<NL>", 1024, 64);
        acc.begin_line();
        acc.append(b"a\tb");
        acc.begin_line();
        acc.append(b"c\td");
        assert_eq!(acc.delimiters(), 2);
        let (record, _) = acc.take_record();
        assert_eq!(record, b"a\tb<NL>c\td");
    }

    #[test]
    fn empty_continuation_line_still_splices() {
        // A blank physical line inside a record is a destroyed "\n\n" pair.
        let mut acc = acc();
        acc.begin_line();
        acc.append(b"head");
        acc.begin_line();
        acc.append(b"");
        acc.begin_line();
        acc.append(b"tail");
        let (record, _) = acc.take_record();
        assert_eq!(record, b"head\\n\\ntail");
    }

    #[test]
    fn empty_line_on_empty_accumulator_stays_empty() {
        let mut acc = acc();
        acc.begin_line();
        acc.append(b"");
        assert!(acc.is_empty(), "A blank line must not start a record");
    }

    #[test]
    fn take_record_resets_all_state() {
        let mut acc = acc();
        acc.begin_line();
        acc.append(b"x\ty\tz");
        acc.begin_line();

        let (record, delimiters) = acc.take_record();
        assert_eq!(record, b"x\ty\tz");
        assert_eq!(delimiters, 2);
        assert!(acc.is_empty());
        assert_eq!(acc.delimiters(), 0);
        assert!(!acc.pending_join(), "Reset must clear a pending join");

        acc.begin_line();
        let spliced = acc.append(b"next");
        assert!(!spliced, "Fresh record must not inherit the old join flag");
    }

    #[test]
    fn delimiters_accumulate_across_lines() {
        let mut acc = acc();
        acc.begin_line();
        acc.append(b"a\tb\t");
        acc.begin_line();
        acc.append(b"c\td\te");
        assert_eq!(acc.delimiters(), 4);
    }

    #[test]
    fn byte_ceiling_trips_runaway() {
        let mut acc = RecordAccumulator::new(b'\t', b"\\n", 16, 64);
        acc.begin_line();
        acc.append(b"0123456789abcdef");
        assert!(!acc.is_runaway(), "Exactly at the ceiling is still fine");
        acc.begin_line();
        acc.append(b"!");
        assert!(acc.is_runaway());
    }

    #[test]
    fn delimiter_ceiling_trips_runaway() {
        let mut acc = RecordAccumulator::new(b'\t', b"\\n", 1024, 4);
        acc.begin_line();
        acc.append(b"a\tb\tc\td\te");
        assert!(!acc.is_runaway(), "Exactly at the ceiling is still fine");
        acc.begin_line();
        acc.append(b"f\tg");
        assert!(acc.is_runaway());
    }
}
