//! Line-oriented input for the repair passes.
//!
//! Both passes consume physical lines through [`LineReader`], which frames on
//! `\n`, strips LF and CRLF terminators uniformly (interior bytes untouched),
//! removes a UTF-8 BOM from the first line, and tallies the terminator styles
//! it saw. [`open_input`] produces the underlying stream for a local file,
//! decompressing `.gz` inputs transparently.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::StitchError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// UTF-8 BOM bytes.
pub(crate) const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Buffer size for reading input (64 KB).
const INPUT_BUFFER_SIZE: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// LineEndings
// ─────────────────────────────────────────────────────────────────────────────

/// Detected line ending style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEndings {
    /// Unix-style line endings (\n).
    LF,
    /// Windows-style line endings (\r\n).
    CRLF,
    /// Mixed line endings (both \n and \r\n found).
    Mixed,
    /// No line endings detected (single line or empty).
    Unknown,
}

// ─────────────────────────────────────────────────────────────────────────────
// LineReader
// ─────────────────────────────────────────────────────────────────────────────

/// Reads physical lines from a byte stream with uniform terminator handling.
///
/// Content is handled as raw bytes end to end; input that is not valid UTF-8
/// flows through unchanged.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    lines: u64,
    lf_lines: u64,
    crlf_lines: u64,
    at_start: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(4096),
            lines: 0,
            lf_lines: 0,
            crlf_lines: 0,
            at_start: true,
        }
    }

    /// Returns the next physical line without its terminator, or `None` at
    /// end of stream. A final line without a terminator is still returned.
    pub fn next_line(&mut self) -> std::io::Result<Option<&[u8]>> {
        self.buf.clear();
        let n = self.inner.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }

        if self.buf.ends_with(b"\n") {
            self.buf.pop();
            if self.buf.ends_with(b"\r") {
                self.buf.pop();
                self.crlf_lines += 1;
            } else {
                self.lf_lines += 1;
            }
        } else if self.buf.ends_with(b"\r") {
            // terminator-less final line of a CRLF file
            self.buf.pop();
        }

        if self.at_start {
            self.at_start = false;
            if self.buf.starts_with(UTF8_BOM) {
                self.buf.drain(..UTF8_BOM.len());
            }
        }

        self.lines += 1;
        Ok(Some(&self.buf))
    }

    /// Number of physical lines returned so far.
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// Line ending style observed so far.
    pub fn line_endings(&self) -> LineEndings {
        match (self.lf_lines > 0, self.crlf_lines > 0) {
            (true, true) => LineEndings::Mixed,
            (true, false) => LineEndings::LF,
            (false, true) => LineEndings::CRLF,
            (false, false) => LineEndings::Unknown,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// open_input
// ─────────────────────────────────────────────────────────────────────────────

/// Opens a local input file as a buffered byte stream.
///
/// Files with a `.gz` extension are decompressed transparently; multi-member
/// gzip archives (common for concatenated dumps) are handled.
///
/// # Errors
///
/// Returns `StitchError::Io` with the path if the file cannot be opened.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, StitchError> {
    let file = File::open(path).map_err(|e| StitchError::io(path, e))?;

    if has_gzip_extension(path) {
        let decoder = MultiGzDecoder::new(BufReader::with_capacity(INPUT_BUFFER_SIZE, file));
        Ok(Box::new(BufReader::with_capacity(INPUT_BUFFER_SIZE, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(INPUT_BUFFER_SIZE, file)))
    }
}

pub(crate) fn has_gzip_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
