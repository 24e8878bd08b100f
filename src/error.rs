use std::path::PathBuf;

use thiserror::Error;

/// Application-wide error type.
///
/// Malformed records are deliberately absent from this taxonomy: they are
/// data, routed to the reject stream, never surfaced as errors.
#[derive(Debug, Error)]
pub enum StitchError {
    // ── Discovery ─────────────────────────────────────────────────────────────
    #[error("not a recognizable record format: only {anchors} usable anchor match(es) found")]
    FormatUnrecognized { anchors: u64 },

    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("invalid anchor pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O ───────────────────────────────────────────────────────────────────
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stream I/O failure: {0}")]
    Stream(#[from] std::io::Error),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl StitchError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StitchError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort a multi-file run.
    ///
    /// A format-unrecognized file is fatal for that file only; its siblings
    /// keep processing. Everything else poisons the run.
    pub fn aborts_run(&self) -> bool {
        !matches!(self, StitchError::FormatUnrecognized { .. })
    }
}
