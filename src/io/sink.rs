//! Atomic output sink for record streams.
//!
//! Writes to a temporary file in the destination directory, then atomically
//! replaces the destination on `finish()`. If dropped before finishing, the
//! temporary file is cleaned up automatically, so an aborted repair leaves no
//! partial output behind.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StitchError;

/// An atomic line-oriented writer.
///
/// Implements [`std::io::Write`] so the reconstruction pass can stay
/// sink-agnostic; the temp file only reaches `final_path` via `finish()`.
pub struct AtomicLineWriter {
    writer: BufWriter<NamedTempFile>,
    final_path: PathBuf,
}

impl AtomicLineWriter {
    /// Creates a writer targeting the specified path.
    ///
    /// The temporary file is created in the same directory as `final_path`
    /// so the final rename stays on one filesystem.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be determined or the
    /// temporary file cannot be created.
    pub fn new(final_path: impl AsRef<Path>) -> Result<Self, StitchError> {
        let final_path = final_path.as_ref().to_path_buf();

        let parent_dir = final_path.parent().ok_or_else(|| {
            StitchError::InvalidConfig(format!(
                "cannot determine parent directory for: {}",
                final_path.display()
            ))
        })?;

        let temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| StitchError::io(parent_dir, e))?;

        Ok(Self {
            writer: BufWriter::new(temp_file),
            final_path,
        })
    }

    /// The destination path this writer will persist to.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flushes all buffers and atomically persists the file to the final
    /// path, consuming the writer.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or persisting fails; the temporary file
    /// is cleaned up either way.
    pub fn finish(self) -> Result<PathBuf, StitchError> {
        let named_temp = self.writer.into_inner().map_err(|e| {
            StitchError::Internal(format!("Failed to flush output buffer: {}", e.error()))
        })?;

        named_temp
            .persist(&self.final_path)
            .map_err(|e| StitchError::io(&self.final_path, e.error))?;

        Ok(self.final_path)
    }
}

impl Write for AtomicLineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}
