//! Configuration surface for the repair engine and file-set driver.
//!
//! All knobs recognized by the engine live on [`StitchConfig`]:
//! - anchor pattern and expected offset (offset is a hint, never enforced)
//! - canonical width override (skips the discovery pass)
//! - placeholder token spliced where embedded newlines were destroyed
//! - repair tolerance and fragment thresholds for the finalization policy
//! - accumulator guardrails (byte ceiling, delimiter-multiplier ceiling)
//!
//! The anchor pattern is stored as a string and compiled per invocation via
//! [`AnchorSpec::compile`], so no regex state is ever shared across files.
//! Configs load from TOML and can be adjusted with builder-style setters.

use std::path::Path;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StitchError;

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Default anchor pattern: a 10-digit field followed by two 10-20 digit
/// fields, tab-separated, on field boundaries. Matches epoch-seconds plus two
/// wide numeric identifiers once per well-formed record.
pub const DEFAULT_ANCHOR_PATTERN: &str = r"(?:^|\t)\d{10}\t\d{10,20}\t\d{10,20}(?:\t|$)";

/// Default expected delimiter offset of the anchor within a record.
pub const DEFAULT_ANCHOR_OFFSET: usize = 2;

/// Default placeholder for destroyed embedded newlines: the two characters
/// backslash + n, not an actual line feed.
pub const DEFAULT_PLACEHOLDER: &str = "\\n";

/// Default maximum column drift (short or long) still repaired.
pub const DEFAULT_REPAIR_TOLERANCE: usize = 1;

/// Default absolute delimiter floor below which a record is a fragment.
pub const DEFAULT_MIN_DELIMITERS: usize = 2;

/// Default fractional fragment threshold relative to the canonical width.
pub const DEFAULT_FRAGMENT_FRACTION: f64 = 0.6;

/// Default accumulator byte ceiling (8 MiB) before force-flush.
pub const DEFAULT_MAX_RECORD_BYTES: usize = 8 * 1024 * 1024;

/// Default delimiter-count ceiling as a multiple of the canonical width.
pub const DEFAULT_WIDTH_MULTIPLIER: usize = 4;

/// Default number of files processed concurrently by the driver.
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// AnchorSpec
// ─────────────────────────────────────────────────────────────────────────────

/// The structural fingerprint used to locate record boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSpec {
    /// Regular expression (byte-oriented) matched against each physical line.
    pub pattern: String,
    /// Expected delimiter offset of the anchor from the record start.
    /// Used only to log a mismatch against the first observed anchor.
    pub offset: usize,
}

impl Default for AnchorSpec {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_ANCHOR_PATTERN.to_string(),
            offset: DEFAULT_ANCHOR_OFFSET,
        }
    }
}

impl AnchorSpec {
    /// Compiles the pattern into a fresh byte regex.
    ///
    /// Called once per discovery invocation; compiled state is never shared
    /// across files.
    ///
    /// # Errors
    ///
    /// Returns `StitchError::InvalidPattern` if the pattern does not compile.
    pub fn compile(&self) -> Result<Regex, StitchError> {
        Regex::new(&self.pattern)
            .map_err(|e| StitchError::InvalidPattern(format!("{}: {}", self.pattern, e)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StitchConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for record discovery and reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Field delimiter (default: TAB). Must be ASCII.
    pub delimiter: char,
    /// Anchor pattern + expected offset.
    pub anchor: AnchorSpec,
    /// Canonical width override. When set, discovery is skipped for repair.
    pub width: Option<usize>,
    /// Token spliced into a record wherever an embedded newline was destroyed.
    /// This is a one-way normalization: a field that legitimately contained
    /// the token is indistinguishable after repair.
    pub placeholder: String,
    /// Maximum column drift from the canonical width still repaired by
    /// padding (short) or truncation (long).
    pub repair_tolerance: usize,
    /// Absolute delimiter floor; records below it are fragments.
    pub min_delimiters: usize,
    /// Fractional fragment threshold: records with fewer delimiters than
    /// `fragment_fraction * width` are fragments. Must be in (0, 1].
    pub fragment_fraction: f64,
    /// Accumulator byte ceiling; exceeding it force-flushes to rejects.
    pub max_record_bytes: usize,
    /// Delimiter-count ceiling as a multiple of the canonical width;
    /// exceeding it force-flushes to rejects. Must be at least 2 so the
    /// ceiling can never preempt the repairable-drift band.
    pub width_multiplier: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            anchor: AnchorSpec::default(),
            width: None,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            repair_tolerance: DEFAULT_REPAIR_TOLERANCE,
            min_delimiters: DEFAULT_MIN_DELIMITERS,
            fragment_fraction: DEFAULT_FRAGMENT_FRACTION,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            width_multiplier: DEFAULT_WIDTH_MULTIPLIER,
        }
    }
}

impl StitchConfig {
    /// Loads a config from a TOML file. Missing keys fall back to defaults;
    /// the result is not validated (call [`StitchConfig::validate`] once any
    /// overrides have been applied on top).
    ///
    /// # Errors
    ///
    /// Returns `StitchError::Io` if the file cannot be read and
    /// `StitchError::InvalidConfig` if it is not valid TOML.
    pub fn from_toml_path(path: &Path) -> Result<Self, StitchError> {
        let raw = std::fs::read_to_string(path).map_err(|e| StitchError::io(path, e))?;
        toml::from_str(&raw).map_err(|e| {
            StitchError::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    /// Sets the canonical width override.
    pub fn width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the field delimiter.
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the anchor pattern, keeping the offset hint.
    pub fn anchor_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.anchor.pattern = pattern.into();
        self
    }

    /// Sets the embedded-newline placeholder token.
    pub fn placeholder(mut self, token: impl Into<String>) -> Self {
        self.placeholder = token.into();
        self
    }

    /// Sets the repair tolerance.
    pub fn repair_tolerance(mut self, columns: usize) -> Self {
        self.repair_tolerance = columns;
        self
    }

    /// Sets the absolute fragment floor.
    pub fn min_delimiters(mut self, floor: usize) -> Self {
        self.min_delimiters = floor;
        self
    }

    /// Sets the fractional fragment threshold.
    pub fn fragment_fraction(mut self, fraction: f64) -> Self {
        self.fragment_fraction = fraction;
        self
    }

    /// Sets the accumulator byte ceiling.
    pub fn max_record_bytes(mut self, bytes: usize) -> Self {
        self.max_record_bytes = bytes;
        self
    }

    /// Sets the delimiter-count-multiplier ceiling.
    pub fn width_multiplier(mut self, multiplier: usize) -> Self {
        self.width_multiplier = multiplier;
        self
    }

    /// The delimiter as a single byte.
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    /// Checks the whole configuration for internal consistency, including
    /// that the anchor pattern compiles.
    ///
    /// # Errors
    ///
    /// Returns `StitchError::InvalidConfig` or `StitchError::InvalidPattern`
    /// describing the first problem found.
    pub fn validate(&self) -> Result<(), StitchError> {
        if !self.delimiter.is_ascii() {
            return Err(StitchError::InvalidConfig(format!(
                "delimiter {:?} is not an ASCII character",
                self.delimiter
            )));
        }
        if self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(StitchError::InvalidConfig(
                "delimiter must not be a line terminator".to_string(),
            ));
        }
        if self.placeholder.contains(self.delimiter) {
            return Err(StitchError::InvalidConfig(
                "placeholder must not contain the delimiter".to_string(),
            ));
        }
        if self.placeholder.contains('\n') || self.placeholder.contains('\r') {
            return Err(StitchError::InvalidConfig(
                "placeholder must not contain line terminators".to_string(),
            ));
        }
        if self.width == Some(0) {
            return Err(StitchError::InvalidConfig(
                "width override must be at least 1".to_string(),
            ));
        }
        if !(self.fragment_fraction > 0.0 && self.fragment_fraction <= 1.0) {
            return Err(StitchError::InvalidConfig(format!(
                "fragment_fraction must be in (0, 1], got {}",
                self.fragment_fraction
            )));
        }
        if self.width_multiplier < 2 {
            return Err(StitchError::InvalidConfig(
                "width_multiplier must be at least 2".to_string(),
            ));
        }
        if self.max_record_bytes == 0 {
            return Err(StitchError::InvalidConfig(
                "max_record_bytes must be at least 1".to_string(),
            ));
        }
        self.anchor.compile()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = StitchConfig::default();
        config.validate().expect("default config should validate");
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.placeholder, "\\n");
        assert_eq!(config.repair_tolerance, DEFAULT_REPAIR_TOLERANCE);
        assert_eq!(config.width, None);
    }

    #[test]
    fn default_anchor_matches_the_field_triple() {
        let regex = AnchorSpec::default().compile().expect("default pattern compiles");

        assert!(regex.is_match(b"1700000000\t1234567890123\t9876543210987"));
        assert!(regex.is_match(b"alpha\tbeta\t1700000000\t1234567890123\t9876543210987\tgamma"));
        // 9-digit leading field is not an anchor
        assert!(!regex.is_match(b"170000000\t1234567890123\t9876543210987"));
        // digits embedded in a wider run are not a field
        assert!(!regex.is_match(b"x1700000000\t1234567890123\t9876543210987"));
    }

    #[test]
    fn builder_setters_chain() {
        let config = StitchConfig::default()
            .width(18)
            .placeholder("<NL>")
            .repair_tolerance(2)
            .max_record_bytes(1024)
            .width_multiplier(3);

        assert_eq!(config.width, Some(18));
        assert_eq!(config.placeholder, "<NL>");
        assert_eq!(config.repair_tolerance, 2);
        assert_eq!(config.max_record_bytes, 1024);
        assert_eq!(config.width_multiplier, 3);
    }

    #[test]
    fn validate_rejects_placeholder_with_delimiter() {
        let config = StitchConfig::default().placeholder("a\tb");
        let err = config.validate().expect_err("tab in placeholder");
        assert!(matches!(err, StitchError::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_placeholder_with_newline() {
        let config = StitchConfig::default().placeholder("a\nb");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_ascii_delimiter() {
        let config = StitchConfig::default().delimiter('§');
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_width_override() {
        let mut config = StitchConfig::default();
        config.width = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fraction() {
        assert!(StitchConfig::default().fragment_fraction(0.0).validate().is_err());
        assert!(StitchConfig::default().fragment_fraction(1.5).validate().is_err());
        assert!(StitchConfig::default().fragment_fraction(1.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_small_multiplier() {
        let config = StitchConfig::default().width_multiplier(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_broken_pattern() {
        let config = StitchConfig::default().anchor_pattern("(unclosed");
        let err = config.validate().expect_err("unclosed group");
        assert!(matches!(err, StitchError::InvalidPattern(_)));
    }

    #[test]
    fn toml_loads_partial_file_over_defaults() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("stitch.toml");
        fs::write(
            &path,
            "placeholder = \"<BR>\"\nrepair_tolerance = 2\n\n[anchor]\noffset = 3\n",
        )
        .expect("Failed to write config");

        let config = StitchConfig::from_toml_path(&path).expect("load failed");
        assert_eq!(config.placeholder, "<BR>");
        assert_eq!(config.repair_tolerance, 2);
        assert_eq!(config.anchor.offset, 3);
        // untouched keys keep defaults
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.anchor.pattern, DEFAULT_ANCHOR_PATTERN);
    }

    #[test]
    fn toml_rejects_garbage() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("stitch.toml");
        fs::write(&path, "width = \"not a number\"").expect("Failed to write config");

        let err = StitchConfig::from_toml_path(&path).expect_err("bad value");
        assert!(matches!(err, StitchError::InvalidConfig(_)));
    }

    #[test]
    fn toml_missing_file_is_io_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let err = StitchConfig::from_toml_path(&dir.path().join("absent.toml"))
            .expect_err("missing file");
        assert!(matches!(err, StitchError::Io { .. }));
    }
}
