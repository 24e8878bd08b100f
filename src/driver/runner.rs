//! Fan-out of the two-phase repair across a set of input files.
//!
//! Each file runs the full pipeline on a blocking worker: width discovery
//! (unless overridden), then streaming reconstruction into a pair of atomic
//! sinks next to the input or under a chosen output directory. Files never
//! share state; the only cross-file coupling is the slot count enforced by
//! [`FileScheduler`]. Results come back in input order regardless of
//! completion order.
//!
//! A file whose format cannot be recognized is reported as failed and the
//! rest of the set continues. An I/O failure is different: the run drains
//! in-flight work and returns the first such error in input order.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::StitchConfig;
use crate::driver::scheduler::FileScheduler;
use crate::engine::{discover_width, reconstruct_records, RepairStats, WidthReport};
use crate::error::StitchError;
use crate::io::{has_gzip_extension, open_input, AtomicLineWriter};

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

/// Result of repairing one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// The input that was repaired.
    pub input: PathBuf,
    /// Where the regularized records were written.
    pub accepted_path: PathBuf,
    /// Where the rejected records were written.
    pub rejected_path: PathBuf,
    /// Discovery diagnostics; absent when a width override skipped the pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<WidthReport>,
    /// Reconstruction counters.
    pub stats: RepairStats,
    /// Wall time spent on this file.
    pub elapsed_ms: u64,
}

/// Per-file outcome within a run: repaired, or failed without aborting the
/// rest of the set.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Repaired(FileReport),
    Failed { input: PathBuf, error: String },
}

/// Aggregate result of a whole run, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub files: Vec<FileOutcome>,
    pub totals: RunTotals,
}

/// Counters summed across every repaired file in a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunTotals {
    pub files: usize,
    pub repaired: usize,
    pub failed: usize,
    pub records: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub splices: u64,
}

impl RunTotals {
    fn tally(outcomes: &[FileOutcome]) -> Self {
        let mut totals = RunTotals {
            files: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                FileOutcome::Repaired(report) => {
                    totals.repaired += 1;
                    totals.records += report.stats.records;
                    totals.accepted += report.stats.accepted;
                    totals.rejected += report.stats.rejected;
                    totals.splices += report.stats.splices;
                }
                FileOutcome::Failed { .. } => totals.failed += 1,
            }
        }
        totals
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Repairs a set of files with at most `max_concurrent` in flight.
///
/// Outcomes land in input order. Format-unrecognized inputs become
/// [`FileOutcome::Failed`] entries; any other per-file error aborts the run
/// once in-flight files have drained, and the first such error in input
/// order is returned.
///
/// # Errors
///
/// Returns `StitchError::InvalidConfig` for a bad configuration or
/// concurrency limit, or the first unrecoverable per-file error.
pub async fn repair_files(
    inputs: Vec<PathBuf>,
    out_dir: Option<&Path>,
    config: &StitchConfig,
    max_concurrent: usize,
) -> Result<RunReport, StitchError> {
    config.validate()?;
    if max_concurrent == 0 {
        return Err(StitchError::InvalidConfig(
            "concurrency limit must be at least 1".to_string(),
        ));
    }

    let paths = inputs.clone();
    let total = inputs.len();
    let scheduler = FileScheduler::new(max_concurrent);
    let config = Arc::new(config.clone());
    let out_dir = out_dir.map(Path::to_path_buf);

    let mut results: Vec<Option<Result<FileReport, StitchError>>> = Vec::with_capacity(total);
    results.resize_with(total, || None);

    let mut join_set: JoinSet<(usize, Result<FileReport, StitchError>)> = JoinSet::new();
    let mut pending = inputs.into_iter().enumerate().peekable();

    loop {
        // Keep the set topped up to the concurrency cap.
        while join_set.len() < scheduler.max_files() && pending.peek().is_some() {
            if let Some((index, input)) = pending.next() {
                let scheduler = scheduler.clone();
                let config = config.clone();
                let out_dir = out_dir.clone();

                join_set.spawn(async move {
                    let permit = scheduler.acquire().await;
                    debug!(
                        input = %input.display(),
                        active = permit.active_files(),
                        available = permit.available_slots(),
                        "[DRIVER] repair slot acquired"
                    );
                    let result = repair_file(&input, out_dir.as_deref(), &config).await;
                    (index, result)
                });
            }
        }

        if join_set.is_empty() && pending.peek().is_none() {
            break;
        }

        if let Some(joined) = join_set.join_next().await {
            let (index, result) = joined
                .map_err(|e| StitchError::Internal(format!("Task join error: {}", e)))?;
            results[index] = Some(result);
        }
    }

    let mut outcomes = Vec::with_capacity(total);
    for (index, slot) in results.into_iter().enumerate() {
        let result = slot.ok_or_else(|| {
            StitchError::Internal(format!("No result recorded for input {}", index))
        })?;
        match result {
            Ok(report) => outcomes.push(FileOutcome::Repaired(report)),
            Err(e) if e.aborts_run() => return Err(e),
            Err(e) => {
                warn!(
                    input = %paths[index].display(),
                    error = %e,
                    "[DRIVER] file failed, continuing with the rest of the set"
                );
                outcomes.push(FileOutcome::Failed {
                    input: paths[index].clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let totals = RunTotals::tally(&outcomes);
    info!(
        files = totals.files,
        repaired = totals.repaired,
        failed = totals.failed,
        records = totals.records,
        accepted = totals.accepted,
        rejected = totals.rejected,
        "[DRIVER] file set complete"
    );
    Ok(RunReport {
        files: outcomes,
        totals,
    })
}

/// Repairs one file: discovery (unless overridden), then reconstruction into
/// atomic accepted/rejected sinks.
///
/// # Errors
///
/// Returns `StitchError::FormatUnrecognized` when discovery cannot infer a
/// width, or an I/O error from reading the input or persisting the outputs.
/// On any error no output file is left behind.
pub async fn repair_file(
    input: &Path,
    out_dir: Option<&Path>,
    config: &StitchConfig,
) -> Result<FileReport, StitchError> {
    let input = input.to_owned();
    let out_dir = out_dir.map(Path::to_path_buf);
    let config = config.clone();

    // The whole per-file pipeline is synchronous stream work.
    tokio::task::spawn_blocking(move || repair_file_blocking(&input, out_dir.as_deref(), &config))
        .await
        .map_err(|e| StitchError::Internal(format!("Task join error: {}", e)))?
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn repair_file_blocking(
    input: &Path,
    out_dir: Option<&Path>,
    config: &StitchConfig,
) -> Result<FileReport, StitchError> {
    let started = Instant::now();

    // Discovery must see the whole file before reconstruction starts, and
    // gzip streams cannot rewind, so each pass opens the input fresh.
    let (width, discovery) = match config.width {
        Some(width) => (width, None),
        None => {
            let reader = open_input(input)?;
            let report = discover_width(reader, config)
                .map_err(|e| contextualize(e, input))?;
            (report.width, Some(report))
        }
    };

    if let Some(dir) = out_dir {
        std::fs::create_dir_all(dir).map_err(|e| StitchError::io(dir, e))?;
    }
    let (accepted_path, rejected_path) = output_paths(input, out_dir);

    let reader = open_input(input)?;
    let mut accepted = AtomicLineWriter::new(&accepted_path)?;
    let mut rejected = AtomicLineWriter::new(&rejected_path)?;

    let stats = reconstruct_records(reader, width, config, &mut accepted, &mut rejected)
        .map_err(|e| contextualize(e, input))?;

    let accepted_path = accepted.finish()?;
    let rejected_path = rejected.finish()?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        input = %input.display(),
        width,
        records = stats.records,
        accepted = stats.accepted,
        rejected = stats.rejected,
        elapsed_ms,
        "[DRIVER] file repaired"
    );

    Ok(FileReport {
        input: input.to_path_buf(),
        accepted_path,
        rejected_path,
        discovery,
        stats,
        elapsed_ms,
    })
}

/// Attaches the input path to bare stream errors surfacing from the engine.
fn contextualize(error: StitchError, input: &Path) -> StitchError {
    match error {
        StitchError::Stream(source) => StitchError::io(input, source),
        other => other,
    }
}

/// Derives the accepted/rejected output paths for one input.
///
/// A `.gz` suffix and the data extension are both stripped:
/// `extract.tsv.gz` becomes `extract.accepted.tsv` and
/// `extract.rejected.tsv`, next to the input unless `out_dir` is given.
fn output_paths(input: &Path, out_dir: Option<&Path>) -> (PathBuf, PathBuf) {
    let mut stripped = input.to_path_buf();
    if has_gzip_extension(&stripped) {
        stripped.set_extension("");
    }
    let stem = stripped
        .file_stem()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));

    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().unwrap_or_else(|| Path::new(".")).to_path_buf(),
    };

    let mut accepted = stem.clone();
    accepted.push(".accepted.tsv");
    let mut rejected = stem;
    rejected.push(".rejected.tsv");

    (dir.join(accepted), dir.join(rejected))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
