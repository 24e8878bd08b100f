//! Command line front end for the repair engine.
//!
//! Two subcommands: `repair` runs the full two-phase pipeline over a file
//! set, `probe` runs width discovery alone and prints the delta histogram.
//! Logs go to stderr so stdout stays clean for `--json` output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rowstitch::config::DEFAULT_MAX_CONCURRENT_FILES;
use rowstitch::io::open_input;
use rowstitch::{
    discover_width, repair_files, FileOutcome, RunReport, StitchConfig, StitchError,
};

#[derive(Parser)]
#[command(name = "rowstitch")]
#[command(about = "Streaming repair of delimiter-corrupted TSV extracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Repair extracts into accepted/rejected output pairs
    #[command(after_help = "\
Examples:
  rowstitch repair extract.tsv
  rowstitch repair dump/*.tsv.gz -o repaired/ -j 8
  rowstitch repair extract.tsv --width 12 --placeholder '<NL>'
  rowstitch repair extract.tsv --config repair.toml --json")]
    Repair {
        /// Input files (.tsv, optionally gzip-compressed)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the output pairs (default: next to each input)
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,

        /// TOML configuration file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Canonical width override (skips discovery)
        #[arg(long)]
        width: Option<usize>,

        /// Anchor regular expression
        #[arg(long)]
        anchor: Option<String>,

        /// Placeholder spliced where embedded newlines were destroyed
        #[arg(long)]
        placeholder: Option<String>,

        /// Maximum column drift still repaired by padding or truncation
        #[arg(long)]
        tolerance: Option<usize>,

        /// Maximum number of files repaired concurrently
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// Run width discovery only and print the delta histogram
    #[command(after_help = "\
Examples:
  rowstitch probe extract.tsv
  rowstitch probe extract.tsv.gz --anchor '(?:^|\\t)\\d{8}\\t' --json")]
    Probe {
        /// Input file (.tsv, optionally gzip-compressed)
        input: PathBuf,

        /// TOML configuration file
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Anchor regular expression
        #[arg(long)]
        anchor: Option<String>,

        /// Print the report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Repair {
            inputs,
            out_dir,
            config,
            width,
            anchor,
            placeholder,
            tolerance,
            jobs,
            json,
        } => {
            cmd_repair(
                inputs,
                out_dir,
                config,
                width,
                anchor,
                placeholder,
                tolerance,
                jobs,
                json,
            )
            .await
        }
        Commands::Probe {
            input,
            config,
            anchor,
            json,
        } => cmd_probe(input, config, anchor, json).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[allow(clippy::too_many_arguments)]
async fn cmd_repair(
    inputs: Vec<PathBuf>,
    out_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    width: Option<usize>,
    anchor: Option<String>,
    placeholder: Option<String>,
    tolerance: Option<usize>,
    jobs: Option<usize>,
    json: bool,
) -> Result<ExitCode, StitchError> {
    let config = load_config(config_path.as_deref(), width, anchor, placeholder, tolerance)?;
    let max_concurrent = jobs.unwrap_or(DEFAULT_MAX_CONCURRENT_FILES);

    let report = repair_files(inputs, out_dir.as_deref(), &config, max_concurrent).await?;

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print_summary(&report);
    }

    // A file the engine could not recognize is a partial failure even though
    // the rest of the set was repaired.
    if report.totals.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn cmd_probe(
    input: PathBuf,
    config_path: Option<PathBuf>,
    anchor: Option<String>,
    json: bool,
) -> Result<ExitCode, StitchError> {
    let config = load_config(config_path.as_deref(), None, anchor, None, None)?;
    config.validate()?;

    let probe_input = input.clone();
    let probe_config = config.clone();
    let report = tokio::task::spawn_blocking(move || {
        let reader = open_input(&probe_input)?;
        discover_width(reader, &probe_config)
    })
    .await
    .map_err(|e| StitchError::Internal(format!("Task join error: {}", e)))??;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| StitchError::Internal(format!("Failed to serialize report: {}", e)))?
        );
    } else {
        println!(
            "{}: width {} from {} anchors over {} lines ({:?} line endings)",
            input.display(),
            report.width,
            report.anchors,
            report.lines,
            report.line_endings
        );
        for (delta, count) in &report.histogram {
            println!("  delta {:>4}: {:>8}", delta, count);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Loads the TOML config (or defaults) and layers flag overrides on top.
fn load_config(
    path: Option<&Path>,
    width: Option<usize>,
    anchor: Option<String>,
    placeholder: Option<String>,
    tolerance: Option<usize>,
) -> Result<StitchConfig, StitchError> {
    let mut config = match path {
        Some(path) => StitchConfig::from_toml_path(path)?,
        None => StitchConfig::default(),
    };
    if let Some(width) = width {
        config = config.width(width);
    }
    if let Some(anchor) = anchor {
        config = config.anchor_pattern(anchor);
    }
    if let Some(placeholder) = placeholder {
        config = config.placeholder(placeholder);
    }
    if let Some(tolerance) = tolerance {
        config = config.repair_tolerance(tolerance);
    }
    Ok(config)
}

fn to_json(report: &RunReport) -> Result<String, StitchError> {
    serde_json::to_string_pretty(report)
        .map_err(|e| StitchError::Internal(format!("Failed to serialize report: {}", e)))
}

fn print_summary(report: &RunReport) {
    for outcome in &report.files {
        match outcome {
            FileOutcome::Repaired(file) => {
                println!(
                    "{}: width {}, {} records, {} accepted ({} padded, {} truncated), {} rejected",
                    file.input.display(),
                    file.stats.width,
                    file.stats.records,
                    file.stats.accepted,
                    file.stats.padded,
                    file.stats.truncated,
                    file.stats.rejected
                );
            }
            FileOutcome::Failed { input, error } => {
                println!("{}: FAILED: {}", input.display(), error);
            }
        }
    }

    let totals = &report.totals;
    println!(
        "{} file(s): {} repaired, {} failed; {} records, {} accepted, {} rejected",
        totals.files,
        totals.repaired,
        totals.failed,
        totals.records,
        totals.accepted,
        totals.rejected
    );
}
