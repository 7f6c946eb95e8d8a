use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use order_sheet_merge::{MergeOptions, MergeReport, merge_directory};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(
    name = "merge-sheets",
    version,
    about = "Merge group-buy order spreadsheets into one workbook"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Merge every spreadsheet in a directory and normalize addresses.
    Merge(MergeArgs),
    /// Print the effective options as JSON.
    Rules(RulesArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Directory holding the .xlsx/.xls/.xlsm inputs.
    #[arg(short, long, default_value = ".")]
    input_dir: PathBuf,

    /// Output workbook name, relative to the input directory.
    #[arg(short, long)]
    output: Option<String>,

    /// Password tried on protected workbooks.
    #[arg(short, long)]
    password: Option<String>,

    /// JSON file overriding the default options and address rules.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run summary as JSON to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Also write logs to a timestamped file in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log every address decision.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Args)]
struct RulesArgs {
    /// JSON file overriding the default options and address rules.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<()> {
    let default_filter = if verbose {
        "order_sheet_merge=debug"
    } else {
        "order_sheet_merge=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = log_dir
        .map(|dir| -> Result<_> {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory '{}'", dir.display()))?;
            let path = dir.join(Local::now().format("merge_%Y%m%d_%H%M%S.log").to_string());
            let file = File::create(&path)
                .with_context(|| format!("failed to create log file '{}'", path.display()))?;
            Ok(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr).without_time())
        .with(file_layer)
        .init();
    Ok(())
}

fn load_options(config: Option<&Path>) -> Result<MergeOptions> {
    match config {
        Some(path) => MergeOptions::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => Ok(MergeOptions::default()),
    }
}

fn run_merge(args: &MergeArgs) -> Result<MergeReport> {
    let mut options = load_options(args.config.as_deref())?;
    if let Some(output) = &args.output {
        if output.trim().is_empty() {
            bail!("--output cannot be empty");
        }
        options.output_file.clone_from(output);
    }
    if let Some(password) = &args.password {
        options.password.clone_from(password);
    }

    let report = merge_directory(&args.input_dir, &options).with_context(|| {
        format!(
            "failed to merge spreadsheets in '{}'",
            args.input_dir.display()
        )
    })?;

    if let Some(path) = &args.report {
        report
            .summary(&options.rules)
            .write_json(path)
            .with_context(|| format!("failed to write report '{}'", path.display()))?;
    }

    Ok(report)
}

fn run_rules(args: &RulesArgs) -> Result<()> {
    let options = load_options(args.config.as_deref())?;
    let json = serde_json::to_string_pretty(&options).context("failed to render options")?;
    println!("{json}");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Merge(args) => {
            if let Err(error) = init_logging(args.verbose, args.log_dir.as_deref()) {
                eprintln!("error: {error:#}");
                return ExitCode::from(1);
            }
            match run_merge(&args) {
                Ok(report) => {
                    if report.input_files.is_empty() || report.output.is_some() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(error) => {
                    eprintln!("error: {error:#}");
                    ExitCode::from(1)
                }
            }
        }
        Commands::Rules(args) => match run_rules(&args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("error: {error:#}");
                ExitCode::from(1)
            }
        },
    }
}
