//! blobsniff: content classification and markup screening for uploaded files.
//!
//! This is the main entry point for the CLI application.

use blobsniff::core::config::Config;
use blobsniff::core::error::Result;
use blobsniff::core::types::{ClassificationReport, Verdict};
use blobsniff::scanner::Classifier;
use blobsniff::ui::cli::{Cli, Commands, ConfigAction, OutputFormat};
use blobsniff::utils::logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when some input could not be opened.
fn run() -> Result<bool> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config)?;

    log::info!("blobsniff v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(Commands::Check {
            paths,
            no_content,
            files,
        }) => run_check(config, paths, no_content, files, cli.format),
        Some(Commands::Config { action }) => {
            run_config(action, &config, cli.config.as_deref())?;
            Ok(true)
        }
        None => {
            println!("blobsniff - File classification and markup screening");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  blobsniff check upload.gz          Check one file");
            println!("  blobsniff check --no-content *.zip Match formats only");
            println!("  blobsniff --format json check f    Emit a JSON report");
            Ok(true)
        }
    }
}

/// Classify each path and print the verdicts.
fn run_check(
    mut config: Config,
    paths: Vec<PathBuf>,
    no_content: bool,
    files: Option<usize>,
    format: OutputFormat,
) -> Result<bool> {
    if let Some(files) = files {
        config.classifier.zip_scan_files = files;
    }
    let classifier = Classifier::with_config(config.classifier)?;

    let mut all_opened = true;
    let mut reports = Vec::with_capacity(paths.len());

    for path in &paths {
        let report = if no_content {
            classifier.report_formats(path)
        } else {
            classifier.report(path)
        };

        match report {
            Ok(report) => reports.push(report),
            Err(e) => {
                log::error!("[{:?}] {}", e.category(), e);
                eprintln!("{}: {}", path.display(), e);
                all_opened = false;
            }
        }
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        OutputFormat::Text => {
            for report in &reports {
                print_report(report);
            }
        }
    }

    Ok(all_opened)
}

fn print_report(report: &ClassificationReport) {
    let flag = if report.is_flagged() { "FLAGGED" } else { "ok" };
    println!("{}: {} [{}]", report.path.display(), report.kind, flag);
    println!("  gzip:   {}", describe(&report.gzip));
    println!("  bzip2:  {}", describe(&report.bz2));
    println!("  zip:    {}", describe(&report.zip));
    if report.zip.is_format {
        println!("  single-file zip: {}", report.single_file_zip);
    }
    println!("  tar:    {}", report.tar);
    println!("  image:  {}", report.image);
    println!("  binary: {}", report.binary);
    println!("  html:   {}", report.html);
}

fn describe(verdict: &Verdict) -> String {
    let (is_format, is_safe) = verdict.as_pair();
    match verdict.reason {
        Some(reason) => format!("({}, {}) {:?}", is_format, is_safe, reason),
        None => format!("({}, {})", is_format, is_safe),
    }
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, explicit: Option<&Path>) -> Result<()> {
    let config_path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::default_config_path);

    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                println!("This will overwrite {}", config_path.display());
                println!("Re-run with --yes to confirm.");
                return Ok(());
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(&config_path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
