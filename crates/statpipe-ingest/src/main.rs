//! statpipe - run the statistical ETL pipeline

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use statpipe_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use statpipe_common::types::{ReportFormat, SaveFileType};
use statpipe_core::report::{render, write_report};
use statpipe_core::CancellationToken;
use statpipe_ingest::{build_pipeline, IngestConfig, Source};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};

/// Exit code of a run stopped by Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(name = "statpipe")]
#[command(author, version, about = "Extract, transform and load statistical datasets")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by every subcommand that builds a pipeline
#[derive(Args, Debug, Clone)]
struct PipelineArgs {
    /// Source to include, repeatable (default: STATPIPE_SOURCES or all sources)
    #[arg(short, long = "source", value_name = "SOURCE")]
    sources: Vec<Source>,

    /// Output format of every stage: excel or csv
    #[arg(long, value_name = "FORMAT")]
    save_format: Option<SaveFileType>,

    /// Root of the per-source data directories
    #[arg(long, value_name = "DIR")]
    data_root: Option<PathBuf>,

    /// Threads per transformer
    #[arg(short, long)]
    workers: Option<usize>,

    /// Merge every source's loaded table into one
    #[arg(long)]
    merge_sources: bool,
}

impl PipelineArgs {
    fn load_config(&self) -> Result<IngestConfig> {
        let args = self.clone();
        IngestConfig::load_with(move |config| {
            if !args.sources.is_empty() {
                config.sources = args.sources;
            }
            if let Some(save_format) = args.save_format {
                config.save_file_type = save_format;
            }
            if let Some(data_root) = args.data_root {
                config.data_root = data_root;
            }
            if args.workers.is_some() {
                config.transform_workers = args.workers;
            }
            config.merge_sources |= args.merge_sources;
        })
        .context("Invalid configuration")
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every phase and write the reports
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Report format to write, repeatable (default: STATPIPE_REPORT_FORMATS)
        #[arg(long = "report-format", value_name = "FORMAT")]
        report_formats: Vec<ReportFormat>,

        /// Directory for the written reports
        #[arg(long, value_name = "DIR")]
        report_dir: Option<PathBuf>,

        /// Show progress bars
        #[arg(long)]
        progress: bool,
    },

    /// Print the configured pipeline without running it
    Outline {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("statpipe")
        .build();

    // Environment variables take precedence over the flags
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {:#}", e);
            None
        },
    };

    let code = match execute(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            1
        },
    };

    if let Some(guard) = guard {
        guard.shutdown();
    }
    process::exit(code);
}

async fn execute(command: Command) -> Result<i32> {
    match command {
        Command::Outline { pipeline } => {
            let config = pipeline.load_config()?;
            let pipeline = build_pipeline(&config)?;
            print!("{}", pipeline.outline());
            Ok(0)
        },
        Command::Run {
            pipeline,
            report_formats,
            report_dir,
            progress,
        } => {
            let mut config = pipeline.load_config()?;
            if !report_formats.is_empty() {
                config.report_formats = report_formats;
            }
            if let Some(report_dir) = report_dir {
                config.report_dir = report_dir;
            }
            config.show_progress |= progress;
            run(config).await
        },
    }
}

async fn run(config: IngestConfig) -> Result<i32> {
    let pipeline = build_pipeline(&config)?;
    print!("{}", pipeline.outline());

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling pipeline");
                cancel.cancel();
            }
        })
    };

    let report = pipeline.run(&cancel).await;
    interrupt.abort();

    for format in &config.report_formats {
        let path = write_report(&report, *format, &config.report_dir)
            .with_context(|| format!("Failed to write {} report", format))?;
        info!(format = %format, path = %path.display(), "Report written");
    }
    println!();
    print!("{}", render(&report, ReportFormat::Text)?);

    if cancel.is_cancelled() {
        warn!(run_id = %report.run_id, "Run interrupted");
        return Ok(EXIT_INTERRUPTED);
    }

    let failed = report.failed_units();
    for (phase, metric) in &failed {
        error!(phase = %phase, unit = %metric.name, status = %metric.status, "Unit failed");
    }
    Ok(if failed.is_empty() { 0 } else { 1 })
}
