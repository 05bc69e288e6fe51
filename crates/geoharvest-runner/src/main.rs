//! geoharvest CLI - satellite imagery acquisition for water detection

use clap::{Parser, Subcommand};
use geoharvest_common::BatchReport;
use geoharvest_runner::{pipeline, HarvestConfig, RunnerError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geoharvest")]
#[command(author, version, about = "Satellite imagery acquisition and water detection", long_about = None)]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the acquisition root
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override the gallery root
    #[arg(long, global = true)]
    gallery_dir: Option<PathBuf>,

    /// Rewrite existing previews and gallery entries
    #[arg(long, global = true)]
    overwrite: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download SRTM tiles, scenes with previews, and mosaic quads
    Acquire {
        /// Planet API key for the NICFI mosaic
        #[arg(long, env = "PL_API_KEY", hide_env_values = true)]
        pl_api_key: Option<String>,
    },
    /// Collect previews into the flat gallery
    Gallery,
    /// Ask the vision model about every gallery image
    Classify {
        /// OpenAI API key
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        openai_api_key: Option<String>,

        /// Skip images already in the results table
        #[arg(long)]
        skip_recorded: bool,
    },
    /// Acquire, then build the gallery
    Run {
        /// Planet API key for the NICFI mosaic
        #[arg(long, env = "PL_API_KEY", hide_env_values = true)]
        pl_api_key: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(cli: &Cli) -> Result<HarvestConfig, RunnerError> {
    let mut config = match &cli.config {
        Some(path) => HarvestConfig::load(path)?,
        None => HarvestConfig::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.gallery_dir {
        config.gallery.dir = dir.clone();
    }
    if cli.overwrite {
        config.preview.overwrite = true;
        config.gallery.overwrite = true;
    }
    if let Commands::Classify { skip_recorded: true, .. } = cli.command {
        config.classify.skip_recorded = true;
    }
    config.validate()?;
    Ok(config)
}

fn execute(cli: &Cli) -> Result<BatchReport, RunnerError> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Acquire { pl_api_key } => pipeline::acquire(&config, pl_api_key.as_deref()),
        Commands::Gallery => pipeline::build_gallery(&config),
        Commands::Classify { openai_api_key, .. } => {
            pipeline::classify(&config, openai_api_key.as_deref())
        }
        Commands::Run { pl_api_key } => pipeline::run(&config, pl_api_key.as_deref()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    geoharvest_metrics::describe_metrics();

    match execute(&cli) {
        Ok(report) => {
            for failure in report.failures() {
                info!(%failure, "item failed");
            }
            println!("{}", report.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "aborted");
            ExitCode::FAILURE
        }
    }
}
