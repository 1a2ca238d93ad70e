//! GFS forecast map viewer.
//!
//! Picks the most recent GFS cycle, downloads each forecast hour, renders a
//! map frame per hour and writes an HTML slider page over the frames.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use gfs_common::ModelRun;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gfs_viewer::{Config, SequenceDriver, ViewerPage};

#[derive(Parser, Debug)]
#[command(name = "gfs-viewer")]
#[command(about = "Render a GFS forecast sequence and a slider page to browse it")]
struct Args {
    /// YAML configuration file (built-in Japan defaults when omitted)
    #[arg(long, env = "GFS_VIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Model run as YYYYMMDDHH (default: the cycle containing the current UTC hour)
    #[arg(long, env = "GFS_VIEWER_RUN")]
    run: Option<String>,

    /// Overrides output.dir from the configuration
    #[arg(long, env = "GFS_VIEWER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download and render every forecast hour, then write the viewer page
    Run,
    /// Render a single forecast hour to images/gfs_latest.png
    Latest {
        #[arg(long, default_value = "24")]
        hour: u32,
    },
    /// Only regenerate the viewer page
    Viewer,
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output.dir = dir;
    }
    config.validate()?;

    let run = match &args.run {
        Some(s) => ModelRun::parse(s).with_context(|| format!("Invalid --run value '{}'", s))?,
        None => ModelRun::latest(Utc::now()),
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!(run = %run, region = %config.region.name, "Starting GFS viewer");

            let hours = config.schedule.forecast_hours;
            let driver = SequenceDriver::from_config(config.clone(), run)?;
            let frames = driver.run(&hours).await?;

            ViewerPage::from_config(&config).write(&config.output.html_path())?;
            info!(
                frames = frames.len(),
                page = %config.output.html_path().display(),
                "Done"
            );
        }
        Command::Latest { hour } => {
            info!(run = %run, forecast_hour = hour, "Rendering single forecast hour");

            let out = config.output.latest_path();
            let driver = SequenceDriver::from_config(config, run)?;
            let frame = driver.process(hour, out).await?;
            info!(path = %frame.image.display(), "Done");
        }
        Command::Viewer => {
            ViewerPage::from_config(&config).write(&config.output.html_path())?;
        }
    }

    Ok(())
}
