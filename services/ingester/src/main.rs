//! Ingestion pipeline binary.

use anyhow::Result;
use clap::Parser;
use ingester::{run_pipeline, PipelineOptions};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Swath product ingestion pipeline")]
struct Args {
    /// Input swath product file
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the published asset and metadata
    #[arg(short, long, env = "AURA_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Variable to interpolate (auto-detected when omitted)
    #[arg(long)]
    variable: Option<String>,

    /// Downsampling stride over the swath
    #[arg(long, default_value_t = 1)]
    stride: usize,

    /// Output grid resolution in degrees
    #[arg(long, default_value_t = 0.01)]
    resolution: f64,

    /// Fill grid vertices outside the sample hull from the nearest sample
    #[arg(long)]
    extrapolate: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    std::fs::create_dir_all(&args.output_dir)?;

    let opts = PipelineOptions {
        variable: args.variable,
        stride: args.stride,
        resolution_deg: args.resolution,
        extrapolate: args.extrapolate,
    };
    let summary = run_pipeline(&args.input, &args.output_dir, &opts)?;

    info!(
        variable = %summary.variable,
        samples = summary.samples,
        grid = format!("{}x{}", summary.grid_width, summary.grid_height),
        version = summary.asset_version,
        asset = %summary.asset_path.display(),
        "published"
    );
    Ok(())
}
