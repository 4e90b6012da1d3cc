//! Tile service binary.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tile_api::state::AppState;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Pollutant map tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Path to the published tiled asset
    #[arg(long, env = "AURA_ASSET_PATH")]
    asset: PathBuf,

    /// Path to the published metadata JSON
    #[arg(long, env = "AURA_META_PATH")]
    metadata: PathBuf,

    /// In-memory tile cache size in megabytes
    #[arg(long, default_value_t = 256)]
    cache_size_mb: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 5)]
    request_timeout_secs: u64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Both inputs must open cleanly before we accept any traffic.
    let state = Arc::new(AppState::load(
        &args.asset,
        &args.metadata,
        args.cache_size_mb,
        Duration::from_secs(args.request_timeout_secs),
    )?);

    let app = tile_api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = args.listen.parse()?;
    info!(address = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
