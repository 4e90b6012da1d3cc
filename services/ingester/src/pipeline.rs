//! The ingest-to-publish pipeline.
//!
//! One run takes a swath product through quality filtering, regridding,
//! reprojection and pyramid construction, then publishes the asset and its
//! metadata atomically. A run that produces no valid samples fails without
//! touching the published files.

use anyhow::{Context, Result};
use projection::warp_to_web_mercator;
use pyramid::{compute_color_stats, publish_asset};
use raster_common::AssetMetadata;
use regrid::{regrid, ExtrapolationPolicy, RegridOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;
use swath::{ingest_product, IngestOptions};
use tracing::{info, warn};

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Variable to interpolate; auto-detected from the product when None.
    pub variable: Option<String>,
    /// Swath downsampling stride.
    pub stride: usize,
    /// Output grid resolution in degrees.
    pub resolution_deg: f64,
    /// Fill vertices outside the sample hull from the nearest sample.
    pub extrapolate: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            variable: None,
            stride: 1,
            resolution_deg: 0.01,
            extrapolate: false,
        }
    }
}

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PipelineSummary {
    pub variable: String,
    pub samples: usize,
    pub grid_width: usize,
    pub grid_height: usize,
    pub asset_version: u64,
    pub asset_path: PathBuf,
    pub metadata_path: PathBuf,
    pub stats_available: bool,
}

/// Run the full pipeline for one swath product, publishing into
/// `output_dir` as `asset.tra` + `metadata.json`.
pub fn run_pipeline(
    product_path: &Path,
    output_dir: &Path,
    opts: &PipelineOptions,
) -> Result<PipelineSummary> {
    let started = Instant::now();
    let asset_path = output_dir.join("asset.tra");
    let metadata_path = output_dir.join("metadata.json");

    let ingest_opts = IngestOptions {
        stride: opts.stride,
        ..Default::default()
    };
    let (samples, variable, layout) =
        ingest_product(product_path, opts.variable.as_deref(), &ingest_opts)
            .with_context(|| format!("ingesting {}", product_path.display()))?;
    info!(
        samples = samples.len(),
        variable = %variable,
        layout = ?layout,
        "swath ingested"
    );

    let regrid_opts = RegridOptions {
        resolution_deg: opts.resolution_deg,
        extrapolation: if opts.extrapolate {
            ExtrapolationPolicy::NearestNeighbor
        } else {
            ExtrapolationPolicy::None
        },
    };
    let grid = regrid(&samples, &regrid_opts).context("regridding samples")?;
    if grid.is_all_nodata() {
        warn!("regrid produced an all-nodata grid, publishing anyway");
    }

    let raster = warp_to_web_mercator(&grid).context("reprojecting grid")?;

    let stats = compute_color_stats(&raster.values, raster.width, raster.height);

    // Version counts up from whatever is already published.
    let asset_version = match AssetMetadata::load(&metadata_path) {
        Ok(previous) => previous.asset_version + 1,
        Err(_) => 1,
    };

    publish_asset(&raster, &asset_path)
        .with_context(|| format!("publishing asset {}", asset_path.display()))?;

    let metadata = AssetMetadata {
        variable: variable.clone(),
        vmin: stats.vmin as f64,
        vmax: stats.vmax as f64,
        asset_path: asset_path.display().to_string(),
        asset_version,
        stats_available: stats.available,
    };
    metadata
        .store(&metadata_path)
        .with_context(|| format!("publishing metadata {}", metadata_path.display()))?;

    info!(
        variable = %variable,
        version = asset_version,
        vmin = stats.vmin,
        vmax = stats.vmax,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline run complete"
    );

    Ok(PipelineSummary {
        variable,
        samples: samples.len(),
        grid_width: grid.width,
        grid_height: grid.height,
        asset_version,
        asset_path,
        metadata_path,
        stats_available: stats.available,
    })
}
