//! Tiled raster asset: overview pyramid construction, the on-disk container
//! and the windowed reader used by the tile server.
//!
//! An asset holds one reprojected raster plus a chain of 2x mean-downsampled
//! overviews, stored as independently compressed fixed-size blocks so a tile
//! request touches only the bytes it needs.

pub mod builder;
pub mod container;
pub mod reader;
pub mod stats;

pub use builder::{build_levels, publish_asset, PyramidLevel};
pub use container::{AssetHeader, LevelInfo, BLOCK_SIZE};
pub use reader::AssetReader;
pub use stats::{compute_color_stats, ColorStats};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PyramidError {
    #[error("failed to write asset {0}: {1}")]
    Write(String, #[source] std::io::Error),

    #[error("failed to publish asset {0}: {1}")]
    Publish(String, #[source] std::io::Error),

    #[error("failed to read asset {0}: {1}")]
    Read(String, #[source] std::io::Error),

    #[error("invalid asset: {0}")]
    Format(String),

    #[error("block checksum mismatch at level {level}, block ({bx}, {by})")]
    Corrupt { level: usize, bx: usize, by: usize },

    #[error("cannot build a pyramid from an empty raster")]
    EmptyRaster,
}

pub type Result<T> = std::result::Result<T, PyramidError>;
