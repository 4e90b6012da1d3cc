//! Coordinate transforms and raster warping.
//!
//! Implements spherical Web Mercator from scratch and warps uniform
//! geographic grids into EPSG:3857 rasters by inverse projection.

pub mod warp;
pub mod web_mercator;

pub use warp::{sample_bilinear, warp_to_web_mercator};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("cannot warp an empty grid")]
    EmptyGrid,
}
