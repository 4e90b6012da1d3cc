//! Common types shared across the aura-tiles pipeline and serving crates.

pub mod bbox;
pub mod crs;
pub mod grid;
pub mod metadata;
pub mod tile;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use grid::{RegularGrid, ReprojectedRaster};
pub use metadata::AssetMetadata;
pub use tile::{InvalidTile, TileCoord, TileKey, TILE_SIZE, WEB_MERCATOR_EXTENT};
