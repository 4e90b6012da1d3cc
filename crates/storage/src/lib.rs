//! Caching for the tile service.

pub mod tile_cache;

pub use tile_cache::{TileCache, TileCacheStats};
