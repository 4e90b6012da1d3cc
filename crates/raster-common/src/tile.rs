//! Slippy-map (z/x/y) tile addressing over the Web Mercator quadtree.
//!
//! Zoom level `z` divides the square Mercator world into `2^z x 2^z` tiles of
//! 256x256 pixels; `y` grows downward from the northern edge.

use crate::BoundingBox;
use serde::{Deserialize, Serialize};

/// Tile edge length in pixels.
pub const TILE_SIZE: usize = 256;

/// Half the extent of the square Web Mercator world, in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.342789244;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a tile coordinate, rejecting x/y outside the `2^z` matrix.
    pub fn new(z: u32, x: u32, y: u32) -> Result<Self, InvalidTile> {
        if z > 30 {
            return Err(InvalidTile::ZoomTooDeep(z));
        }
        let n = 1u32 << z;
        if x >= n || y >= n {
            return Err(InvalidTile::OutOfRange { z, x, y });
        }
        Ok(Self { z, x, y })
    }

    /// Bounds of this tile in Web Mercator meters.
    pub fn mercator_bounds(&self) -> BoundingBox {
        let n = (1u64 << self.z) as f64;
        let span = 2.0 * WEB_MERCATOR_EXTENT / n;

        let min_x = -WEB_MERCATOR_EXTENT + self.x as f64 * span;
        let max_y = WEB_MERCATOR_EXTENT - self.y as f64 * span;
        BoundingBox::new(min_x, max_y - span, min_x + span, max_y)
    }

    /// Ground resolution of this tile in meters per pixel.
    pub fn resolution(&self) -> f64 {
        let n = (1u64 << self.z) as f64;
        2.0 * WEB_MERCATOR_EXTENT / n / TILE_SIZE as f64
    }

    /// Get the parent tile (zoom - 1).
    pub fn parent(&self) -> Option<TileCoord> {
        if self.z == 0 {
            return None;
        }
        Some(TileCoord {
            z: self.z - 1,
            x: self.x / 2,
            y: self.y / 2,
        })
    }
}

/// Cache identity of a renderable tile: asset version plus tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub asset_version: u64,
    pub coord: TileCoord,
}

impl TileKey {
    pub fn new(asset_version: u64, coord: TileCoord) -> Self {
        Self {
            asset_version,
            coord,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidTile {
    #[error("tile index out of range for zoom {z}: x={x}, y={y}")]
    OutOfRange { z: u32, x: u32, y: u32 },

    #[error("zoom level {0} too deep")]
    ZoomTooDeep(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_zero_covers_world() {
        let tile = TileCoord::new(0, 0, 0).unwrap();
        let bbox = tile.mercator_bounds();
        assert!((bbox.min_x + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((bbox.max_x - WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((bbox.min_y + WEB_MERCATOR_EXTENT).abs() < 1e-6);
        assert!((bbox.max_y - WEB_MERCATOR_EXTENT).abs() < 1e-6);
    }

    #[test]
    fn test_y_grows_downward() {
        let top = TileCoord::new(1, 0, 0).unwrap().mercator_bounds();
        let bottom = TileCoord::new(1, 0, 1).unwrap().mercator_bounds();
        assert!(top.min_y > bottom.min_y);
        assert!((top.min_y - bottom.max_y).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(TileCoord::new(2, 4, 0).is_err());
        assert!(TileCoord::new(2, 0, 4).is_err());
        assert!(TileCoord::new(2, 3, 3).is_ok());
    }

    #[test]
    fn test_resolution_halves_per_zoom() {
        let r0 = TileCoord::new(0, 0, 0).unwrap().resolution();
        let r1 = TileCoord::new(1, 0, 0).unwrap().resolution();
        assert!((r0 / r1 - 2.0).abs() < 1e-12);
    }
}
