//! Uniform grid and projected raster types produced by the pipeline.
//!
//! Both types use `f32::NAN` as the nodata sentinel: it is excluded from
//! interpolation, statistics and color mapping, and never replaced by zero
//! or any other default.

use crate::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};

/// Number of grid vertices along an axis spanning `span` at step `res`.
///
/// Axes are endpoint-exclusive, `ceil(span / res)`: vertices step from the
/// anchor edge and stop before the far edge. Quotients within float noise
/// of an integer are snapped first, so a 0.05 degree span at 0.01 degrees
/// is 5 vertices, not 6. A degenerate span still gets one vertex.
pub fn axis_len(span: f64, res: f64) -> usize {
    let q = span / res;
    let snapped = if (q - q.round()).abs() < 1e-9 { q.round() } else { q };
    (snapped.ceil() as usize).max(1)
}

/// A uniform geographic (lon/lat) grid, row-major with row 0 at `lat_max`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegularGrid {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub resolution_deg: f64,
    pub width: usize,
    pub height: usize,
    /// Cell values, `height * width`, NaN = nodata.
    pub values: Vec<f32>,
}

impl RegularGrid {
    /// Create an all-nodata grid covering the given bounds.
    pub fn filled_nodata(
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
        resolution_deg: f64,
    ) -> Self {
        let width = axis_len(lon_max - lon_min, resolution_deg);
        let height = axis_len(lat_max - lat_min, resolution_deg);
        Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
            resolution_deg,
            width,
            height,
            values: vec![f32::NAN; width * height],
        }
    }

    /// Longitude of the vertex in column `col`.
    pub fn lon_at(&self, col: usize) -> f64 {
        self.lon_min + col as f64 * self.resolution_deg
    }

    /// Latitude of the vertex in row `row` (row 0 is the northernmost).
    pub fn lat_at(&self, row: usize) -> f64 {
        self.lat_max - row as f64 * self.resolution_deg
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.values[row * self.width + col])
    }

    pub fn set(&mut self, col: usize, row: usize, value: f32) {
        if col < self.width && row < self.height {
            self.values[row * self.width + col] = value;
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.lon_min, self.lat_min, self.lon_max, self.lat_max)
    }

    /// True when every cell is the nodata sentinel.
    pub fn is_all_nodata(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }
}

/// A raster warped into a projected CRS, described by an affine transform.
///
/// The transform maps pixel `(col, row)` to the coordinate of that pixel's
/// top-left corner: `(origin_x + col * pixel_size_x, origin_y + row *
/// pixel_size_y)`. `pixel_size_y` is negative: row 0 is the northern edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprojectedRaster {
    pub crs: CrsCode,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub width: usize,
    pub height: usize,
    /// Pixel values, `height * width`, NaN = nodata.
    pub values: Vec<f32>,
}

impl ReprojectedRaster {
    /// Coordinate of the top-left corner of pixel `(col, row)`.
    pub fn pixel_corner(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + col as f64 * self.pixel_size_x,
            self.origin_y + row as f64 * self.pixel_size_y,
        )
    }

    /// Coordinate of the center of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_size_x,
            self.origin_y + (row as f64 + 0.5) * self.pixel_size_y,
        )
    }

    /// Full extent of the raster in projected coordinates.
    pub fn bbox(&self) -> BoundingBox {
        let max_x = self.origin_x + self.width as f64 * self.pixel_size_x;
        let min_y = self.origin_y + self.height as f64 * self.pixel_size_y;
        BoundingBox::new(self.origin_x, min_y, max_x, self.origin_y)
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        Some(self.values[row * self.width + col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_len_snaps_float_noise() {
        // 10.05 - 10.0 is 0.05000000000000071 in f64; the quotient snaps to
        // 5 before the ceiling.
        assert_eq!(axis_len(10.05 - 10.0, 0.01), 5);
        // 1.0 / 0.05 is 19.999999999999996; snapped to 20.
        assert_eq!(axis_len(1.0, 0.05), 20);
    }

    #[test]
    fn test_axis_len_exact_span() {
        // Endpoint-exclusive: the far edge is not a vertex.
        assert_eq!(axis_len(1.0, 1.0), 1);
        assert_eq!(axis_len(2.0, 0.5), 4);
    }

    #[test]
    fn test_axis_len_fractional_span() {
        // Non-multiple spans round up so the whole span is covered.
        assert_eq!(axis_len(1.3, 0.5), 3);
        // A single point still gets one vertex.
        assert_eq!(axis_len(0.0, 0.01), 1);
    }

    #[test]
    fn test_grid_axes_north_up() {
        let grid = RegularGrid::filled_nodata(-100.0, -99.0, 30.0, 31.0, 0.5);
        assert_eq!(grid.width, 2);
        assert_eq!(grid.height, 2);
        assert_eq!(grid.lat_at(0), 31.0);
        assert_eq!(grid.lat_at(1), 30.5);
        assert_eq!(grid.lon_at(0), -100.0);
        assert_eq!(grid.lon_at(1), -99.5);
        assert!(grid.is_all_nodata());
    }

    #[test]
    fn test_raster_affine() {
        let raster = ReprojectedRaster {
            crs: CrsCode::Epsg3857,
            origin_x: 1000.0,
            origin_y: 2000.0,
            pixel_size_x: 10.0,
            pixel_size_y: -10.0,
            width: 4,
            height: 2,
            values: vec![0.0; 8],
        };

        assert_eq!(raster.pixel_corner(0, 0), (1000.0, 2000.0));
        assert_eq!(raster.pixel_corner(3, 1), (1030.0, 1990.0));
        assert_eq!(raster.pixel_center(0, 0), (1005.0, 1995.0));

        let bbox = raster.bbox();
        assert_eq!(bbox.min_x, 1000.0);
        assert_eq!(bbox.max_x, 1040.0);
        assert_eq!(bbox.min_y, 1980.0);
        assert_eq!(bbox.max_y, 2000.0);
    }
}
