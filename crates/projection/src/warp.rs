//! Warp a geographic grid into Web Mercator by inverse projection.
//!
//! The destination raster keeps the source pixel counts; each destination
//! pixel center is inverse-projected to lon/lat and sampled bilinearly from
//! the source grid. Nodata never bleeds: NaN corners are dropped from the
//! bilinear stencil and the remaining weights renormalized.

use crate::web_mercator;
use crate::ProjectionError;
use raster_common::{CrsCode, RegularGrid, ReprojectedRaster};
use rayon::prelude::*;
use tracing::debug;

/// Reproject a uniform lon/lat grid to EPSG:3857.
pub fn warp_to_web_mercator(grid: &RegularGrid) -> Result<ReprojectedRaster, ProjectionError> {
    if grid.width == 0 || grid.height == 0 {
        return Err(ProjectionError::EmptyGrid);
    }

    let (min_x, min_y) = web_mercator::forward(grid.lon_min, grid.lat_min);
    let (max_x, max_y) = web_mercator::forward(grid.lon_max, grid.lat_max);

    let width = grid.width;
    let height = grid.height;
    let pixel_size_x = (max_x - min_x) / width as f64;
    let pixel_size_y = -(max_y - min_y) / height as f64;

    let mut raster = ReprojectedRaster {
        crs: CrsCode::Epsg3857,
        origin_x: min_x,
        origin_y: max_y,
        pixel_size_x,
        pixel_size_y,
        width,
        height,
        values: vec![f32::NAN; width * height],
    };

    raster
        .values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            let y = max_y + (row as f64 + 0.5) * pixel_size_y;
            for (col, out) in out_row.iter_mut().enumerate() {
                let x = min_x + (col as f64 + 0.5) * pixel_size_x;
                let (lon, lat) = web_mercator::inverse(x, y);
                *out = sample_bilinear(grid, lon, lat);
            }
        });

    debug!(width, height, "warp to web mercator complete");
    Ok(raster)
}

/// Bilinear sample of the grid at a geographic point, NaN-aware.
///
/// Corners holding nodata are excluded and the surviving weights are
/// renormalized; the result is NaN only when all four corners are nodata
/// or the point falls outside the grid.
pub fn sample_bilinear(grid: &RegularGrid, lon: f64, lat: f64) -> f32 {
    let fx = (lon - grid.lon_min) / grid.resolution_deg;
    let fy = (grid.lat_max - lat) / grid.resolution_deg;

    if fx < 0.0 || fy < 0.0 {
        return f32::NAN;
    }

    let col0 = fx.floor() as usize;
    let row0 = fy.floor() as usize;
    if col0 >= grid.width || row0 >= grid.height {
        return f32::NAN;
    }
    let col1 = (col0 + 1).min(grid.width - 1);
    let row1 = (row0 + 1).min(grid.height - 1);

    let tx = fx - col0 as f64;
    let ty = fy - row0 as f64;

    let corners = [
        (grid.values[row0 * grid.width + col0], (1.0 - tx) * (1.0 - ty)),
        (grid.values[row0 * grid.width + col1], tx * (1.0 - ty)),
        (grid.values[row1 * grid.width + col0], (1.0 - tx) * ty),
        (grid.values[row1 * grid.width + col1], tx * ty),
    ];

    let mut acc = 0.0f64;
    let mut weight = 0.0f64;
    for (v, w) in corners {
        if !v.is_nan() && w > 0.0 {
            acc += v as f64 * w;
            weight += w;
        }
    }

    if weight > 0.0 {
        (acc / weight) as f32
    } else {
        // Degenerate stencil: fall back to the nearest corner if it holds data.
        let near = grid.values[fy.round().min((grid.height - 1) as f64) as usize * grid.width
            + fx.round().min((grid.width - 1) as f64) as usize];
        if near.is_nan() {
            f32::NAN
        } else {
            near
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_grid(value: f32) -> RegularGrid {
        let mut grid = RegularGrid::filled_nodata(-100.0, -99.0, 30.0, 31.0, 0.1);
        grid.values.fill(value);
        grid
    }

    #[test]
    fn test_constant_grid_warps_constant() {
        let raster = warp_to_web_mercator(&constant_grid(7.5)).unwrap();
        assert_eq!(raster.crs, CrsCode::Epsg3857);
        assert_eq!(raster.width, 10);
        assert_eq!(raster.height, 10);
        assert!(raster.values.iter().all(|v| (*v - 7.5).abs() < 1e-5));
    }

    #[test]
    fn test_extent_matches_projected_footprint() {
        let raster = warp_to_web_mercator(&constant_grid(1.0)).unwrap();
        let (min_x, min_y) = web_mercator::forward(-100.0, 30.0);
        let (max_x, max_y) = web_mercator::forward(-99.0, 31.0);
        let bbox = raster.bbox();
        assert!((bbox.min_x - min_x).abs() < 1e-6);
        assert!((bbox.max_x - max_x).abs() < 1e-6);
        assert!((bbox.min_y - min_y).abs() < 1e-6);
        assert!((bbox.max_y - max_y).abs() < 1e-6);
        assert!(raster.pixel_size_y < 0.0);
    }

    #[test]
    fn test_nodata_does_not_bleed() {
        // A single nodata cell surrounded by a constant field: every output
        // pixel near it must still read the constant, never a diluted value.
        let mut grid = constant_grid(10.0);
        grid.set(5, 5, f32::NAN);

        let raster = warp_to_web_mercator(&grid).unwrap();
        for v in &raster.values {
            assert!(v.is_nan() || (*v - 10.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_all_nodata_grid_stays_nodata() {
        let grid = RegularGrid::filled_nodata(-100.0, -99.0, 30.0, 31.0, 0.1);
        let raster = warp_to_web_mercator(&grid).unwrap();
        assert!(raster.values.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut grid = RegularGrid::filled_nodata(0.0, 1.0, 0.0, 1.0, 0.5);
        grid.set(0, 0, 0.0); // (lon 0.0, lat 1.0)
        grid.set(1, 0, 2.0);
        grid.set(0, 1, 4.0);
        grid.set(1, 1, 6.0);
        let v = sample_bilinear(&grid, 0.25, 0.75);
        assert!((v - 3.0).abs() < 1e-5);
    }
}
