//! Linear interpolation of irregular swath samples onto a uniform grid.
//!
//! The regridder triangulates the sample cloud, then evaluates each grid
//! vertex by barycentric interpolation inside its containing triangle.
//! Vertices outside the convex hull of the samples stay nodata unless a
//! nearest-neighbor extrapolation policy is selected.

pub mod delaunay;

use delaunay::{barycentric, triangulate, TriangleIndex, Vertex};
use raster_common::RegularGrid;
use rayon::prelude::*;
use swath::SwathSample;
use thiserror::Error;
use tracing::{debug, warn};

/// Tolerance for the inside-triangle test. Slightly negative so vertices
/// exactly on a shared triangle edge are claimed rather than dropped.
const EPS: f64 = -1e-10;

#[derive(Debug, Error)]
pub enum RegridError {
    #[error("no samples to regrid")]
    Empty,

    #[error("invalid grid resolution {0}")]
    InvalidResolution(f64),
}

/// How to fill grid vertices outside the convex hull of the samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtrapolationPolicy {
    /// Leave them nodata.
    #[default]
    None,
    /// Copy the value of the nearest sample.
    NearestNeighbor,
}

/// Options controlling the regrid step.
#[derive(Debug, Clone)]
pub struct RegridOptions {
    /// Grid step in degrees along both axes.
    pub resolution_deg: f64,
    pub extrapolation: ExtrapolationPolicy,
}

impl Default for RegridOptions {
    fn default() -> Self {
        Self {
            resolution_deg: 0.01,
            extrapolation: ExtrapolationPolicy::None,
        }
    }
}

/// Interpolate filtered swath samples onto a uniform lon/lat grid.
///
/// The grid covers the bounding box of the samples. With fewer than three
/// samples, or a fully collinear cloud, no triangulation exists and the
/// grid comes back all nodata.
pub fn regrid(samples: &[SwathSample], opts: &RegridOptions) -> Result<RegularGrid, RegridError> {
    if samples.is_empty() {
        return Err(RegridError::Empty);
    }
    if !opts.resolution_deg.is_finite() || opts.resolution_deg <= 0.0 {
        return Err(RegridError::InvalidResolution(opts.resolution_deg));
    }

    let mut lon_min = f64::MAX;
    let mut lon_max = f64::MIN;
    let mut lat_min = f64::MAX;
    let mut lat_max = f64::MIN;
    for s in samples {
        lon_min = lon_min.min(s.lon);
        lon_max = lon_max.max(s.lon);
        lat_min = lat_min.min(s.lat);
        lat_max = lat_max.max(s.lat);
    }

    let mut grid =
        RegularGrid::filled_nodata(lon_min, lon_max, lat_min, lat_max, opts.resolution_deg);

    let points: Vec<Vertex> = samples.iter().map(|s| Vertex::new(s.lon, s.lat)).collect();
    let triangulation = triangulate(&points);
    if triangulation.triangles.is_empty() {
        warn!(
            samples = samples.len(),
            "sample cloud cannot be triangulated, grid left as nodata"
        );
        return Ok(grid);
    }

    let index = TriangleIndex::build(&points, &triangulation);

    let width = grid.width;
    let lon_min = grid.lon_min;
    let lat_max = grid.lat_max;
    let res = grid.resolution_deg;

    grid.values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            let lat = lat_max - row as f64 * res;
            for (col, out) in out_row.iter_mut().enumerate() {
                let lon = lon_min + col as f64 * res;

                let mut value = f32::NAN;
                for &ti in index.candidates(lon, lat) {
                    let tri = triangulation.triangles[ti];
                    if let Some((u, v, w)) =
                        barycentric(lon, lat, &points[tri.a], &points[tri.b], &points[tri.c])
                    {
                        if u >= EPS && v >= EPS && w >= EPS {
                            value = (u * samples[tri.a].value as f64
                                + v * samples[tri.b].value as f64
                                + w * samples[tri.c].value as f64)
                                as f32;
                            break;
                        }
                    }
                }

                if value.is_nan() && opts.extrapolation == ExtrapolationPolicy::NearestNeighbor {
                    value = nearest_value(samples, lon, lat);
                }
                *out = value;
            }
        });

    debug!(
        width = grid.width,
        height = grid.height,
        triangles = triangulation.triangles.len(),
        "regrid complete"
    );
    Ok(grid)
}

fn nearest_value(samples: &[SwathSample], lon: f64, lat: f64) -> f32 {
    let mut best = f32::NAN;
    let mut best_dist = f64::MAX;
    for s in samples {
        let dx = s.lon - lon;
        let dy = s.lat - lat;
        let dist = dx * dx + dy * dy;
        if dist < best_dist {
            best_dist = dist;
            best = s.value;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use swath::{filter_samples, IngestOptions, SwathSample};

    fn sample(lon: f64, lat: f64, value: f32) -> SwathSample {
        SwathSample {
            lat,
            lon,
            value,
            terrain_height: None,
            surface_pressure: None,
        }
    }

    #[test]
    fn test_sample_coincident_vertex_is_exact() {
        // Values follow the plane f(lon, lat) = lon + lat. The axes put
        // vertices at lon 0, 1 and lat 2, 1: the vertex at (0, 2) coincides
        // with a sample and the rest sit inside the hull, so every vertex
        // must reproduce the plane.
        let samples = vec![
            sample(0.0, 0.0, 0.0),
            sample(2.0, 0.0, 2.0),
            sample(0.0, 2.0, 2.0),
            sample(2.0, 2.0, 4.0),
        ];
        let opts = RegridOptions {
            resolution_deg: 1.0,
            ..Default::default()
        };
        let grid = regrid(&samples, &opts).unwrap();

        assert_eq!(grid.width, 2);
        assert_eq!(grid.height, 2);
        for row in 0..2 {
            for col in 0..2 {
                let expected = (grid.lon_at(col) + grid.lat_at(row)) as f32;
                assert!((grid.get(col, row).unwrap() - expected).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_grid_width_from_span() {
        let samples = vec![
            sample(10.0, 20.0, 1.0),
            sample(10.05, 20.0, 2.0),
            sample(10.02, 20.04, 3.0),
        ];
        let grid = regrid(&samples, &RegridOptions::default()).unwrap();
        // Lon span 0.05 at 0.01 degrees: five vertices, far edge excluded.
        // The f64 quotients (5.000000000000071 and 3.999999999999915) snap
        // before the ceiling.
        assert_eq!(grid.width, 5);
        assert_eq!(grid.height, 4);
    }

    #[test]
    fn test_interior_is_linear_in_plane() {
        // Values follow f(lon, lat) = lon + lat; linear interpolation must
        // reproduce the plane at interior vertices.
        let samples = vec![
            sample(0.0, 0.0, 0.0),
            sample(2.0, 0.0, 2.0),
            sample(0.0, 2.0, 2.0),
            sample(2.0, 2.0, 4.0),
        ];
        let opts = RegridOptions {
            resolution_deg: 0.5,
            ..Default::default()
        };
        let grid = regrid(&samples, &opts).unwrap();
        assert_eq!(grid.width, 4);

        for row in 0..grid.height {
            for col in 0..grid.width {
                let expected = (grid.lon_at(col) + grid.lat_at(row)) as f32;
                let got = grid.get(col, row).unwrap();
                assert!(
                    (got - expected).abs() < 1e-4,
                    "({}, {}) = {}, expected {}",
                    col,
                    row,
                    got,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_too_few_samples_yield_nodata_grid() {
        let samples = vec![sample(0.0, 0.0, 1.0), sample(1.0, 1.0, 2.0)];
        let opts = RegridOptions {
            resolution_deg: 1.0,
            ..Default::default()
        };
        let grid = regrid(&samples, &opts).unwrap();
        assert!(grid.is_all_nodata());
    }

    #[test]
    fn test_collinear_samples_yield_nodata_grid() {
        let samples = vec![
            sample(0.0, 0.0, 1.0),
            sample(1.0, 1.0, 2.0),
            sample(2.0, 2.0, 3.0),
        ];
        let opts = RegridOptions {
            resolution_deg: 1.0,
            ..Default::default()
        };
        let grid = regrid(&samples, &opts).unwrap();
        assert!(grid.is_all_nodata());
    }

    #[test]
    fn test_nearest_neighbor_extrapolation_fills_outside_hull() {
        let samples = vec![
            sample(1.0, 0.0, 5.0),
            sample(2.0, 2.0, 5.0),
            sample(0.0, 2.0, 5.0),
        ];
        let opts = RegridOptions {
            resolution_deg: 1.0,
            extrapolation: ExtrapolationPolicy::NearestNeighbor,
        };
        let grid = regrid(&samples, &opts).unwrap();
        // The vertex at lon 0, lat 1 lies outside the triangle but must be
        // filled from the nearest sample.
        assert!(!grid.values.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_rejected_pixel_value_does_not_affect_grid() {
        // Mutating the value of a quality-rejected pixel must not change
        // the interpolated output at all.
        let mk_arrays = |poisoned: f32| swath::ingest::SwathArrays {
            rows: 2,
            cols: 2,
            latitude: vec![0.0, 0.0, 1.0, 1.0],
            longitude: vec![0.0, 1.0, 0.0, 1.0],
            values: vec![1.0, 2.0, 3.0, poisoned],
            quality: vec![0.0, 0.0, 0.0, 1.0],
            terrain_height: None,
            surface_pressure: None,
        };

        let opts = RegridOptions {
            resolution_deg: 0.5,
            ..Default::default()
        };
        let a = regrid(
            &filter_samples(&mk_arrays(4.0), &IngestOptions::default()).unwrap(),
            &opts,
        )
        .unwrap();
        let b = regrid(
            &filter_samples(&mk_arrays(9999.0), &IngestOptions::default()).unwrap(),
            &opts,
        )
        .unwrap();

        assert_eq!(a.values.len(), b.values.len());
        for (x, y) in a.values.iter().zip(b.values.iter()) {
            assert!((x.is_nan() && y.is_nan()) || x == y);
        }
    }
}
