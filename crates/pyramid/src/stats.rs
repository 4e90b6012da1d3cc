//! Display-range statistics for color mapping.
//!
//! The stretch is percentile-based so a handful of outlier retrievals does
//! not wash out the whole colormap. Statistics run on a decimated view of
//! the raster; the percentiles are robust enough that a 4x stride in both
//! axes changes them by less than the colormap can resolve.

use tracing::warn;

/// Stride applied along both axes before collecting values.
const DECIMATION: usize = 4;

/// Lower and upper percentiles of the contrast stretch.
const P_LOW: f64 = 2.0;
const P_HIGH: f64 = 98.0;

/// Display range of an asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStats {
    pub vmin: f32,
    pub vmax: f32,
    /// False when the raster had no valid data and the range is a
    /// placeholder.
    pub available: bool,
}

/// Compute the percentile contrast stretch of a raster.
///
/// A raster with no valid pixels gets the placeholder range `[0, 1]` and is
/// marked unavailable so the server can say so rather than render garbage.
/// A constant field keeps its real `vmin == vmax` bounds; the renderer
/// collapses a zero-width range to a single color.
pub fn compute_color_stats(values: &[f32], width: usize, height: usize) -> ColorStats {
    let mut sampled: Vec<f32> = Vec::with_capacity(values.len() / (DECIMATION * DECIMATION) + 1);
    for row in (0..height).step_by(DECIMATION) {
        for col in (0..width).step_by(DECIMATION) {
            let v = values[row * width + col];
            if !v.is_nan() {
                sampled.push(v);
            }
        }
    }

    if sampled.is_empty() {
        warn!("no valid pixels for statistics, using placeholder range");
        return ColorStats {
            vmin: 0.0,
            vmax: 1.0,
            available: false,
        };
    }

    sampled.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    ColorStats {
        vmin: percentile(&sampled, P_LOW),
        vmax: percentile(&sampled, P_HIGH),
        available: true,
    }
}

/// Percentile of a sorted slice by linear interpolation between ranks.
fn percentile(sorted: &[f32], p: f64) -> f32 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
