//! Value-to-RGBA rendering of tile rasters.

use crate::colormap::inferno;

/// Render a value raster to RGBA bytes.
///
/// Each value is clipped to `[vmin, vmax]`, normalized and mapped through
/// the inferno ramp at full opacity. Nodata pixels come out fully
/// transparent black so basemaps show through.
pub fn colorize(values: &[f32], vmin: f32, vmax: f32) -> Vec<u8> {
    let range = vmax - vmin;
    let inv_range = if range > 0.0 { 1.0 / range } else { 0.0 };

    let mut pixels = Vec::with_capacity(values.len() * 4);
    for &v in values {
        if v.is_nan() {
            pixels.extend_from_slice(&[0, 0, 0, 0]);
        } else {
            let t = (v - vmin) * inv_range;
            let (r, g, b) = inferno(t);
            pixels.extend_from_slice(&[r, g, b, 255]);
        }
    }
    pixels
}
