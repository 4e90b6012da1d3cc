//! Tile rendering: value rasters to colormapped PNG images.

pub mod colorize;
pub mod colormap;
pub mod png;

pub use colorize::colorize;
pub use colormap::inferno;
pub use png::{encode_auto, encode_rgba};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PNG compression failed: {0}")]
    Encode(#[source] std::io::Error),
}

/// Render a value raster straight to PNG bytes.
pub fn render_tile_png(
    values: &[f32],
    width: usize,
    height: usize,
    vmin: f32,
    vmax: f32,
) -> Result<Vec<u8>, RenderError> {
    let pixels = colorize(values, vmin, vmax);
    encode_auto(&pixels, width, height)
}
