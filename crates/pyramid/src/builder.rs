//! Overview pyramid construction and atomic asset publication.

use crate::container::{write_asset_file, BLOCK_SIZE};
use crate::{PyramidError, Result};
use raster_common::ReprojectedRaster;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// One resolution level of the pyramid, full resolution first.
pub struct PyramidLevel {
    pub width: usize,
    pub height: usize,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub values: Vec<f32>,
}

/// Downsample a level by 2x, averaging each 2x2 block.
///
/// Dimensions are ceil-halved, so an odd edge keeps a partial block instead
/// of dropping its last row or column. Nodata pixels are excluded from the
/// average; the output pixel is nodata only when the whole block is nodata.
fn downsample_2x(values: &[f32], width: usize, height: usize) -> (Vec<f32>, usize, usize) {
    let new_width = width.div_ceil(2);
    let new_height = height.div_ceil(2);
    let mut output = vec![f32::NAN; new_width * new_height];

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let mut sum = 0.0f32;
            let mut count = 0u32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let in_x = out_x * 2 + dx;
                    let in_y = out_y * 2 + dy;
                    if in_x >= width || in_y >= height {
                        continue;
                    }
                    let v = values[in_y * width + in_x];
                    if !v.is_nan() {
                        sum += v;
                        count += 1;
                    }
                }
            }

            output[out_y * new_width + out_x] = if count == 0 {
                f32::NAN
            } else {
                sum / count as f32
            };
        }
    }

    (output, new_width, new_height)
}

/// Build the full overview chain for a raster.
///
/// Level 0 is the raster itself; levels halve until one fits inside a
/// single block.
pub fn build_levels(raster: &ReprojectedRaster) -> Result<Vec<PyramidLevel>> {
    if raster.width == 0 || raster.height == 0 {
        return Err(PyramidError::EmptyRaster);
    }

    let mut levels = vec![PyramidLevel {
        width: raster.width,
        height: raster.height,
        pixel_size_x: raster.pixel_size_x,
        pixel_size_y: raster.pixel_size_y,
        values: raster.values.clone(),
    }];

    loop {
        let last = levels.last().map(|l| (l.width, l.height));
        let (width, height) = match last {
            Some(dims) => dims,
            None => break,
        };
        if width.max(height) <= BLOCK_SIZE {
            break;
        }

        let prev = &levels[levels.len() - 1];
        let (values, new_width, new_height) = downsample_2x(&prev.values, width, height);
        let level = PyramidLevel {
            width: new_width,
            height: new_height,
            pixel_size_x: prev.pixel_size_x * 2.0,
            pixel_size_y: prev.pixel_size_y * 2.0,
            values,
        };
        debug!(
            level = levels.len(),
            width = new_width,
            height = new_height,
            "built overview level"
        );
        levels.push(level);
    }

    Ok(levels)
}

/// Build the pyramid and publish it at `path` atomically.
///
/// The asset is written next to its destination and moved into place with a
/// rename, so a concurrently running tile server only ever sees either the
/// old complete asset or the new complete asset.
pub fn publish_asset(raster: &ReprojectedRaster, path: &Path) -> Result<()> {
    let levels = build_levels(raster)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp_path = Path::new(&tmp);

    let level_views: Vec<(usize, usize, f64, f64, &[f32])> = levels
        .iter()
        .map(|l| {
            (
                l.width,
                l.height,
                l.pixel_size_x,
                l.pixel_size_y,
                l.values.as_slice(),
            )
        })
        .collect();

    if let Err(e) = write_asset_file(
        tmp_path,
        &raster.crs.to_string(),
        raster.origin_x,
        raster.origin_y,
        &level_views,
    ) {
        let _ = fs::remove_file(tmp_path);
        return Err(e);
    }

    if let Err(e) = fs::rename(tmp_path, path) {
        let _ = fs::remove_file(tmp_path);
        return Err(PyramidError::Publish(path.display().to_string(), e));
    }

    info!(
        path = %path.display(),
        levels = levels.len(),
        width = raster.width,
        height = raster.height,
        "published tiled asset"
    );
    Ok(())
}
