//! Windowed asset reader backing the tile server.
//!
//! The reader keeps a shared read-only file handle and serves concurrent
//! positioned reads with `read_at`, so tile requests never contend on a
//! seek position. Per tile it picks the overview whose resolution best
//! matches the request, decompresses only the blocks under the tile
//! footprint and resamples the window to the 256x256 tile raster.

use crate::container::{decompress_block, AssetHeader, FORMAT_VERSION, MAGIC};
use crate::{PyramidError, Result};
use raster_common::{BoundingBox, TileCoord, TILE_SIZE};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;
use tracing::debug;

/// An opened tiled asset.
pub struct AssetReader {
    file: File,
    header: AssetHeader,
    /// Byte offset of the block section within the file.
    data_start: u64,
}

/// A decompressed rectangular window of one level, in level pixel space.
struct LevelWindow {
    col0: usize,
    row0: usize,
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl LevelWindow {
    /// Value at absolute level coordinates, NaN outside the window.
    fn get(&self, col: i64, row: i64) -> f32 {
        if col < self.col0 as i64
            || row < self.row0 as i64
            || col >= (self.col0 + self.width) as i64
            || row >= (self.row0 + self.height) as i64
        {
            return f32::NAN;
        }
        let local = (row as usize - self.row0) * self.width + (col as usize - self.col0);
        self.values[local]
    }
}

impl AssetReader {
    /// Open and validate an asset file.
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| PyramidError::Read(path.display().to_string(), e))?;

        let mut prefix = [0u8; 9];
        file.read_exact_at(&mut prefix, 0)
            .map_err(|e| PyramidError::Read(path.display().to_string(), e))?;
        if &prefix[0..4] != MAGIC {
            return Err(PyramidError::Format("bad magic, not a tiled asset".to_string()));
        }
        if prefix[4] != FORMAT_VERSION {
            return Err(PyramidError::Format(format!(
                "unsupported asset version {}",
                prefix[4]
            )));
        }

        let header_len = u32::from_le_bytes([prefix[5], prefix[6], prefix[7], prefix[8]]) as u64;
        let mut header_buf = vec![0u8; header_len as usize];
        file.read_exact_at(&mut header_buf, 9)
            .map_err(|e| PyramidError::Read(path.display().to_string(), e))?;

        let header: AssetHeader = serde_json::from_slice(&header_buf)
            .map_err(|e| PyramidError::Format(format!("invalid asset header: {}", e)))?;
        if header.levels.is_empty() {
            return Err(PyramidError::Format("asset has no levels".to_string()));
        }

        Ok(Self {
            file,
            header,
            data_start: 9 + header_len,
        })
    }

    pub fn header(&self) -> &AssetHeader {
        &self.header
    }

    /// Full extent of the asset in projected coordinates.
    pub fn bbox(&self) -> BoundingBox {
        let base = &self.header.levels[0];
        let max_x = self.header.origin_x + base.width as f64 * base.pixel_size_x;
        let min_y = self.header.origin_y + base.height as f64 * base.pixel_size_y;
        BoundingBox::new(self.header.origin_x, min_y, max_x, self.header.origin_y)
    }

    /// Pick the coarsest level whose resolution is still at least as fine
    /// as the target. Requests coarser than every overview get the last
    /// level; requests finer than the base raster get level 0.
    fn select_level(&self, target_resolution: f64) -> usize {
        let mut selected = 0;
        for (i, level) in self.header.levels.iter().enumerate() {
            if level.pixel_size_x <= target_resolution {
                selected = i;
            } else {
                break;
            }
        }
        selected
    }

    /// Read and decompress one block of one level.
    fn read_block(&self, level_index: usize, bx: usize, by: usize) -> Result<Vec<f32>> {
        let level = &self.header.levels[level_index];
        let entry = &level.blocks[by * level.blocks_x + bx];

        let mut compressed = vec![0u8; entry.len as usize];
        self.file
            .read_exact_at(&mut compressed, self.data_start + entry.offset)
            .map_err(|e| PyramidError::Read(format!("block ({}, {})", bx, by), e))?;

        decompress_block(&compressed, entry.crc32, level_index, bx, by)
    }

    /// Assemble the window of a level covering a pixel range, inclusive of
    /// a one-pixel bilinear margin.
    fn read_window(
        &self,
        level_index: usize,
        col0: usize,
        row0: usize,
        col1: usize,
        row1: usize,
    ) -> Result<LevelWindow> {
        let level = &self.header.levels[level_index];
        let block_size = self.header.block_size;

        let bx0 = col0 / block_size;
        let bx1 = col1 / block_size;
        let by0 = row0 / block_size;
        let by1 = row1 / block_size;

        let width = col1 - col0 + 1;
        let height = row1 - row0 + 1;
        let mut values = vec![f32::NAN; width * height];

        for by in by0..=by1 {
            for bx in bx0..=bx1 {
                let block = self.read_block(level_index, bx, by)?;

                let block_col0 = bx * block_size;
                let block_row0 = by * block_size;
                let copy_col0 = col0.max(block_col0);
                let copy_col1 = col1.min(block_col0 + block_size - 1).min(level.width - 1);
                let copy_row0 = row0.max(block_row0);
                let copy_row1 = row1.min(block_row0 + block_size - 1).min(level.height - 1);
                if copy_col0 > copy_col1 || copy_row0 > copy_row1 {
                    continue;
                }

                for row in copy_row0..=copy_row1 {
                    let src = (row - block_row0) * block_size + (copy_col0 - block_col0);
                    let dst = (row - row0) * width + (copy_col0 - col0);
                    let n = copy_col1 - copy_col0 + 1;
                    values[dst..dst + n].copy_from_slice(&block[src..src + n]);
                }
            }
        }

        Ok(LevelWindow {
            col0,
            row0,
            width,
            height,
            values,
        })
    }

    /// Extract the 256x256 value raster for one tile.
    ///
    /// Tiles outside the asset footprint come back all nodata without
    /// touching the block section.
    pub fn read_tile(&self, coord: TileCoord) -> Result<Vec<f32>> {
        let bounds = coord.mercator_bounds();
        let mut out = vec![f32::NAN; TILE_SIZE * TILE_SIZE];

        if !bounds.intersects(&self.bbox()) {
            return Ok(out);
        }

        let level_index = self.select_level(coord.resolution());
        let level = &self.header.levels[level_index];
        let psx = level.pixel_size_x;
        let psy = level.pixel_size_y;
        let origin_x = self.header.origin_x;
        let origin_y = self.header.origin_y;

        // Fractional source pixel range under the tile, padded one pixel
        // for the bilinear stencil.
        let src_col_min = (bounds.min_x - origin_x) / psx;
        let src_col_max = (bounds.max_x - origin_x) / psx;
        let src_row_min = (bounds.max_y - origin_y) / psy;
        let src_row_max = (bounds.min_y - origin_y) / psy;

        let col0 = (src_col_min.floor() as i64 - 1).clamp(0, level.width as i64 - 1) as usize;
        let col1 = (src_col_max.ceil() as i64 + 1).clamp(0, level.width as i64 - 1) as usize;
        let row0 = (src_row_min.floor() as i64 - 1).clamp(0, level.height as i64 - 1) as usize;
        let row1 = (src_row_max.ceil() as i64 + 1).clamp(0, level.height as i64 - 1) as usize;

        let window = self.read_window(level_index, col0, row0, col1, row1)?;

        let tile_res = coord.resolution();
        for ty in 0..TILE_SIZE {
            let y = bounds.max_y - (ty as f64 + 0.5) * tile_res;
            let row_f = (y - origin_y) / psy - 0.5;
            for tx in 0..TILE_SIZE {
                let x = bounds.min_x + (tx as f64 + 0.5) * tile_res;
                let col_f = (x - origin_x) / psx - 0.5;
                out[ty * TILE_SIZE + tx] = sample_window(&window, col_f, row_f);
            }
        }

        debug!(
            z = coord.z,
            x = coord.x,
            y = coord.y,
            level = level_index,
            "read tile window"
        );
        Ok(out)
    }
}

/// Bilinear sample of a level window at fractional pixel coordinates,
/// excluding nodata corners and renormalizing the surviving weights.
fn sample_window(window: &LevelWindow, col_f: f64, row_f: f64) -> f32 {
    let col0 = col_f.floor() as i64;
    let row0 = row_f.floor() as i64;
    let tx = col_f - col0 as f64;
    let ty = row_f - row0 as f64;

    let corners = [
        (window.get(col0, row0), (1.0 - tx) * (1.0 - ty)),
        (window.get(col0 + 1, row0), tx * (1.0 - ty)),
        (window.get(col0, row0 + 1), (1.0 - tx) * ty),
        (window.get(col0 + 1, row0 + 1), tx * ty),
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
        f32::NAN
    }
}
