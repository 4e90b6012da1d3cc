//! On-disk tiled asset container.
//!
//! Layout: 4-byte magic `TRAS`, one version byte, a little-endian u32 header
//! length, a JSON header, then the block section. Each block is the zlib
//! stream of `BLOCK_SIZE * BLOCK_SIZE` little-endian f32 values (edge blocks
//! padded with NaN), with a CRC32 of the compressed bytes recorded in the
//! header. Block offsets are relative to the start of the block section, so
//! the header can be emitted before the data without back-patching.

use crate::{PyramidError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 4] = b"TRAS";
pub const FORMAT_VERSION: u8 = 1;

/// Side length of one stored block, in pixels.
pub const BLOCK_SIZE: usize = raster_common::TILE_SIZE;

fn is_nan_f32(v: &f32) -> bool {
    v.is_nan()
}

fn nan_f32() -> f32 {
    f32::NAN
}

/// Location of one compressed block within the block section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEntry {
    pub offset: u64,
    pub len: u64,
    pub crc32: u32,
}

/// Geometry and block table of one pyramid level.
///
/// Level 0 is the full-resolution raster; each further level halves the
/// pixel counts and doubles the pixel size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelInfo {
    pub width: usize,
    pub height: usize,
    pub pixel_size_x: f64,
    pub pixel_size_y: f64,
    pub blocks_x: usize,
    pub blocks_y: usize,
    pub blocks: Vec<BlockEntry>,
}

/// JSON header of a tiled asset.
///
/// The nodata sentinel is NaN, which JSON cannot represent; it is omitted
/// when NaN and restored on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetHeader {
    pub crs: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub block_size: usize,
    #[serde(skip_serializing_if = "is_nan_f32", default = "nan_f32")]
    pub nodata: f32,
    pub levels: Vec<LevelInfo>,
}

/// Compress one block of f32 values.
pub fn compress_block(values: &[f32]) -> Result<(Vec<u8>, u32)> {
    let mut raw = Vec::with_capacity(values.len() * 4);
    for v in values {
        raw.extend_from_slice(&v.to_le_bytes());
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map(|compressed| {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&compressed);
            let crc = hasher.finalize();
            (compressed, crc)
        })
        .map_err(|e| PyramidError::Write("block compression".to_string(), e))
}

/// Decompress one block back to f32 values, verifying its checksum first.
pub fn decompress_block(
    compressed: &[u8],
    expected_crc: u32,
    level: usize,
    bx: usize,
    by: usize,
) -> Result<Vec<f32>> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(compressed);
    if hasher.finalize() != expected_crc {
        return Err(PyramidError::Corrupt { level, bx, by });
    }

    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut raw = Vec::with_capacity(BLOCK_SIZE * BLOCK_SIZE * 4);
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| PyramidError::Read("block decompression".to_string(), e))?;

    if raw.len() != BLOCK_SIZE * BLOCK_SIZE * 4 {
        return Err(PyramidError::Format(format!(
            "block ({}, {}) at level {} has {} bytes, expected {}",
            bx,
            by,
            level,
            raw.len(),
            BLOCK_SIZE * BLOCK_SIZE * 4
        )));
    }

    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Cut one padded block out of a level array.
///
/// Pixels beyond the level edge are NaN so every stored block is exactly
/// `BLOCK_SIZE * BLOCK_SIZE` elements.
pub fn extract_block(
    values: &[f32],
    width: usize,
    height: usize,
    bx: usize,
    by: usize,
) -> Vec<f32> {
    let mut block = vec![f32::NAN; BLOCK_SIZE * BLOCK_SIZE];
    let col0 = bx * BLOCK_SIZE;
    let row0 = by * BLOCK_SIZE;

    for local_row in 0..BLOCK_SIZE {
        let row = row0 + local_row;
        if row >= height {
            break;
        }
        let cols = BLOCK_SIZE.min(width.saturating_sub(col0));
        let src = row * width + col0;
        let dst = local_row * BLOCK_SIZE;
        block[dst..dst + cols].copy_from_slice(&values[src..src + cols]);
    }
    block
}

/// Serialize a complete asset to a writer.
///
/// `levels` supplies, per level, its geometry and value array in row-major
/// order. Blocks are compressed up front so the header carries final
/// offsets.
pub fn write_asset<W: Write>(
    out: &mut W,
    crs: &str,
    origin_x: f64,
    origin_y: f64,
    levels: &[(usize, usize, f64, f64, &[f32])],
) -> Result<()> {
    let mut header_levels: Vec<LevelInfo> = Vec::with_capacity(levels.len());
    let mut block_section: Vec<u8> = Vec::new();

    for &(width, height, psx, psy, values) in levels {
        let blocks_x = width.div_ceil(BLOCK_SIZE);
        let blocks_y = height.div_ceil(BLOCK_SIZE);
        let mut blocks = Vec::with_capacity(blocks_x * blocks_y);

        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let block = extract_block(values, width, height, bx, by);
                let (compressed, crc32) = compress_block(&block)?;
                blocks.push(BlockEntry {
                    offset: block_section.len() as u64,
                    len: compressed.len() as u64,
                    crc32,
                });
                block_section.extend_from_slice(&compressed);
            }
        }

        header_levels.push(LevelInfo {
            width,
            height,
            pixel_size_x: psx,
            pixel_size_y: psy,
            blocks_x,
            blocks_y,
            blocks,
        });
    }

    let header = AssetHeader {
        crs: crs.to_string(),
        origin_x,
        origin_y,
        block_size: BLOCK_SIZE,
        nodata: f32::NAN,
        levels: header_levels,
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| PyramidError::Format(format!("header serialization: {}", e)))?;

    let io_err = |e| PyramidError::Write("asset stream".to_string(), e);
    out.write_all(MAGIC).map_err(io_err)?;
    out.write_all(&[FORMAT_VERSION]).map_err(io_err)?;
    out.write_all(&(header_json.len() as u32).to_le_bytes())
        .map_err(io_err)?;
    out.write_all(&header_json).map_err(io_err)?;
    out.write_all(&block_section).map_err(io_err)?;
    Ok(())
}

/// Serialize a complete asset to a file.
pub fn write_asset_file(
    path: &Path,
    crs: &str,
    origin_x: f64,
    origin_y: f64,
    levels: &[(usize, usize, f64, f64, &[f32])],
) -> Result<()> {
    let file =
        File::create(path).map_err(|e| PyramidError::Write(path.display().to_string(), e))?;
    let mut out = BufWriter::new(file);
    write_asset(&mut out, crs, origin_x, origin_y, levels)?;
    out.flush()
        .map_err(|e| PyramidError::Write(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_compress_round_trip() {
        let mut values = vec![f32::NAN; BLOCK_SIZE * BLOCK_SIZE];
        for (i, v) in values.iter_mut().enumerate().take(1000) {
            *v = i as f32 * 0.5;
        }
        let (compressed, crc) = compress_block(&values).unwrap();
        let restored = decompress_block(&compressed, crc, 0, 0, 0).unwrap();
        assert_eq!(restored.len(), values.len());
        for (a, b) in values.iter().zip(restored.iter()) {
            assert!((a.is_nan() && b.is_nan()) || a == b);
        }
    }

    #[test]
    fn test_corrupt_block_detected() {
        let values = vec![1.0f32; BLOCK_SIZE * BLOCK_SIZE];
        let (mut compressed, crc) = compress_block(&values).unwrap();
        compressed[10] ^= 0xff;
        assert!(matches!(
            decompress_block(&compressed, crc, 2, 3, 4),
            Err(PyramidError::Corrupt {
                level: 2,
                bx: 3,
                by: 4
            })
        ));
    }

    #[test]
    fn test_extract_block_pads_edges() {
        // 300x300 level: block (1, 1) covers only 44x44 real pixels.
        let width = 300;
        let height = 300;
        let values: Vec<f32> = (0..width * height).map(|i| i as f32).collect();

        let block = extract_block(&values, width, height, 1, 1);
        assert_eq!(block[0], (BLOCK_SIZE * width + BLOCK_SIZE) as f32);
        // Just past the real edge.
        assert!(block[44].is_nan());
        assert!(block[43 * BLOCK_SIZE + 43].is_finite());
        assert!(block[44 * BLOCK_SIZE].is_nan());
    }
}
