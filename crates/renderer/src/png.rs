//! PNG encoding for RGBA tile images.
//!
//! Two encoding modes:
//! - indexed PNG (color type 3) when the tile has at most 256 unique
//!   colors, with a tRNS chunk carrying per-entry alpha;
//! - RGBA PNG (color type 6) as the fallback for richer tiles.
//!
//! `encode_auto` analyzes the pixels and picks the smaller form.

use crate::RenderError;
use std::collections::HashMap;
use std::io::Write;

const MAX_PALETTE_SIZE: usize = 256;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Encode RGBA pixels, choosing indexed or full-color form automatically.
pub fn encode_auto(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    match extract_palette(pixels) {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices),
        None => encode_rgba(pixels, width, height),
    }
}

#[inline]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Extract a palette and index raster, or None with more than 256 colors.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk[0], chunk[1], chunk[2], chunk[3]);
        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Encode an indexed PNG (color type 3).
pub fn encode_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(3); // color type: indexed
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    let mut plte = Vec::with_capacity(palette.len() * 3);
    for (r, g, b, _) in palette {
        plte.extend_from_slice(&[*r, *g, *b]);
    }
    write_chunk(&mut png, b"PLTE", &plte);

    // tRNS only when any entry is not fully opaque.
    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(indices, width, height, 1)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode a full-color RGBA PNG (color type 6).
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(6); // color type: RGBA
    ihdr.push(0);
    ihdr.push(0);
    ihdr.push(0);
    write_chunk(&mut png, b"IHDR", &ihdr);

    let idat = deflate_scanlines(pixels, width, height, 4)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Prefix each scanline with filter type 0 and zlib-compress the result.
fn deflate_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, RenderError> {
    let stride = width * bytes_per_pixel;
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for y in 0..height {
        uncompressed.push(0); // filter type: none
        uncompressed.extend_from_slice(&data[y * stride..(y + 1) * stride]);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&uncompressed)
        .and_then(|_| encoder.finish())
        .map_err(RenderError::Encode)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_and_ihdr() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255];
        let png = encode_auto(&pixels, 2, 1).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        // IHDR length and type follow the signature.
        assert_eq!(&png[12..16], b"IHDR");
    }

    #[test]
    fn test_few_colors_use_indexed() {
        let mut pixels = Vec::new();
        for i in 0..64 {
            if i % 2 == 0 {
                pixels.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
        let png = encode_auto(&pixels, 8, 8).unwrap();
        // Color type byte sits at offset 25 within IHDR.
        assert_eq!(png[25], 3);
        // Transparent palette entry forces a tRNS chunk.
        assert!(png.windows(4).any(|w| w == b"tRNS"));
    }

    #[test]
    fn test_many_colors_fall_back_to_rgba() {
        let mut pixels = Vec::new();
        for i in 0u32..300 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 2 % 256) as u8, 7, 255]);
        }
        let png = encode_auto(&pixels, 300, 1).unwrap();
        assert_eq!(png[25], 6);
        assert!(!png.windows(4).any(|w| w == b"PLTE"));
    }

    #[test]
    fn test_opaque_palette_skips_trns() {
        let pixels = [10, 20, 30, 255, 10, 20, 30, 255];
        let png = encode_auto(&pixels, 2, 1).unwrap();
        assert_eq!(png[25], 3);
        assert!(!png.windows(4).any(|w| w == b"tRNS"));
    }
}
