//! PNG encoding for RGBA image data.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: Used when image has ≤256 unique colors.
//! - **RGBA PNG (color type 6)**: Fallback for images with >256 colors.
//!
//! Both carry an optional pHYs chunk so viewers know the intended DPI.

use crate::RenderError;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Write;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

/// Minimum pixels to benefit from parallel palette extraction
const PARALLEL_THRESHOLD: usize = 4096;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Create a PNG image with automatic format selection.
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
/// - `dpi`: Resolution recorded in the pHYs chunk, if any
pub fn create_png_auto(
    pixels: &[u8],
    width: usize,
    height: usize,
    dpi: Option<u32>,
) -> Result<Vec<u8>, RenderError> {
    check_dimensions(pixels, width, height)?;
    let num_pixels = pixels.len() / 4;

    let palette_result = if num_pixels >= PARALLEL_THRESHOLD {
        extract_palette_parallel(pixels)
    } else {
        extract_palette_sequential(pixels)
    };

    match palette_result {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices, dpi),
        None => create_png(pixels, width, height, dpi),
    }
}

fn check_dimensions(pixels: &[u8], width: usize, height: usize) -> Result<(), RenderError> {
    if width == 0 || height == 0 || pixels.len() != width * height * 4 {
        return Err(RenderError::InvalidDimensions(format!(
            "{} bytes for a {}x{} RGBA image",
            pixels.len(),
            width,
            height
        )));
    }
    Ok(())
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

#[inline(always)]
fn unpack_color(packed: u32) -> (u8, u8, u8, u8) {
    (
        packed as u8,
        (packed >> 8) as u8,
        (packed >> 16) as u8,
        (packed >> 24) as u8,
    )
}

/// Sequential palette extraction for small images.
fn extract_palette_sequential(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
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

/// Parallel palette extraction for larger images.
///
/// Unique colors are gathered per chunk, merged, and then each pixel is
/// mapped to its index in a second parallel pass.
fn extract_palette_parallel(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let chunk_pixels = (pixels.len() / 4 / rayon::current_num_threads()).max(256);
    let chunk_size = chunk_pixels * 4;

    let unique_colors: Vec<u32> = pixels
        .par_chunks(chunk_size)
        .flat_map(|chunk| {
            let mut local_colors: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE);
            for pixel in chunk.chunks_exact(4) {
                local_colors.insert(pack_color(pixel[0], pixel[1], pixel[2], pixel[3]), ());
                if local_colors.len() > MAX_PALETTE_SIZE {
                    break;
                }
            }
            local_colors.into_keys().collect::<Vec<_>>()
        })
        .collect();

    let mut global_colors: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);

    for packed in unique_colors {
        if !global_colors.contains_key(&packed) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            global_colors.insert(packed, palette.len() as u8);
            palette.push(unpack_color(packed));
        }
    }

    let mut indices = vec![0u8; pixels.len() / 4];
    indices
        .par_chunks_mut(chunk_pixels)
        .zip(pixels.par_chunks(chunk_size))
        .for_each(|(idx_chunk, px_chunk)| {
            for (idx, pixel) in idx_chunk.iter_mut().zip(px_chunk.chunks_exact(4)) {
                let packed = pack_color(pixel[0], pixel[1], pixel[2], pixel[3]);
                *idx = global_colors.get(&packed).copied().unwrap_or(0);
            }
        });

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
    dpi: Option<u32>,
) -> Result<Vec<u8>, RenderError> {
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE || indices.len() != width * height {
        return Err(RenderError::InvalidDimensions(format!(
            "{} indices, {} palette entries for {}x{}",
            indices.len(),
            palette.len(),
            width,
            height
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));
    if let Some(dpi) = dpi {
        write_chunk(&mut png, b"pHYs", &phys(dpi));
    }

    let mut plte_data = Vec::with_capacity(palette.len() * 3);
    for (r, g, b, _) in palette {
        plte_data.extend_from_slice(&[*r, *g, *b]);
    }
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS only if any color has alpha < 255
    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    let idat_data = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(
    pixels: &[u8],
    width: usize,
    height: usize,
    dpi: Option<u32>,
) -> Result<Vec<u8>, RenderError> {
    check_dimensions(pixels, width, height)?;

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));
    if let Some(dpi) = dpi {
        write_chunk(&mut png, b"pHYs", &phys(dpi));
    }

    let idat_data = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// pHYs payload: pixels per metre on both axes, unit = metre.
fn phys(dpi: u32) -> Vec<u8> {
    let ppm = (dpi as f64 / 0.0254).round() as u32;
    let mut data = Vec::with_capacity(9);
    data.extend_from_slice(&ppm.to_be_bytes());
    data.extend_from_slice(&ppm.to_be_bytes());
    data.push(1);
    data
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate `height` rows of `row_bytes` each, filter type 0 per scanline.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> Result<Vec<u8>, RenderError> {
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(&uncompressed)
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_palette_simple() {
        let pixels = [
            255, 0, 0, 255, // red
            0, 255, 0, 255, // green
            0, 0, 255, 255, // blue
            255, 0, 0, 255, // red again
        ];

        let (palette, indices) = extract_palette_sequential(&pixels).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(indices.len(), 4);
        assert_eq!(indices[0], indices[3]);
    }

    #[test]
    fn test_extract_palette_parallel_matches_sequential_count() {
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let color_idx = ((x / 8) + (y / 8)) % 50;
                pixels.extend_from_slice(&[(color_idx * 5) as u8, 100, 200, 255]);
            }
        }

        let (palette, indices) = extract_palette_parallel(&pixels).unwrap();
        let (seq_palette, _) = extract_palette_sequential(&pixels).unwrap();
        assert_eq!(palette.len(), seq_palette.len());
        assert_eq!(indices.len(), 128 * 128);

        // Every index points back at the pixel's own color
        for (i, px) in pixels.chunks_exact(4).enumerate() {
            let (r, g, b, a) = palette[indices[i] as usize];
            assert_eq!([r, g, b, a], [px[0], px[1], px[2], px[3]]);
        }
    }

    #[test]
    fn test_too_many_colors() {
        let mut pixels = Vec::with_capacity(300 * 4);
        for i in 0..300u32 {
            pixels.extend_from_slice(&[(i % 256) as u8, (i / 256) as u8, 0, 255]);
        }
        assert!(extract_palette_sequential(&pixels).is_none());
    }

    #[test]
    fn test_phys_for_150_dpi() {
        let data = phys(150);
        assert_eq!(u32::from_be_bytes([data[0], data[1], data[2], data[3]]), 5906);
        assert_eq!(data[8], 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = create_png_auto(&[0; 12], 2, 2, None).unwrap_err();
        assert!(matches!(err, RenderError::InvalidDimensions(_)));
    }
}
