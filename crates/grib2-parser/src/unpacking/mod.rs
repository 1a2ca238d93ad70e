//! GRIB2 data unpacking.
//!
//! Simple packing (template 5.0) is decoded here. Complex, JPEG2000 and PNG
//! packings go through the `grib` crate.

use crate::Grib2Error;
use std::io::Cursor;

/// Unpack simple packed GRIB2 data
///
/// Simple packing formula: value = (reference_value + (packed_value * 2^binary_scale)) * 10^(-decimal_scale)
///
/// `num_points` is the total number of grid points. With a bitmap, only
/// points flagged present consume a packed value.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: u32,
    bits_per_value: u8,
    reference_value: f32,
    binary_scale_factor: i16,
    decimal_scale_factor: i16,
    bitmap: Option<&[u8]>,
) -> Result<Vec<Option<f32>>, Grib2Error> {
    let binary_scale = 2.0_f32.powi(binary_scale_factor as i32);
    let decimal_scale = 10.0_f32.powi(-(decimal_scale_factor as i32));
    let constant = reference_value * decimal_scale;

    let mut values = Vec::with_capacity(num_points as usize);
    let mut bit_position = 0;
    let bits_per_value = bits_per_value as usize;

    for i in 0..(num_points as usize) {
        // Bitmap: 1 bit per grid point, 1 = value present, 0 = missing
        let has_value = match bitmap {
            Some(bm) => bm
                .get(i / 8)
                .map(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
                .unwrap_or(false),
            None => true,
        };

        if !has_value {
            values.push(None);
            continue;
        }

        if bits_per_value == 0 {
            values.push(Some(constant));
            continue;
        }

        let packed_value = extract_bits(packed_data, bit_position, bits_per_value)
            .map_err(|e| Grib2Error::UnpackingError(format!("Failed to extract bits: {}", e)))?;
        bit_position += bits_per_value;

        let value = (reference_value + (packed_value as f32) * binary_scale) * decimal_scale;
        values.push(Some(value));
    }

    Ok(values)
}

/// Decode the first field of a complete message with the `grib` crate.
pub fn unpack_with_grib(message: &[u8]) -> Result<Vec<f32>, Grib2Error> {
    let grib_file = grib::from_reader(Cursor::new(message))
        .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;

    let (_, submsg) = grib_file
        .iter()
        .next()
        .ok_or_else(|| Grib2Error::UnpackingError("grib crate found no submessage".to_string()))?;

    let decoder = grib::Grib2SubmessageDecoder::from(submsg)
        .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;
    let values = decoder
        .dispatch()
        .map_err(|e| Grib2Error::UnpackingError(e.to_string()))?;

    Ok(values.collect())
}

/// Extract bits from a byte array
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let mut result = 0u32;

    for i in 0..num_bits {
        let absolute_bit = start_bit + i;
        let byte_idx = absolute_bit / 8;
        let bit_idx = 7 - (absolute_bit % 8); // MSB first

        let byte = data
            .get(byte_idx)
            .ok_or_else(|| "Not enough data to extract bits".to_string())?;
        result = (result << 1) | ((byte >> bit_idx) & 1) as u32;
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bits() {
        let data = vec![0b10110101];

        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
        assert!(extract_bits(&data, 4, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        let packed = vec![100, 200];
        let vals = unpack_simple(&packed, 2, 8, 0.0, 0, 0, None).unwrap();

        assert_eq!(vals.len(), 2);
        assert!((vals[0].unwrap() - 100.0).abs() < 0.1);
        assert!((vals[1].unwrap() - 200.0).abs() < 0.1);
    }

    #[test]
    fn test_scale_factors() {
        // (10 + 3 * 2^1) * 10^-1 = 1.6
        let vals = unpack_simple(&[3], 1, 8, 10.0, 1, 1, None).unwrap();
        assert!((vals[0].unwrap() - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_bitmap_missing_points_do_not_consume_bits() {
        // Points 0 and 2 present, 1 missing; packed stream has two values.
        let bitmap = [0b1010_0000];
        let vals = unpack_simple(&[7, 9], 3, 8, 0.0, 0, 0, Some(&bitmap)).unwrap();

        assert_eq!(vals, vec![Some(7.0), None, Some(9.0)]);
    }

    #[test]
    fn test_constant_field() {
        let vals = unpack_simple(&[], 4, 0, 5520.0, 0, 0, None).unwrap();
        assert_eq!(vals, vec![Some(5520.0); 4]);
    }
}
