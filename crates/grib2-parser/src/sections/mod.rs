//! GRIB2 section parsing.
//!
//! Each GRIB2 message consists of numbered sections containing metadata,
//! grid information and the packed data. Parsers here take the complete
//! message and locate their section by number.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use gfs_common::{GridSpec, ScanMode};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Section 3: Grid Definition Section
///
/// Coordinates are in degrees as stored, i.e. longitudes in [0, 360) for
/// NCEP products.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template_number: u16,
    pub num_data_points: u32,
    pub grid_shape: u8,
    pub num_points_latitude: u32,
    pub num_points_longitude: u32,
    pub first_latitude: f64,
    pub first_longitude: f64,
    pub last_latitude: f64,
    pub last_longitude: f64,
    pub longitude_increment: f64,
    pub latitude_increment: f64,
    pub scanning_mode: u8,
}

impl GridDefinition {
    /// Regular lat/lon grid description, with signed increments.
    pub fn grid_spec(&self) -> Result<GridSpec, Grib2Error> {
        if self.template_number != 0 {
            return Err(Grib2Error::UnsupportedGrid(format!(
                "grid definition template 3.{} (only 3.0 lat/lon is supported)",
                self.template_number
            )));
        }

        let scan_mode = ScanMode::from_grib2_flag(self.scanning_mode);
        if scan_mode.alternating_rows {
            return Err(Grib2Error::UnsupportedGrid(
                "boustrophedonic row scanning".to_string(),
            ));
        }

        let nx = self.num_points_longitude as usize;
        let ny = self.num_points_latitude as usize;
        if nx == 0 || ny == 0 || nx * ny != self.num_data_points as usize {
            return Err(Grib2Error::UnsupportedGrid(format!(
                "{}x{} points does not match {} data points",
                nx, ny, self.num_data_points
            )));
        }

        Ok(GridSpec::from_grib(
            nx,
            ny,
            self.longitude_increment,
            self.latitude_increment,
            self.first_longitude,
            self.first_latitude,
            scan_mode,
        ))
    }
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template_number: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub parameter_short_name: String,
    pub parameter_units: String,
    pub level_type: u8,
    /// Level value with the scale factor applied (Pa for isobaric surfaces)
    pub level_value: f64,
    pub level_description: String,
    pub forecast_hour: u32,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    /// Number of packed values (excludes bitmap-masked points)
    pub num_data_points: u32,
    pub template_number: u16,
    pub original_data_type: u8,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub indicator: u8,
    pub data: Bytes,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octet 7: discipline, octet 8: edition, octets 9-16: total length
    let discipline = data[6];
    let edition = data[7];
    let message_length = read_u64(&data[8..16]);

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification), always at offset 16
pub fn parse_identification(data: &[u8]) -> Result<Identification, Grib2Error> {
    let section_offset = find_section(data, 1)?;
    let section_data = &data[section_offset..];

    if section_data.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    // Skip section length (4 bytes) and section number (1 byte)
    let sec = &section_data[5..];

    let center = read_u16(&sec[0..2]);
    let sub_center = read_u16(&sec[2..4]);
    let table_version = sec[4];
    let local_table_version = sec[5];
    let significance_of_reference_time = sec[6];

    let year = read_u16(&sec[7..9]);
    let (month, day, hour, minute, second) = (sec[9], sec[10], sec[11], sec[12], sec[13]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    let reference_time = DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc);

    Ok(Identification {
        center,
        sub_center,
        table_version,
        local_table_version,
        significance_of_reference_time,
        reference_time,
        production_status: sec[14],
        data_type: sec[15],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(data: &[u8]) -> Result<GridDefinition, Grib2Error> {
    let section_offset = find_section(data, 3)?;
    let section_data = section_slice(data, section_offset);

    if section_data.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Byte 5: source of grid definition
    // Bytes 6-9: number of data points
    // Bytes 12-13: grid definition template number
    let num_data_points = read_u32(&section_data[6..10]);
    let template_number = read_u16(&section_data[12..14]);

    // Template data starts at byte 14
    let gd = &section_data[14..];

    if template_number != 0 {
        // Other templates are described only by their point count; callers
        // reject them when they need coordinates.
        return Ok(GridDefinition {
            template_number,
            num_data_points,
            grid_shape: gd.first().copied().unwrap_or(0),
            num_points_latitude: 0,
            num_points_longitude: 0,
            first_latitude: 0.0,
            first_longitude: 0.0,
            last_latitude: 0.0,
            last_longitude: 0.0,
            longitude_increment: 0.0,
            latitude_increment: 0.0,
            scanning_mode: 0,
        });
    }

    // Template 3.0: Latitude/longitude (equidistant cylindrical)
    //
    // Byte 0: shape of the Earth
    // Bytes 16-19: Ni, points along a parallel
    // Bytes 20-23: Nj, points along a meridian
    // Bytes 24-27: basic angle of the initial production domain
    // Bytes 28-31: subdivisions of basic angle
    // Bytes 32-35: La1, Bytes 36-39: Lo1
    // Byte 40: resolution and component flags
    // Bytes 41-44: La2, Bytes 45-48: Lo2
    // Bytes 49-52: Di, Bytes 53-56: Dj
    // Byte 57: scanning mode
    if gd.len() < 58 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: format!("Template 0 needs at least 58 bytes, got {}", gd.len()),
        });
    }

    let ni = read_u32(&gd[16..20]);
    let nj = read_u32(&gd[20..24]);
    let basic_angle = read_u32(&gd[24..28]);
    let subdivisions = read_u32(&gd[28..32]);

    // Angles are in units of basic_angle / subdivisions degrees; 0 or
    // "missing" means microdegrees.
    let unit = if basic_angle == 0 || subdivisions == 0 || subdivisions == u32::MAX {
        1e-6
    } else {
        basic_angle as f64 / subdivisions as f64
    };

    Ok(GridDefinition {
        template_number,
        num_data_points,
        grid_shape: gd[0],
        num_points_longitude: ni,
        num_points_latitude: nj,
        first_latitude: decode_grib2_signed(&gd[32..36]) as f64 * unit,
        first_longitude: decode_grib2_signed(&gd[36..40]) as f64 * unit,
        last_latitude: decode_grib2_signed(&gd[41..45]) as f64 * unit,
        last_longitude: decode_grib2_signed(&gd[45..49]) as f64 * unit,
        longitude_increment: read_u32(&gd[49..53]) as f64 * unit,
        latitude_increment: read_u32(&gd[53..57]) as f64 * unit,
        scanning_mode: gd[57],
    })
}

/// Parse Section 4 (Product Definition)
///
/// Templates 4.0 through 4.15 share the layout of the horizontal level
/// fields read here.
pub fn parse_product_definition(
    data: &[u8],
    discipline: u8,
) -> Result<ProductDefinition, Grib2Error> {
    let section_offset = find_section(data, 4)?;
    let section_data = section_slice(data, section_offset);

    if section_data.len() < 28 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 7-8: product definition template number
    // Byte 9: parameter category, byte 10: parameter number
    // Byte 17: indicator of unit of time range
    // Bytes 18-21: forecast time
    // Byte 22: type of first fixed surface
    // Byte 23: scale factor, bytes 24-27: scaled value
    let template_number = read_u16(&section_data[7..9]);
    let parameter_category = section_data[9];
    let parameter_number = section_data[10];

    let time_unit = section_data[17];
    let forecast_time = read_u32(&section_data[18..22]);
    let forecast_hour = match time_unit {
        0 => Some(forecast_time / 60),
        2 => forecast_time.checked_mul(24),
        10 => forecast_time.checked_mul(3),
        11 => forecast_time.checked_mul(6),
        12 => forecast_time.checked_mul(12),
        _ => Some(forecast_time),
    }
    .ok_or_else(|| Grib2Error::InvalidSection {
        section: 4,
        reason: format!(
            "Forecast time {} in time unit {} overflows hours",
            forecast_time, time_unit
        ),
    })?;

    let level_type = section_data[22];
    let scale_factor = section_data[23] as i8;
    let scaled_value = read_u32(&section_data[24..28]);
    let level_value = if scaled_value == u32::MAX {
        0.0
    } else {
        scaled_value as f64 / 10f64.powi(scale_factor as i32)
    };

    let (parameter_short_name, parameter_units) =
        parameter_name_and_units(discipline, parameter_category, parameter_number);
    let level_description = level_description(level_type, level_value);

    Ok(ProductDefinition {
        template_number,
        parameter_category,
        parameter_number,
        parameter_short_name,
        parameter_units,
        level_type,
        level_value,
        level_description,
        forecast_hour,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(data: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    let section_offset = find_section(data, 5)?;
    let section_data = section_slice(data, section_offset);

    if section_data.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 5-8: number of packed values
    // Bytes 9-10: data representation template number
    // Templates 5.0, 5.2, 5.3, 5.40, 5.41 all start with:
    //   bytes 11-14 reference value (IEEE f32), 15-16 binary scale (E),
    //   17-18 decimal scale (D), 19 bits per value, 20 original type
    let num_data_points = read_u32(&section_data[5..9]);
    let template_number = read_u16(&section_data[9..11]);
    let t = &section_data[11..];

    if t.len() < 10 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: format!("Template 5.{} is too short", template_number),
        });
    }

    Ok(DataRepresentation {
        num_data_points,
        template_number,
        reference_value: f32::from_be_bytes([t[0], t[1], t[2], t[3]]),
        binary_scale_factor: read_sign_magnitude_i16(&t[4..6]),
        decimal_scale_factor: read_sign_magnitude_i16(&t[6..8]),
        bits_per_value: t[8],
        original_data_type: t[9],
    })
}

/// Parse Section 6 (Bitmap). `None` when no bitmap applies.
pub fn parse_bitmap(data: &[u8]) -> Result<Option<Bitmap>, Grib2Error> {
    let section_offset = find_section(data, 6)?;
    let section_data = section_slice(data, section_offset);

    if section_data.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    let indicator = section_data[5];
    match indicator {
        255 => Ok(None),
        0 => Ok(Some(Bitmap {
            indicator,
            data: Bytes::copy_from_slice(&section_data[6..]),
        })),
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Unsupported bitmap indicator {}", other),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(data: &[u8]) -> Result<DataSection, Grib2Error> {
    let section_offset = find_section(data, 7)?;
    let section_data = section_slice(data, section_offset);

    Ok(DataSection {
        data: Bytes::copy_from_slice(&section_data[5..]),
    })
}

// ===== Helper Functions =====

/// Find a section by number within a message
fn find_section(data: &[u8], section_num: u8) -> Result<usize, Grib2Error> {
    let mut offset = 16; // After Section 0

    loop {
        if offset + 5 > data.len() || &data[offset..offset + 4] == b"7777" {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Section not found".to_string(),
            });
        }

        let section_length = read_u32(&data[offset..offset + 4]) as usize;
        if section_length < 5 || offset + section_length > data.len() {
            return Err(Grib2Error::InvalidSection {
                section: section_num,
                reason: "Invalid section length".to_string(),
            });
        }

        if data[offset + 4] == section_num {
            return Ok(offset);
        }

        offset += section_length;
    }
}

/// The bytes of the section starting at `offset`, bounded by its length.
///
/// `offset` must come from [`find_section`], which validated the length.
fn section_slice(data: &[u8], offset: usize) -> &[u8] {
    let len = read_u32(&data[offset..offset + 4]) as usize;
    &data[offset..offset + len]
}

fn read_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn read_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn read_u64(b: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&b[..8]);
    u64::from_be_bytes(buf)
}

/// Decode a 4-byte GRIB2 signed integer.
///
/// GRIB2 uses sign-magnitude, not two's complement: the MSB is the sign.
/// Returns 0 for input of the wrong length.
pub fn decode_grib2_signed(b: &[u8]) -> i32 {
    if b.len() != 4 {
        return 0;
    }
    let raw = read_u32(b);
    let magnitude = (raw & 0x7FFF_FFFF) as i32;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_sign_magnitude_i16(b: &[u8]) -> i16 {
    let raw = read_u16(b);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Short name and units for the parameters GFS pressure-level files carry.
fn parameter_name_and_units(discipline: u8, category: u8, number: u8) -> (String, String) {
    let (name, units) = match (discipline, category, number) {
        // Category 0: Temperature
        (0, 0, 0) => ("TMP", "K"),
        (0, 0, 2) => ("POT", "K"),
        (0, 0, 6) => ("DPT", "K"),

        // Category 1: Moisture
        (0, 1, 0) => ("SPFH", "kg kg-1"),
        (0, 1, 1) => ("RH", "%"),
        (0, 1, 3) => ("PWAT", "kg m-2"),
        (0, 1, 8) => ("APCP", "kg m-2"),

        // Category 2: Momentum
        (0, 2, 2) => ("UGRD", "m s-1"),
        (0, 2, 3) => ("VGRD", "m s-1"),
        (0, 2, 8) => ("VVEL", "Pa s-1"),
        (0, 2, 10) => ("ABSV", "s-1"),

        // Category 3: Mass
        (0, 3, 0) => ("PRES", "Pa"),
        (0, 3, 1) => ("PRMSL", "Pa"),
        (0, 3, 5) => ("HGT", "m"),

        // Category 6: Cloud
        (0, 6, 1) => ("TCDC", "%"),

        // Category 7: Stability
        (0, 7, 6) => ("CAPE", "J kg-1"),
        (0, 7, 7) => ("CIN", "J kg-1"),

        // Category 14: Trace gases
        (0, 14, 192) => ("O3MR", "kg kg-1"),

        _ => return (format!("P{}_{}_{}", discipline, category, number), String::new()),
    };
    (name.to_string(), units.to_string())
}

/// Human readable level, e.g. "500 hPa"
fn level_description(level_type: u8, level_value: f64) -> String {
    match level_type {
        1 => "surface".to_string(),
        7 => "tropopause".to_string(),
        100 => format!("{} hPa", level_value / 100.0),
        101 => "mean sea level".to_string(),
        102 => format!("{} m above MSL", level_value),
        103 => format!("{} m above ground", level_value),
        200 => "entire atmosphere".to_string(),
        _ => format!("level type {} value {}", level_type, level_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_magnitude_i16() {
        assert_eq!(read_sign_magnitude_i16(&[0x80, 0x03]), -3);
        assert_eq!(read_sign_magnitude_i16(&[0x00, 0x03]), 3);
    }

    #[test]
    fn test_isobaric_level_description() {
        assert_eq!(level_description(100, 50000.0), "500 hPa");
        assert_eq!(level_description(1, 0.0), "surface");
    }

    #[test]
    fn test_parameter_lookup() {
        assert_eq!(
            parameter_name_and_units(0, 3, 5),
            ("HGT".to_string(), "m".to_string())
        );
        assert_eq!(parameter_name_and_units(0, 99, 1).0, "P0_99_1");
    }

    #[test]
    fn test_find_section_stops_at_trailer() {
        let mut msg = vec![0u8; 16];
        msg[..4].copy_from_slice(b"GRIB");
        msg.extend_from_slice(b"7777");
        assert!(matches!(
            find_section(&msg, 3),
            Err(Grib2Error::InvalidSection { section: 3, .. })
        ));
    }
}
