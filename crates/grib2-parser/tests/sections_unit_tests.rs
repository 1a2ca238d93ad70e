//! Unit tests for GRIB2 section parsing functions.
//!
//! These tests don't require test data files and focus on individual functions.

use grib2_parser::sections::{
    decode_grib2_signed, parse_bitmap, parse_grid_definition, parse_product_definition,
};
use grib2_parser::testdata::Grib2Builder;
use grib2_parser::Grib2Error;

// ============================================================================
// decode_grib2_signed tests
// ============================================================================

#[test]
fn test_decode_grib2_signed_positive() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x00]), 0);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x03, 0xE8]), 1000);
    assert_eq!(decode_grib2_signed(&90_000_000_u32.to_be_bytes()), 90_000_000);
}

#[test]
fn test_decode_grib2_signed_negative() {
    // Sign-magnitude: MSB=1 means negative, -1 is 0x80000001
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x01]), -1);

    let south_pole = (90_000_000_u32 | 0x8000_0000).to_be_bytes();
    assert_eq!(decode_grib2_signed(&south_pole), -90_000_000);
}

#[test]
fn test_sign_magnitude_vs_twos_complement() {
    // Two's complement -1 reads as -(2^31 - 1) in sign-magnitude
    assert_eq!(decode_grib2_signed(&[0xFF, 0xFF, 0xFF, 0xFF]), -2147483647);
    // Negative zero
    assert_eq!(decode_grib2_signed(&[0x80, 0x00, 0x00, 0x00]), 0);
}

#[test]
fn test_decode_grib2_signed_wrong_length() {
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x01]), 0);
    assert_eq!(decode_grib2_signed(&[]), 0);
    assert_eq!(decode_grib2_signed(&[0x00, 0x00, 0x00, 0x01, 0x00]), 0);
}

// ============================================================================
// Section parsing on synthetic messages
// ============================================================================

#[test]
fn test_gfs_style_grid_definition() {
    let msg = Grib2Builder::new()
        .with_grid(1440, 721)
        .with_origin(90.0, 0.0, 0.25, 0.25)
        .with_constant_value(5500.0)
        .build();

    let gd = parse_grid_definition(&msg).unwrap();
    assert_eq!(gd.template_number, 0);
    assert_eq!(gd.num_points_longitude, 1440);
    assert_eq!(gd.num_points_latitude, 721);
    assert!((gd.first_latitude - 90.0).abs() < 1e-9);
    assert!((gd.last_latitude + 90.0).abs() < 1e-9);
    assert!((gd.last_longitude - 359.75).abs() < 1e-9);
    assert!((gd.longitude_increment - 0.25).abs() < 1e-9);

    let spec = gd.grid_spec().unwrap();
    assert_eq!(spec.dy, -0.25);
    assert_eq!(spec.len(), 1440 * 721);
}

#[test]
fn test_isobaric_product_definition() {
    let msg = Grib2Builder::new()
        .with_level(100, 50_000)
        .with_forecast_hour(120)
        .build();

    let pd = parse_product_definition(&msg, 0).unwrap();
    assert_eq!(pd.parameter_short_name, "HGT");
    assert_eq!(pd.parameter_units, "m");
    assert_eq!(pd.level_type, 100);
    assert_eq!(pd.level_value, 50_000.0);
    assert_eq!(pd.level_description, "500 hPa");
    assert_eq!(pd.forecast_hour, 120);
}

#[test]
fn test_forecast_time_units() {
    let twelve_hourly = Grib2Builder::new().with_time_unit(12).with_forecast_hour(2).build();
    assert_eq!(parse_product_definition(&twelve_hourly, 0).unwrap().forecast_hour, 24);

    let minutes = Grib2Builder::new().with_time_unit(0).with_forecast_hour(90).build();
    assert_eq!(parse_product_definition(&minutes, 0).unwrap().forecast_hour, 1);
}

#[test]
fn test_forecast_time_overflow_is_rejected() {
    let msg = Grib2Builder::new()
        .with_time_unit(12)
        .with_forecast_hour(u32::MAX)
        .build();

    match parse_product_definition(&msg, 0) {
        Err(Grib2Error::InvalidSection { section, .. }) => assert_eq!(section, 4),
        other => panic!("expected InvalidSection, got {:?}", other),
    }
}

#[test]
fn test_bitmap_presence() {
    let plain = Grib2Builder::new().with_grid(2, 2).build();
    assert!(parse_bitmap(&plain).unwrap().is_none());

    let masked = Grib2Builder::new()
        .with_grid(2, 2)
        .with_data(vec![1.0, 2.0, 3.0, 4.0])
        .with_bitmap(vec![true, false, true, true])
        .build();
    let bitmap = parse_bitmap(&masked).unwrap().expect("bitmap");
    assert_eq!(bitmap.indicator, 0);
    assert_eq!(bitmap.data.as_ref(), &[0b1011_0000]);
}
