//! Round-trip validation of the reader against synthetic GRIB2 files.

use bytes::Bytes;
use chrono::{Datelike, Timelike};
use grib2_parser::testdata::Grib2Builder;
use grib2_parser::Grib2Reader;

#[test]
fn test_roundtrip_synthetic_heights() {
    let input_values: Vec<f32> = (0..100).map(|i| 5200.0 + i as f32 * 6.5).collect();

    let grib_bytes = Grib2Builder::new()
        .with_grid(10, 10)
        .with_reference_time(2025, 6, 15, 12)
        .with_forecast_hour(6)
        .with_data(input_values.clone())
        .build();

    let mut reader = Grib2Reader::from_bytes(Bytes::from(grib_bytes));
    let msg = reader
        .next_message()
        .expect("Should parse without error")
        .expect("Should have a message");

    assert_eq!(msg.indicator.discipline, 0);
    assert_eq!(msg.identification.center, 7);
    assert_eq!(msg.identification.reference_time.year(), 2025);
    assert_eq!(msg.identification.reference_time.month(), 6);
    assert_eq!(msg.identification.reference_time.hour(), 12);
    assert_eq!(msg.grid_dims(), (10, 10));
    assert_eq!(msg.parameter(), "HGT");
    assert_eq!(msg.level(), "500 hPa");
    assert_eq!(msg.data_representation.bits_per_value, 16);

    let output_values = msg.unpack_data().expect("Should unpack");
    assert_eq!(output_values.len(), input_values.len());
    for (i, (input, output)) in input_values.iter().zip(&output_values).enumerate() {
        assert!(
            (input - output).abs() < 0.05,
            "Value {} differs too much: input={}, output={}",
            i,
            input,
            output
        );
    }
}

#[test]
fn test_constant_value_encoding() {
    let constant = 5640.0;
    let grib_bytes = Grib2Builder::new()
        .with_grid(10, 10)
        .with_constant_value(constant)
        .build();

    let msg = Grib2Reader::from_bytes(Bytes::from(grib_bytes))
        .next_message()
        .unwrap()
        .unwrap();

    assert_eq!(msg.data_representation.bits_per_value, 0);
    assert!(msg
        .unpack_data()
        .unwrap()
        .iter()
        .all(|v| (v - constant).abs() < 0.01));
}

#[test]
fn test_bitmap_masked_points_are_nan() {
    let grib_bytes = Grib2Builder::new()
        .with_grid(3, 2)
        .with_data(vec![5000.0, 5100.0, 5200.0, 5300.0, 5400.0, 5500.0])
        .with_bitmap(vec![true, false, true, true, false, true])
        .build();

    let msg = Grib2Reader::from_bytes(Bytes::from(grib_bytes))
        .next_message()
        .unwrap()
        .unwrap();
    assert_eq!(msg.data_representation.num_data_points, 4);

    let values = msg.unpack_data().unwrap();
    assert!(values[1].is_nan());
    assert!(values[4].is_nan());
    assert!((values[2] - 5200.0).abs() < 0.05);
    assert!((values[5] - 5500.0).abs() < 0.05);
}

#[test]
fn test_grib_crate_can_parse_synthetic() {
    use std::io::Cursor;

    let grib_bytes = Grib2Builder::new().with_grid(10, 10).build();

    let grib_file = grib::from_reader(Cursor::new(&grib_bytes))
        .expect("External grib crate should be able to parse our synthetic file");
    assert_eq!(grib_file.iter().count(), 1);

    for (_idx, submsg) in grib_file.iter() {
        assert_eq!(submsg.indicator().total_length as usize, grib_bytes.len());
    }
}
