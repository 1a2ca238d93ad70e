//! Tests for contour line (isohypse) generation.

use renderer::contour::{
    connect_segments, generate_all_contours, generate_contour_levels, march_squares,
    place_labels, smooth_contour, stroke_contours, Contour, ContourConfig, Point,
};
use tiny_skia::Pixmap;

// ============================================================================
// Helper functions
// ============================================================================

/// Geopotential-height-like field: a low centered in the grid.
fn height_low(width: usize, height: usize) -> Vec<f32> {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            data.push(5300.0 + r * 20.0);
        }
    }
    data
}

// ============================================================================
// generate_contour_levels tests
// ============================================================================

#[test]
fn test_generate_contour_levels_basic() {
    let levels = generate_contour_levels(0.0, 100.0, 10.0);
    assert_eq!(
        levels,
        vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    );
}

#[test]
fn test_generate_contour_levels_negative_range() {
    let levels = generate_contour_levels(-20.0, 20.0, 10.0);
    assert_eq!(levels, vec![-20.0, -10.0, 0.0, 10.0, 20.0]);
}

#[test]
fn test_generate_contour_levels_invalid_interval() {
    assert!(generate_contour_levels(0.0, 100.0, 0.0).is_empty());
    assert!(generate_contour_levels(0.0, 100.0, -10.0).is_empty());
    assert!(generate_contour_levels(100.0, 0.0, 10.0).is_empty());
}

#[test]
fn test_generate_contour_levels_500hpa_range() {
    let levels = generate_contour_levels(5100.0, 5900.0, 60.0);
    assert_eq!(levels.first(), Some(&5100.0));
    assert_eq!(levels.last(), Some(&5880.0));
    assert!(levels.windows(2).all(|w| (w[1] - w[0] - 60.0).abs() < 1e-3));
}

// ============================================================================
// march_squares tests
// ============================================================================

#[test]
fn test_march_squares_empty_cases() {
    assert!(march_squares(&[1.0], 1, 1, 0.5).is_empty());
    assert!(march_squares(&[], 0, 0, 0.5).is_empty());
    assert!(march_squares(&[1.0, 2.0], 3, 3, 0.5).is_empty());
}

#[test]
fn test_march_squares_horizontal_gradient() {
    let data = vec![
        0.0, 10.0, // row 0
        0.0, 10.0, // row 1
    ];
    let segments = march_squares(&data, 2, 2, 5.0);

    assert_eq!(segments.len(), 1);
    let seg = &segments[0];
    assert!((seg.start.x - seg.end.x).abs() < 0.01);
    assert!((seg.start.x - 0.5).abs() < 0.01);
}

#[test]
fn test_march_squares_saddle() {
    let data = vec![
        10.0, 0.0, // row 0
        0.0, 10.0, // row 1
    ];
    assert_eq!(march_squares(&data, 2, 2, 5.0).len(), 2);
}

#[test]
fn test_march_squares_nan_cells_skipped() {
    let data = vec![
        f32::NAN, 10.0, 10.0, // row 0
        0.0, 10.0, 10.0, // row 1
        0.0, 0.0, 0.0, // row 2
    ];
    let segments = march_squares(&data, 3, 3, 5.0);

    // The top-left cell touches NaN and contributes nothing
    assert!(segments
        .iter()
        .all(|s| !(s.start.x < 1.0 && s.start.y < 1.0 && s.end.x < 1.0 && s.end.y < 1.0)));
    assert!(!segments.is_empty());
}

// ============================================================================
// connect_segments / smoothing tests
// ============================================================================

#[test]
fn test_connect_segments_empty() {
    assert!(connect_segments(vec![]).is_empty());
}

#[test]
fn test_low_produces_closed_rings() {
    let data = height_low(21, 21);
    let config = ContourConfig {
        levels: vec![5400.0],
        smoothing_passes: 0,
        ..ContourConfig::default()
    };

    let contours = generate_all_contours(&data, 21, 21, &config);
    assert_eq!(contours.len(), 1);
    assert!(contours[0].closed);
    assert_eq!(contours[0].level, 5400.0);

    // Radius 5 ring around the center
    for p in &contours[0].points {
        let r = ((p.x - 10.5).powi(2) + (p.y - 10.5).powi(2)).sqrt();
        assert!((r - 5.0).abs() < 0.6, "point {:?} at radius {}", p, r);
    }
}

#[test]
fn test_smooth_closed_stays_closed() {
    let square = Contour {
        level: 0.0,
        points: vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 4.0),
            Point::new(0.0, 0.0),
        ],
        closed: true,
    };

    let smoothed = smooth_contour(&square, 1);
    assert!(smoothed.closed);
    assert_eq!(smoothed.points.first(), smoothed.points.last());
    // 4 corners cut into 8 points plus the closing point
    assert_eq!(smoothed.points.len(), 9);
}

// ============================================================================
// drawing tests
// ============================================================================

#[test]
fn test_stroke_contours_marks_pixels() {
    let mut pixmap = Pixmap::new(40, 40).unwrap();
    pixmap.fill(tiny_skia::Color::WHITE);

    let line = Contour {
        level: 5400.0,
        points: vec![Point::new(5.0, 20.0), Point::new(35.0, 20.0)],
        closed: false,
    };
    let config = ContourConfig {
        line_width: 2.0,
        ..ContourConfig::default()
    };
    stroke_contours(&mut pixmap, &[line], &config);

    let idx = (20 * 40 + 20) * 4;
    assert!(pixmap.data()[idx] < 128, "line pixel should be dark");
    assert_eq!(pixmap.data()[0], 255, "corner stays white");
}

#[test]
fn test_place_labels_respects_margins_and_spacing() {
    let line = Contour {
        level: 5640.0,
        points: (0..=100).map(|i| Point::new(i as f32 * 10.0, 500.0)).collect(),
        closed: false,
    };
    let config = ContourConfig {
        label_spacing: 200.0,
        label_font_size: 10.0,
        ..ContourConfig::default()
    };

    let labels = place_labels(&[line], &config, 1000, 1000);
    assert!(!labels.is_empty());
    for label in &labels {
        assert_eq!(label.text, "5640");
        assert!(label.x > 20.0 && label.x < 980.0);
        assert!(label.angle.abs() < 1e-6);
    }
    for pair in labels.windows(2) {
        assert!((pair[1].x - pair[0].x).abs() >= 40.0);
    }
}

#[test]
fn test_labels_disabled() {
    let line = Contour {
        level: 1.0,
        points: vec![Point::new(0.0, 50.0), Point::new(1000.0, 50.0)],
        closed: false,
    };
    let config = ContourConfig {
        labels_enabled: false,
        ..ContourConfig::default()
    };
    assert!(place_labels(&[line], &config, 1000, 100).is_empty());
}
