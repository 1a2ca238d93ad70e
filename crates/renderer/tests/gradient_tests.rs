//! Tests for colormap and heatmap rendering.

use renderer::gradient::{interpolate_color, render_grid, resample_grid, Color, Colormap};

// ============================================================================
// resample_grid tests
// ============================================================================

#[test]
fn test_resample_identity() {
    let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
    assert_eq!(resample_grid(&data, 3, 2, 3, 2), data);
}

#[test]
fn test_resample_upscale_keeps_corners() {
    let data = vec![
        0.0, 10.0, // row 0
        20.0, 30.0, // row 1
    ];
    let out = resample_grid(&data, 2, 2, 5, 5);

    assert_eq!(out.len(), 25);
    assert!((out[0] - 0.0).abs() < 1e-4);
    assert!((out[4] - 10.0).abs() < 1e-4);
    assert!((out[20] - 20.0).abs() < 1e-4);
    assert!((out[24] - 30.0).abs() < 1e-4);
    // Center is the mean of the four corners
    assert!((out[12] - 15.0).abs() < 1e-4);
}

#[test]
fn test_resample_single_column_source() {
    let data = vec![1.0, 2.0, 3.0];
    let out = resample_grid(&data, 1, 3, 4, 3);
    assert_eq!(out.len(), 12);
    assert!(out[..4].iter().all(|v| (*v - 1.0).abs() < 1e-6));
}

#[test]
fn test_resample_propagates_nan() {
    let data = vec![f32::NAN, 1.0, 1.0, 1.0];
    let out = resample_grid(&data, 2, 2, 3, 3);
    assert!(out[0].is_nan());
    assert!(out[8].is_finite());
}

// ============================================================================
// render_grid tests
// ============================================================================

#[test]
fn test_render_grid_maps_range_to_colormap_ends() {
    let data = vec![5100.0, 5900.0];
    let pixels = render_grid(&data, 2, 1, 5100.0, 5900.0, |t| Colormap::Viridis.color(t));

    assert_eq!(pixels.len(), 8);
    assert_eq!(&pixels[0..4], &[68, 1, 84, 255]);
    assert_eq!(&pixels[4..8], &[253, 231, 37, 255]);
}

#[test]
fn test_render_grid_nan_is_transparent() {
    let data = vec![f32::NAN, 1.0];
    let pixels = render_grid(&data, 2, 1, 0.0, 1.0, |t| Colormap::Grayscale.color(t));
    assert_eq!(&pixels[0..4], &[0, 0, 0, 0]);
    assert_eq!(&pixels[4..8], &[255, 255, 255, 255]);
}

#[test]
fn test_render_grid_constant_field() {
    // Zero range must not divide by zero
    let data = vec![5520.0; 4];
    let pixels = render_grid(&data, 2, 2, 5520.0, 5520.0, |t| Colormap::Turbo.color(t));
    assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));
}

// ============================================================================
// color tests
// ============================================================================

#[test]
fn test_interpolate_color_midpoint() {
    let c = interpolate_color(Color::rgb(0, 0, 0), Color::rgb(200, 100, 50), 0.5);
    assert_eq!(c, Color::rgb(100, 50, 25));
}

#[test]
fn test_colormaps_are_monotonic_in_luminance() {
    // Viridis and grayscale brighten from low to high values
    for cmap in [Colormap::Viridis, Colormap::Grayscale] {
        let lum = |t: f32| {
            let c = cmap.color(t);
            0.299 * c.r as f32 + 0.587 * c.g as f32 + 0.114 * c.b as f32
        };
        let samples: Vec<f32> = (0..=10).map(|i| lum(i as f32 / 10.0)).collect();
        assert!(
            samples.windows(2).all(|w| w[1] >= w[0]),
            "{:?}: {:?}",
            cmap,
            samples
        );
    }
}

#[test]
fn test_colormap_from_yaml_name() {
    let cmap: Colormap = serde_json::from_str("\"turbo\"").unwrap();
    assert_eq!(cmap, Colormap::Turbo);
}
