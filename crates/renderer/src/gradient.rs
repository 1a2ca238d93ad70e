//! Gradient/heatmap rendering for gridded weather data.

use serde::{Deserialize, Serialize};

/// Resample grid data to a different resolution using bilinear interpolation.
///
/// NaN inputs propagate into every output pixel they touch.
///
/// # Arguments
/// - `data`: Input grid data (row-major order)
/// - `src_width`: Source grid width
/// - `src_height`: Source grid height
/// - `dst_width`: Destination grid width
/// - `dst_height`: Destination grid height
pub fn resample_grid(
    data: &[f32],
    src_width: usize,
    src_height: usize,
    dst_width: usize,
    dst_height: usize,
) -> Vec<f32> {
    if src_width == dst_width && src_height == dst_height {
        return data.to_vec();
    }
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return vec![f32::NAN; dst_width * dst_height];
    }

    let ratio = |src: usize, dst: usize| {
        if dst > 1 {
            (src - 1) as f32 / (dst - 1) as f32
        } else {
            0.0
        }
    };
    let x_ratio = ratio(src_width, dst_width);
    let y_ratio = ratio(src_height, dst_height);

    let mut output = vec![0.0f32; dst_width * dst_height];

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x1 = (src_x.floor() as usize).min(src_width - 1);
            let y1 = (src_y.floor() as usize).min(src_height - 1);
            let x2 = (x1 + 1).min(src_width - 1);
            let y2 = (y1 + 1).min(src_height - 1);

            let dx = src_x - x1 as f32;
            let dy = src_y - y1 as f32;

            let v11 = data.get(y1 * src_width + x1).copied().unwrap_or(f32::NAN);
            let v21 = data.get(y1 * src_width + x2).copied().unwrap_or(f32::NAN);
            let v12 = data.get(y2 * src_width + x1).copied().unwrap_or(f32::NAN);
            let v22 = data.get(y2 * src_width + x2).copied().unwrap_or(f32::NAN);

            let v1 = v11 * (1.0 - dx) + v21 * dx;
            let v2 = v12 * (1.0 - dx) + v22 * dx;
            output[y * dst_width + x] = v1 * (1.0 - dy) + v2 * dy;
        }
    }

    output
}

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse "#rrggbb" or "#rrggbbaa".
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

/// Linear color interpolation
pub fn interpolate_color(color1: Color, color2: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    let t_inv = 1.0 - t;
    let mix = |a: u8, b: u8| ((a as f32 * t_inv) + (b as f32 * t)).round() as u8;

    Color::new(
        mix(color1.r, color2.r),
        mix(color1.g, color2.g),
        mix(color1.b, color2.b),
        mix(color1.a, color2.a),
    )
}

/// Sequential colormaps for scalar fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    #[default]
    Viridis,
    Turbo,
    Grayscale,
}

// Evenly spaced samples of the reference colormaps.
const VIRIDIS: [Color; 9] = [
    Color::rgb(68, 1, 84),
    Color::rgb(71, 44, 122),
    Color::rgb(59, 81, 139),
    Color::rgb(44, 113, 142),
    Color::rgb(33, 144, 141),
    Color::rgb(39, 173, 129),
    Color::rgb(92, 200, 99),
    Color::rgb(170, 220, 50),
    Color::rgb(253, 231, 37),
];

const TURBO: [Color; 11] = [
    Color::rgb(48, 18, 59),
    Color::rgb(70, 98, 216),
    Color::rgb(54, 170, 249),
    Color::rgb(26, 228, 182),
    Color::rgb(114, 254, 94),
    Color::rgb(164, 252, 60),
    Color::rgb(225, 221, 55),
    Color::rgb(254, 165, 49),
    Color::rgb(243, 99, 21),
    Color::rgb(199, 41, 4),
    Color::rgb(122, 4, 3),
];

const GRAYSCALE: [Color; 2] = [Color::rgb(0, 0, 0), Color::rgb(255, 255, 255)];

impl Colormap {
    fn stops(&self) -> &'static [Color] {
        match self {
            Colormap::Viridis => &VIRIDIS,
            Colormap::Turbo => &TURBO,
            Colormap::Grayscale => &GRAYSCALE,
        }
    }

    /// Color for a normalized value in [0, 1]; out-of-range values clamp.
    pub fn color(&self, t: f32) -> Color {
        let stops = self.stops();
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let scaled = t * (stops.len() - 1) as f32;
        let idx = (scaled.floor() as usize).min(stops.len() - 2);
        interpolate_color(stops[idx], stops[idx + 1], scaled - idx as f32)
    }
}

impl std::str::FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "viridis" => Ok(Colormap::Viridis),
            "turbo" => Ok(Colormap::Turbo),
            "grayscale" | "greys" | "gray" => Ok(Colormap::Grayscale),
            other => Err(format!("Unknown colormap: {}", other)),
        }
    }
}

/// Render grid data as a gradient heatmap
///
/// # Arguments
/// - `data`: 2D grid of values (row-major order)
/// - `width`: Number of columns
/// - `height`: Number of rows
/// - `min_val`: Value mapped to 0.0
/// - `max_val`: Value mapped to 1.0
/// - `color_fn`: Function to convert a normalized value (0-1) to a color
///
/// # Returns
/// RGBA pixel data (4 bytes per pixel). Non-finite values stay transparent.
pub fn render_grid<F>(
    data: &[f32],
    width: usize,
    height: usize,
    min_val: f32,
    max_val: f32,
    color_fn: F,
) -> Vec<u8>
where
    F: Fn(f32) -> Color,
{
    let mut pixels = vec![0u8; width * height * 4];

    let range = max_val - min_val;
    let range = if range.abs() < 0.001 { 1.0 } else { range };

    for (idx, &value) in data.iter().take(width * height).enumerate() {
        if !value.is_finite() {
            continue;
        }
        let normalized = ((value - min_val) / range).clamp(0.0, 1.0);
        let color = color_fn(normalized);

        let pixel_idx = idx * 4;
        pixels[pixel_idx] = color.r;
        pixels[pixel_idx + 1] = color.g;
        pixels[pixel_idx + 2] = color.b;
        pixels[pixel_idx + 3] = color.a;
    }

    pixels
}
