//! Contour line (isoline) generation using the marching squares algorithm.
//!
//! Contours are traced in grid coordinates (x = column, y = row), mapped to
//! pixel space by the caller, then stroked onto a tiny-skia pixmap.

use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// A point in 2D space (grid or pixel coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A line segment between two points
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A complete contour line (polyline)
#[derive(Debug, Clone)]
pub struct Contour {
    pub level: f32,
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Contour {
    /// Apply `f` to every point, e.g. to go from grid to pixel coordinates.
    pub fn map_points<F: Fn(Point) -> Point>(&mut self, f: F) {
        for p in &mut self.points {
            *p = f(*p);
        }
    }

    /// Total polyline length.
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }
}

/// Configuration for contour rendering
#[derive(Debug, Clone)]
pub struct ContourConfig {
    /// Contour levels to draw
    pub levels: Vec<f32>,
    /// Line width in pixels
    pub line_width: f32,
    /// Line color [R, G, B, A]
    pub line_color: [u8; 4],
    /// Number of smoothing passes (0 = no smoothing)
    pub smoothing_passes: u32,
    /// Whether to draw labels on contour lines
    pub labels_enabled: bool,
    /// Font size for labels
    pub label_font_size: f32,
    /// Minimum spacing between labels (in pixels)
    pub label_spacing: f32,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            levels: vec![],
            line_width: 1.0,
            line_color: [0, 0, 0, 255],
            smoothing_passes: 1,
            labels_enabled: true,
            label_font_size: 10.0,
            label_spacing: 200.0,
        }
    }
}

/// Label text for a contour level: integer when whole, one decimal otherwise.
pub fn format_level(level: f32) -> String {
    if level.fract().abs() < 0.01 {
        format!("{:.0}", level)
    } else {
        format!("{:.1}", level)
    }
}

/// Generate contour levels automatically based on data range and interval
pub fn generate_contour_levels(min_value: f32, max_value: f32, interval: f32) -> Vec<f32> {
    if interval <= 0.0 || max_value <= min_value {
        return vec![];
    }

    // Count by index so long runs don't accumulate float error
    let first = (min_value / interval).ceil() as i64;
    let last = (max_value / interval).floor() as i64;
    (first..=last).map(|k| k as f32 * interval).collect()
}

/// Marching squares algorithm to generate contour lines
///
/// # Arguments
/// * `data` - Grid data in row-major order
/// * `width` - Grid width
/// * `height` - Grid height
/// * `level` - Contour level to extract
///
/// # Returns
/// Vector of line segments representing the contour
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();

    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            // Cell index (0-15) from which corners are at or above the level
            let mut cell_index = 0;
            if tl >= level {
                cell_index |= 1;
            }
            if tr >= level {
                cell_index |= 2;
            }
            if br >= level {
                cell_index |= 4;
            }
            if bl >= level {
                cell_index |= 8;
            }

            segments.extend(get_cell_segments(
                cell_index, x as f32, y as f32, tl, tr, br, bl, level,
            ));
        }
    }

    segments
}

/// Get line segments for a marching squares cell
///
/// Uses linear interpolation to find where the contour crosses cell edges
#[allow(clippy::too_many_arguments)]
fn get_cell_segments(
    cell_index: u8,
    x: f32,
    y: f32,
    tl: f32,
    tr: f32,
    br: f32,
    bl: f32,
    level: f32,
) -> Vec<Segment> {
    let top = interpolate_edge(x, y, x + 1.0, y, tl, tr, level);
    let right = interpolate_edge(x + 1.0, y, x + 1.0, y + 1.0, tr, br, level);
    let bottom = interpolate_edge(x, y + 1.0, x + 1.0, y + 1.0, bl, br, level);
    let left = interpolate_edge(x, y, x, y + 1.0, tl, bl, level);

    match cell_index {
        0 | 15 => vec![],
        1 | 14 => vec![Segment { start: left, end: top }],
        2 | 13 => vec![Segment { start: top, end: right }],
        3 | 12 => vec![Segment { start: left, end: right }],
        4 | 11 => vec![Segment { start: right, end: bottom }],
        // Saddles: resolve by the cell center value
        5 => {
            let center = (tl + tr + br + bl) / 4.0;
            if center >= level {
                vec![
                    Segment { start: left, end: bottom },
                    Segment { start: top, end: right },
                ]
            } else {
                vec![
                    Segment { start: left, end: top },
                    Segment { start: right, end: bottom },
                ]
            }
        }
        6 | 9 => vec![Segment { start: top, end: bottom }],
        7 | 8 => vec![Segment { start: left, end: bottom }],
        10 => {
            let center = (tl + tr + br + bl) / 4.0;
            if center >= level {
                vec![
                    Segment { start: left, end: top },
                    Segment { start: right, end: bottom },
                ]
            } else {
                vec![
                    Segment { start: top, end: right },
                    Segment { start: left, end: bottom },
                ]
            }
        }
        _ => vec![],
    }
}

/// Linearly interpolate between two edge points based on data values
fn interpolate_edge(
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    val1: f32,
    val2: f32,
    level: f32,
) -> Point {
    if (val2 - val1).abs() < 1e-6 {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }

    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);

    Point::new(x1 + t * (x2 - x1), y1 + t * (y2 - y1))
}

/// Connect line segments into continuous polylines
///
/// Chains grow from both ends, so a line is never split just because the
/// first segment picked happened to lie in its middle.
pub fn connect_segments(segments: Vec<Segment>) -> Vec<Contour> {
    use std::collections::VecDeque;

    if segments.is_empty() {
        return vec![];
    }

    let mut contours = Vec::new();
    let mut used = vec![false; segments.len()];
    let epsilon = 0.001;

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }

        let mut points: VecDeque<Point> =
            VecDeque::from(vec![segments[start_idx].start, segments[start_idx].end]);
        used[start_idx] = true;

        let mut changed = true;
        while changed {
            changed = false;
            let (head, tail) = match (points.front(), points.back()) {
                (Some(h), Some(t)) => (*h, *t),
                _ => break,
            };
            if points.len() > 2 && head.distance(&tail) < epsilon {
                break;
            }

            for (i, seg) in segments.iter().enumerate() {
                if used[i] {
                    continue;
                }

                if seg.start.distance(&tail) < epsilon {
                    points.push_back(seg.end);
                } else if seg.end.distance(&tail) < epsilon {
                    points.push_back(seg.start);
                } else if seg.end.distance(&head) < epsilon {
                    points.push_front(seg.start);
                } else if seg.start.distance(&head) < epsilon {
                    points.push_front(seg.end);
                } else {
                    continue;
                }
                used[i] = true;
                changed = true;
                break;
            }
        }

        let points: Vec<Point> = points.into_iter().collect();
        let closed = points.len() > 2 && points[0].distance(&points[points.len() - 1]) < epsilon;

        contours.push(Contour {
            level: 0.0, // Level will be set by caller
            points,
            closed,
        });
    }

    contours
}

/// Apply Chaikin's corner cutting algorithm for smoothing
pub fn smooth_contour(contour: &Contour, iterations: u32) -> Contour {
    if iterations == 0 || contour.points.len() < 3 {
        return contour.clone();
    }

    let mut points = contour.points.clone();
    if contour.closed {
        // Drop the duplicated closing point; wrap-around handles it
        points.pop();
    }

    for _ in 0..iterations {
        let mut new_points = Vec::with_capacity(points.len() * 2 + 2);
        let n = points.len();
        let pairs = if contour.closed { n } else { n - 1 };

        if !contour.closed {
            new_points.push(points[0]);
        }
        for i in 0..pairs {
            let p1 = points[i];
            let p2 = points[(i + 1) % n];

            new_points.push(Point::new(0.75 * p1.x + 0.25 * p2.x, 0.75 * p1.y + 0.25 * p2.y));
            new_points.push(Point::new(0.25 * p1.x + 0.75 * p2.x, 0.25 * p1.y + 0.75 * p2.y));
        }
        if !contour.closed {
            new_points.push(points[n - 1]);
        }

        points = new_points;
    }

    if contour.closed {
        if let Some(&first) = points.first() {
            points.push(first);
        }
    }

    Contour {
        level: contour.level,
        points,
        closed: contour.closed,
    }
}

/// Generate all contours for multiple levels, in grid coordinates
pub fn generate_all_contours(
    data: &[f32],
    width: usize,
    height: usize,
    config: &ContourConfig,
) -> Vec<Contour> {
    let mut all_contours = Vec::new();

    for &level in &config.levels {
        let segments = march_squares(data, width, height, level);
        let mut contours = connect_segments(segments);

        for contour in &mut contours {
            contour.level = level;
            if config.smoothing_passes > 0 {
                *contour = smooth_contour(contour, config.smoothing_passes);
            }
        }

        all_contours.extend(contours);
    }

    tracing::debug!(
        levels = config.levels.len(),
        contours = all_contours.len(),
        total_points = all_contours.iter().map(|c| c.points.len()).sum::<usize>(),
        "Generated contours"
    );

    all_contours
}

/// Stroke contours (already in pixel coordinates) onto `pixmap`.
pub fn stroke_contours(pixmap: &mut Pixmap, contours: &[Contour], config: &ContourConfig) {
    let mut paint = Paint::default();
    let [r, g, b, a] = config.line_color;
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;

    let stroke = Stroke {
        width: config.line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    for contour in contours {
        if contour.points.len() < 2 {
            continue;
        }

        let mut pb = PathBuilder::new();
        pb.move_to(contour.points[0].x, contour.points[0].y);
        for point in &contour.points[1..] {
            pb.line_to(point.x, point.y);
        }
        if contour.closed {
            pb.close();
        }

        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

/// Position and metadata for a contour label
#[derive(Debug, Clone)]
pub struct LabelPosition {
    pub x: f32,
    pub y: f32,
    /// Rotation angle in radians
    pub angle: f32,
    pub text: String,
    pub level: f32,
}

/// Choose label positions along contours in a `width` x `height` pixel area.
pub fn place_labels(
    contours: &[Contour],
    config: &ContourConfig,
    width: usize,
    height: usize,
) -> Vec<LabelPosition> {
    let mut positions = Vec::new();
    if config.labels_enabled {
        for contour in contours {
            collect_label_positions(contour, config, &mut positions, width, height);
        }
    }
    positions
}

/// Collect label positions along a contour line
fn collect_label_positions(
    contour: &Contour,
    config: &ContourConfig,
    positions: &mut Vec<LabelPosition>,
    width: usize,
    height: usize,
) {
    let total_length = contour.length();
    if total_length < config.label_spacing * 0.5 {
        return;
    }

    let label_text = format_level(contour.level);
    let margin = config.label_font_size * 2.0;

    let num_labels = ((total_length / config.label_spacing).floor() as usize).max(1);
    let spacing = total_length / (num_labels as f32 + 1.0);

    let mut accumulated_length = 0.0;
    let mut next_label_at = spacing;
    let mut label_count = 0;

    for pair in contour.points.windows(2) {
        if label_count >= num_labels {
            break;
        }

        let (p1, p2) = (pair[0], pair[1]);
        let dx = p2.x - p1.x;
        let dy = p2.y - p1.y;
        let segment_length = (dx * dx + dy * dy).sqrt();
        if segment_length <= f32::EPSILON {
            continue;
        }

        while accumulated_length + segment_length >= next_label_at && label_count < num_labels {
            let t = (next_label_at - accumulated_length) / segment_length;
            let x = p1.x + t * dx;
            let y = p1.y + t * dy;

            if x > margin
                && x < (width as f32 - margin)
                && y > margin
                && y < (height as f32 - margin)
            {
                let angle = dy.atan2(dx);
                // Keep text upright
                let angle = if angle.abs() > std::f32::consts::FRAC_PI_2 {
                    angle + std::f32::consts::PI
                } else {
                    angle
                };

                let min_distance = config.label_font_size * 4.0;
                let has_overlap = positions.iter().any(|pos| {
                    (pos.x - x).powi(2) + (pos.y - y).powi(2) < min_distance * min_distance
                });

                if !has_overlap {
                    positions.push(LabelPosition {
                        x,
                        y,
                        angle,
                        text: label_text.clone(),
                        level: contour.level,
                    });
                }
            }

            next_label_at += spacing;
            label_count += 1;
        }

        accumulated_length += segment_length;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_contour_levels() {
        let levels = generate_contour_levels(0.0, 20.0, 5.0);
        assert_eq!(levels, vec![0.0, 5.0, 10.0, 15.0, 20.0]);

        let levels = generate_contour_levels(2.0, 18.0, 5.0);
        assert_eq!(levels, vec![5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_height_levels() {
        let levels = generate_contour_levels(5130.0, 5890.0, 60.0);
        assert_eq!(levels.first(), Some(&5160.0));
        assert_eq!(levels.last(), Some(&5880.0));
        assert_eq!(levels.len(), 13);
    }

    #[test]
    fn test_interpolate_edge() {
        let p = interpolate_edge(0.0, 0.0, 1.0, 0.0, 0.0, 10.0, 5.0);
        assert!((p.x - 0.5).abs() < 0.01);
        assert!((p.y - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_march_squares_flat() {
        let data = vec![5.0; 9];
        assert!(march_squares(&data, 3, 3, 6.0).is_empty());
    }

    #[test]
    fn test_march_squares_peak_closes() {
        #[rustfmt::skip]
        let data = vec![
            0.0, 0.0, 0.0,
            0.0, 10.0, 0.0,
            0.0, 0.0, 0.0,
        ];
        let segments = march_squares(&data, 3, 3, 5.0);
        assert_eq!(segments.len(), 4);

        let contours = connect_segments(segments);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed);
    }

    #[test]
    fn test_connect_segments_from_middle() {
        // Picking the middle segment first must still give one line
        let segs = vec![
            Segment { start: Point::new(1.0, 0.0), end: Point::new(2.0, 0.0) },
            Segment { start: Point::new(0.0, 0.0), end: Point::new(1.0, 0.0) },
            Segment { start: Point::new(2.0, 0.0), end: Point::new(3.0, 0.0) },
        ];
        let contours = connect_segments(segs);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].points.len(), 4);
        assert!(!contours[0].closed);
    }

    #[test]
    fn test_smooth_open_keeps_endpoints() {
        let contour = Contour {
            level: 1.0,
            points: vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0), Point::new(8.0, 0.0)],
            closed: false,
        };
        let smoothed = smooth_contour(&contour, 2);
        assert_eq!(smoothed.points.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(smoothed.points.last(), Some(&Point::new(8.0, 0.0)));
        assert!(smoothed.points.len() > contour.points.len());
    }

    #[test]
    fn test_format_level() {
        assert_eq!(format_level(5640.0), "5640");
        assert_eq!(format_level(2.5), "2.5");
    }
}
