//! Map composition: color-filled field, isohypses, overlays, color bar and
//! labels on an equirectangular (plate carrée) canvas.

use crate::contour::{
    format_level, generate_all_contours, generate_contour_levels, place_labels, stroke_contours,
    Contour, ContourConfig, Point,
};
use crate::gradient::{render_grid, resample_grid, Colormap};
use crate::overlay::{
    default_overlays, format_latitude, format_longitude, graticule, OverlayLayer, OverlayStyle,
};
use crate::png::create_png_auto;
use crate::text::{Anchor, TextRenderer};
use crate::RenderError;
use gfs_common::{BoundingBox, GeoField};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tiny_skia::{
    IntSize, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};
use tracing::{debug, instrument, warn};

/// Largest canvas edge accepted, in pixels.
const MAX_DIMENSION: u32 = 16_384;

/// More levels than this means the interval is wrong for the field.
const MAX_CONTOUR_LEVELS: usize = 200;

const BLACK: [u8; 4] = [0, 0, 0, 255];

/// Rendering options, read from the `map` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyle {
    pub pixels_per_degree: f64,
    pub colormap: Colormap,
    /// Isohypse spacing in field units; `None` disables contours.
    pub contour_interval: Option<f32>,
    pub dpi: u32,
    pub font_path: Option<PathBuf>,
    pub overlays: Vec<OverlayStyle>,
    /// Graticule spacing in degrees.
    pub graticule_step: f64,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            pixels_per_degree: 24.0,
            colormap: Colormap::Viridis,
            contour_interval: Some(60.0),
            dpi: 150,
            font_path: None,
            overlays: default_overlays(),
            graticule_step: 10.0,
        }
    }
}

/// Pixel geometry of one rendered map.
#[derive(Debug, Clone, Copy)]
struct Layout {
    plot_w: u32,
    plot_h: u32,
    left: u32,
    top: u32,
    bar_x: u32,
    bar_w: u32,
    canvas_w: u32,
    canvas_h: u32,
    /// Scale relative to 100 DPI, applied to fonts and strokes
    scale: f32,
}

impl Layout {
    fn new(bbox: &BoundingBox, style: &MapStyle) -> Result<Self, RenderError> {
        let plot_w = (bbox.width() * style.pixels_per_degree).round();
        let plot_h = (bbox.height() * style.pixels_per_degree).round();
        if !(plot_w >= 1.0 && plot_h >= 1.0)
            || plot_w > MAX_DIMENSION as f64
            || plot_h > MAX_DIMENSION as f64
        {
            return Err(RenderError::InvalidDimensions(format!(
                "{}x{} plot area for {:?} at {} px/deg",
                plot_w, plot_h, bbox, style.pixels_per_degree
            )));
        }

        let scale = style.dpi as f32 / 100.0;
        let px = |v: f32| (v * scale).round() as u32;
        let (plot_w, plot_h) = (plot_w as u32, plot_h as u32);

        let left = px(60.0);
        let top = px(50.0);
        let bottom = px(40.0);
        let bar_gap = px(20.0);
        let bar_w = px(18.0);
        let bar_labels = px(70.0);
        let bar_x = left + plot_w + bar_gap;

        Ok(Self {
            plot_w,
            plot_h,
            left,
            top,
            bar_x,
            bar_w,
            canvas_w: bar_x + bar_w + bar_labels,
            canvas_h: top + plot_h + bottom,
            scale,
        })
    }
}

/// Renders one field on the configured map style.
#[derive(Debug)]
pub struct MapRenderer {
    style: MapStyle,
    overlays: Vec<OverlayLayer>,
    text: TextRenderer,
}

impl MapRenderer {
    /// Validate the style, load overlays and the font.
    pub fn new(style: MapStyle) -> Result<Self, RenderError> {
        if !(style.pixels_per_degree.is_finite() && style.pixels_per_degree > 0.0) {
            return Err(RenderError::InvalidDimensions(format!(
                "pixels_per_degree must be positive, got {}",
                style.pixels_per_degree
            )));
        }
        if style.dpi == 0 {
            return Err(RenderError::InvalidDimensions("dpi must be positive".to_string()));
        }

        let overlays = style
            .overlays
            .iter()
            .map(OverlayLayer::load)
            .collect::<Result<Vec<_>, _>>()?;
        let text = TextRenderer::load(style.font_path.as_deref())?;
        debug!(overlays = overlays.len(), font = ?text.source(), "Map renderer ready");

        Ok(Self {
            style,
            overlays,
            text,
        })
    }

    /// Render `field` over `bbox` and return PNG bytes.
    #[instrument(skip(self, field, bbox), fields(rows = field.height(), cols = field.width()))]
    pub fn render(
        &self,
        field: &GeoField,
        bbox: &BoundingBox,
        title: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let (pixels, width, height) = self.compose(field, bbox, title)?;
        let pad = (self.style.dpi as f32 * 0.1).round() as usize;
        let (pixels, width, height) = crop_to_content(&pixels, width, height, pad);

        let png = create_png_auto(&pixels, width, height, Some(self.style.dpi))?;
        debug!(width, height, bytes = png.len(), "Rendered map");
        Ok(png)
    }

    /// Render and write the PNG to `path`.
    pub fn render_to_file(
        &self,
        field: &GeoField,
        bbox: &BoundingBox,
        title: &str,
        path: &Path,
    ) -> Result<(), RenderError> {
        let png = self.render(field, bbox, title)?;
        std::fs::write(path, &png)?;
        debug!(path = %path.display(), bytes = png.len(), "Wrote map image");
        Ok(())
    }

    /// Draw everything onto an opaque RGBA canvas before cropping.
    fn compose(
        &self,
        field: &GeoField,
        bbox: &BoundingBox,
        title: &str,
    ) -> Result<(Vec<u8>, usize, usize), RenderError> {
        let (vmin, vmax) = field.value_range().ok_or(RenderError::EmptyField)?;
        let layout = Layout::new(bbox, &self.style)?;
        let ppd = self.style.pixels_per_degree;

        let mut plot = new_pixmap(layout.plot_w, layout.plot_h)?;
        plot.fill(tiny_skia::Color::WHITE);

        self.draw_field(&mut plot, field, bbox, vmin, vmax)?;

        let contour_config = self.contour_config(vmin, vmax, layout.scale);
        let contours = self.contours(field, bbox, &contour_config);
        stroke_contours(&mut plot, &contours, &contour_config);

        self.draw_overlays(&mut plot, bbox);
        let (meridians, parallels) = graticule(bbox, self.style.graticule_step);
        draw_graticule(&mut plot, bbox, ppd, &meridians, &parallels, layout.scale);

        let labels = place_labels(
            &contours,
            &contour_config,
            layout.plot_w as usize,
            layout.plot_h as usize,
        );

        let mut canvas = new_pixmap(layout.canvas_w, layout.canvas_h)?;
        canvas.fill(tiny_skia::Color::WHITE);
        canvas.draw_pixmap(
            layout.left as i32,
            layout.top as i32,
            plot.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        stroke_frame(
            &mut canvas,
            layout.left as f32,
            layout.top as f32,
            layout.plot_w as f32,
            layout.plot_h as f32,
            layout.scale,
        );

        let ticks = colorbar_ticks(vmin, vmax);
        self.draw_colorbar(&mut canvas, &layout, vmin, vmax, &ticks)?;

        let mut img = RgbaImage::from_raw(layout.canvas_w, layout.canvas_h, canvas.take())
            .ok_or_else(|| RenderError::InvalidDimensions("canvas size mismatch".to_string()))?;

        let text = &self.text;
        let s = layout.scale;
        let title_size = 16.0 * s;
        let label_size = 11.0 * s;
        let (_, title_h) = text.measure(title, title_size);
        text.draw(
            &mut img,
            title,
            (layout.left + layout.plot_w / 2) as i32,
            (layout.top as i32 - title_h as i32) / 2,
            title_size,
            BLACK,
            Anchor::Center,
        );

        for label in &labels {
            text.draw_boxed(
                &mut img,
                &label.text,
                layout.left as i32 + label.x.round() as i32,
                layout.top as i32 + label.y.round() as i32,
                9.0 * s,
                BLACK,
            );
        }

        let below = (layout.top + layout.plot_h) as i32 + (6.0 * s) as i32;
        for &lon in &meridians {
            let x = layout.left as f64 + (lon - bbox.min_lon) * ppd;
            text.draw(&mut img, &format_longitude(lon), x.round() as i32, below, label_size, BLACK, Anchor::Center);
        }
        let (_, label_h) = text.measure("0", label_size);
        for &lat in &parallels {
            let y = layout.top as f64 + (bbox.max_lat - lat) * ppd - label_h as f64 / 2.0;
            text.draw(
                &mut img,
                &format_latitude(lat),
                layout.left as i32 - (6.0 * s) as i32,
                y.round() as i32,
                label_size,
                BLACK,
                Anchor::Right,
            );
        }

        let tick_x = (layout.bar_x + layout.bar_w) as i32 + (6.0 * s) as i32;
        for &(value, y) in &ticks_to_pixels(&ticks, vmin, vmax, &layout) {
            text.draw(
                &mut img,
                &format_level(value),
                tick_x,
                y.round() as i32 - label_h as i32 / 2,
                label_size,
                BLACK,
                Anchor::Left,
            );
        }
        if !field.units.is_empty() {
            text.draw(
                &mut img,
                &field.units,
                (layout.bar_x + layout.bar_w / 2) as i32,
                layout.top as i32 - label_h as i32 - (6.0 * s) as i32,
                label_size,
                BLACK,
                Anchor::Center,
            );
        }

        Ok((
            img.into_raw(),
            layout.canvas_w as usize,
            layout.canvas_h as usize,
        ))
    }

    /// Bilinear color fill over the field's own extent inside the plot.
    fn draw_field(
        &self,
        plot: &mut Pixmap,
        field: &GeoField,
        bbox: &BoundingBox,
        vmin: f32,
        vmax: f32,
    ) -> Result<(), RenderError> {
        let (fw, fh) = (field.width(), field.height());
        if fw == 0 || fh == 0 {
            return Err(RenderError::EmptyField);
        }
        let ppd = self.style.pixels_per_degree;

        let (lon0, lon1) = (field.lons[0], field.lons[fw - 1]);
        let (lat0, lat1) = (field.lats[0], field.lats[fh - 1]);
        let x0 = ((lon0 - bbox.min_lon) * ppd).round().max(0.0) as u32;
        let y0 = ((bbox.max_lat - lat0) * ppd).round().max(0.0) as u32;
        if x0 >= plot.width() || y0 >= plot.height() {
            return Ok(());
        }
        let dst_w = (((lon1 - lon0) * ppd).round() as u32 + 1).min(plot.width() - x0);
        let dst_h = (((lat0 - lat1) * ppd).round() as u32 + 1).min(plot.height() - y0);

        let resampled = resample_grid(&field.values, fw, fh, dst_w as usize, dst_h as usize);
        let colormap = self.style.colormap;
        let pixels = render_grid(
            &resampled,
            dst_w as usize,
            dst_h as usize,
            vmin,
            vmax,
            |t| colormap.color(t),
        );

        let raster = pixmap_from_rgba(pixels, dst_w, dst_h)?;
        plot.draw_pixmap(
            x0 as i32,
            y0 as i32,
            raster.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Ok(())
    }

    fn contour_config(&self, vmin: f32, vmax: f32, scale: f32) -> ContourConfig {
        let mut levels = match self.style.contour_interval {
            Some(interval) if interval > 0.0 => generate_contour_levels(vmin, vmax, interval),
            _ => Vec::new(),
        };
        if levels.len() > MAX_CONTOUR_LEVELS {
            warn!(
                levels = levels.len(),
                interval = ?self.style.contour_interval,
                "Too many contour levels, skipping isohypses"
            );
            levels.clear();
        }

        ContourConfig {
            levels,
            line_width: 0.8 * scale,
            smoothing_passes: 2,
            label_font_size: 9.0 * scale,
            label_spacing: 220.0 * scale,
            ..ContourConfig::default()
        }
    }

    /// Contours traced on the field grid, returned in plot pixel coordinates.
    fn contours(&self, field: &GeoField, bbox: &BoundingBox, config: &ContourConfig) -> Vec<Contour> {
        let (fw, fh) = (field.width(), field.height());
        if config.levels.is_empty() || fw < 2 || fh < 2 {
            return Vec::new();
        }

        let ppd = self.style.pixels_per_degree;
        let dlon = (field.lons[fw - 1] - field.lons[0]) / (fw - 1) as f64;
        let dlat = (field.lats[0] - field.lats[fh - 1]) / (fh - 1) as f64;
        let origin_x = (field.lons[0] - bbox.min_lon) * ppd;
        let origin_y = (bbox.max_lat - field.lats[0]) * ppd;

        let mut contours = generate_all_contours(&field.values, fw, fh, config);
        for contour in &mut contours {
            contour.map_points(|p| {
                Point::new(
                    (origin_x + p.x as f64 * dlon * ppd) as f32,
                    (origin_y + p.y as f64 * dlat * ppd) as f32,
                )
            });
        }
        contours
    }

    fn draw_overlays(&self, plot: &mut Pixmap, bbox: &BoundingBox) {
        let ppd = self.style.pixels_per_degree;
        for layer in &self.overlays {
            let mut paint = Paint::default();
            paint.set_color_rgba8(layer.color.r, layer.color.g, layer.color.b, layer.color.a);
            paint.anti_alias = true;
            // Widths are in points, as in print
            let stroke = Stroke {
                width: (layer.width * self.style.dpi as f32 / 72.0).max(0.5),
                line_cap: LineCap::Round,
                ..Stroke::default()
            };

            let mut pb = PathBuilder::new();
            for line in layer.lines_near(bbox, 1.0) {
                let mut points = line.iter().map(|&(lon, lat)| {
                    (
                        ((lon - bbox.min_lon) * ppd) as f32,
                        ((bbox.max_lat - lat) * ppd) as f32,
                    )
                });
                if let Some((x, y)) = points.next() {
                    pb.move_to(x, y);
                    for (x, y) in points {
                        pb.line_to(x, y);
                    }
                }
            }
            if let Some(path) = pb.finish() {
                plot.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }

    fn draw_colorbar(
        &self,
        canvas: &mut Pixmap,
        layout: &Layout,
        vmin: f32,
        vmax: f32,
        ticks: &[f32],
    ) -> Result<(), RenderError> {
        let (bar_w, bar_h) = (layout.bar_w.max(1), layout.plot_h);
        let span = (bar_h.max(2) - 1) as f32;
        let mut values = Vec::with_capacity((bar_w * bar_h) as usize);
        for y in 0..bar_h {
            let v = vmax - (vmax - vmin) * y as f32 / span;
            values.extend(std::iter::repeat(v).take(bar_w as usize));
        }

        let colormap = self.style.colormap;
        let pixels = render_grid(&values, bar_w as usize, bar_h as usize, vmin, vmax, |t| {
            colormap.color(t)
        });
        let bar = pixmap_from_rgba(pixels, bar_w, bar_h)?;
        canvas.draw_pixmap(
            layout.bar_x as i32,
            layout.top as i32,
            bar.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        stroke_frame(
            canvas,
            layout.bar_x as f32,
            layout.top as f32,
            bar_w as f32,
            bar_h as f32,
            layout.scale,
        );

        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: layout.scale.max(1.0),
            ..Stroke::default()
        };
        let tick_len = 4.0 * layout.scale;
        let bar_right = (layout.bar_x + bar_w) as f32;

        for &(_, y) in &ticks_to_pixels(ticks, vmin, vmax, layout) {
            let mut pb = PathBuilder::new();
            pb.move_to(bar_right, y);
            pb.line_to(bar_right + tick_len, y);
            if let Some(path) = pb.finish() {
                canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
            }
        }

        Ok(())
    }
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap, RenderError> {
    Pixmap::new(width, height)
        .ok_or_else(|| RenderError::InvalidDimensions(format!("{}x{} canvas", width, height)))
}

/// Wrap straight-alpha RGBA in a pixmap. Pixels are either opaque or fully
/// transparent, which is already valid premultiplied data.
fn pixmap_from_rgba(pixels: Vec<u8>, width: u32, height: u32) -> Result<Pixmap, RenderError> {
    IntSize::from_wh(width, height)
        .and_then(|size| Pixmap::from_vec(pixels, size))
        .ok_or_else(|| RenderError::InvalidDimensions(format!("{}x{} raster", width, height)))
}

fn stroke_frame(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, scale: f32) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    let width = scale.max(1.0);
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    // Sit the frame just outside the area it encloses
    let half = width / 2.0;
    if let Some(rect) = Rect::from_xywh(x - half, y - half, w + width, h + width) {
        let path = PathBuilder::from_rect(rect);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

fn draw_graticule(
    plot: &mut Pixmap,
    bbox: &BoundingBox,
    ppd: f64,
    meridians: &[f64],
    parallels: &[f64],
    scale: f32,
) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(80, 80, 80, 160);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 0.6 * scale,
        dash: StrokeDash::new(vec![4.0 * scale, 3.0 * scale], 0.0),
        ..Stroke::default()
    };

    let (w, h) = (plot.width() as f32, plot.height() as f32);
    let mut pb = PathBuilder::new();
    for &lon in meridians {
        let x = ((lon - bbox.min_lon) * ppd) as f32;
        pb.move_to(x, 0.0);
        pb.line_to(x, h);
    }
    for &lat in parallels {
        let y = ((bbox.max_lat - lat) * ppd) as f32;
        pb.move_to(0.0, y);
        pb.line_to(w, y);
    }
    if let Some(path) = pb.finish() {
        plot.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

/// Round step (1, 2 or 5 times a power of ten) giving about five ticks.
fn nice_step(range: f32) -> f32 {
    let raw = range / 5.0;
    let magnitude = 10f32.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let nice = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn colorbar_ticks(vmin: f32, vmax: f32) -> Vec<f32> {
    if vmax - vmin <= f32::EPSILON * vmax.abs().max(1.0) {
        return vec![vmin];
    }
    generate_contour_levels(vmin, vmax, nice_step(vmax - vmin))
}

/// (value, canvas y) for each tick along the color bar.
fn ticks_to_pixels(ticks: &[f32], vmin: f32, vmax: f32, layout: &Layout) -> Vec<(f32, f32)> {
    let top = layout.top as f32;
    let span = (layout.plot_h.max(2) - 1) as f32;
    ticks
        .iter()
        .map(|&v| {
            let t = if vmax > vmin { (vmax - v) / (vmax - vmin) } else { 0.5 };
            (v, top + t * span)
        })
        .collect()
}

/// Crop an opaque RGBA image to its non-white content plus `pad` pixels.
pub fn crop_to_content(
    pixels: &[u8],
    width: usize,
    height: usize,
    pad: usize,
) -> (Vec<u8>, usize, usize) {
    let is_content = |x: usize, y: usize| {
        let i = (y * width + x) * 4;
        pixels[i..i + 3] != [255, 255, 255]
    };

    let mut bounds: Option<(usize, usize, usize, usize)> = None;
    for y in 0..height {
        for x in 0..width {
            if is_content(x, y) {
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }

    let Some((x0, y0, x1, y1)) = bounds else {
        return (pixels.to_vec(), width, height);
    };

    let x0 = x0.saturating_sub(pad);
    let y0 = y0.saturating_sub(pad);
    let x1 = (x1 + pad).min(width - 1);
    let y1 = (y1 + pad).min(height - 1);
    let (new_w, new_h) = (x1 - x0 + 1, y1 - y0 + 1);

    let mut out = Vec::with_capacity(new_w * new_h * 4);
    for y in y0..=y1 {
        let start = (y * width + x0) * 4;
        out.extend_from_slice(&pixels[start..start + new_w * 4]);
    }
    (out, new_w, new_h)
}
