//! TrueType text for titles, axis labels and contour values.
//!
//! DejaVu Sans is embedded; a configured font file replaces it.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_text_mut;
use rusttype::{point, Font, Scale};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::RenderError;

const EMBEDDED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Horizontal anchor for [`TextRenderer::draw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

/// Where the active font came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    Embedded,
    File(PathBuf),
}

pub struct TextRenderer {
    font: Font<'static>,
    source: FontSource,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer").field("source", &self.source).finish()
    }
}

impl TextRenderer {
    /// Load `configured` if given and usable, otherwise the embedded font.
    pub fn load(configured: Option<&Path>) -> Result<Self, RenderError> {
        if let Some(path) = configured {
            match Self::from_file(path) {
                Some(renderer) => {
                    debug!(font = %path.display(), "Loaded font");
                    return Ok(renderer);
                }
                None => {
                    warn!(font = %path.display(), "Configured font could not be loaded, using embedded font");
                }
            }
        }
        Self::embedded()
    }

    /// The built-in DejaVu Sans.
    pub fn embedded() -> Result<Self, RenderError> {
        let font = Font::try_from_bytes(EMBEDDED_FONT)
            .ok_or_else(|| RenderError::Font("embedded font failed to parse".to_string()))?;
        Ok(Self {
            font,
            source: FontSource::Embedded,
        })
    }

    fn from_file(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        let font = Font::try_from_vec(bytes)?;
        Some(Self {
            font,
            source: FontSource::File(path.to_path_buf()),
        })
    }

    pub fn source(&self) -> &FontSource {
        &self.source
    }

    /// Width and height in pixels of `text` at `size`.
    pub fn measure(&self, text: &str, size: f32) -> (u32, u32) {
        let scale = Scale::uniform(size);
        let v_metrics = self.font.v_metrics(scale);
        let height = (v_metrics.ascent - v_metrics.descent).ceil().max(0.0) as u32;

        let width = self
            .font
            .layout(text, scale, point(0.0, v_metrics.ascent))
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .fold(0.0f32, f32::max);

        (width.ceil() as u32, height)
    }

    /// Draw `text` with its top edge at `y`; `x` is interpreted per `anchor`.
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        text: &str,
        x: i32,
        y: i32,
        size: f32,
        color: [u8; 4],
        anchor: Anchor,
    ) {
        let (width, _) = self.measure(text, size);
        let x = match anchor {
            Anchor::Left => x,
            Anchor::Center => x - width as i32 / 2,
            Anchor::Right => x - width as i32,
        };
        draw_text_mut(
            img,
            Rgba(color),
            x,
            y,
            Scale::uniform(size),
            &self.font,
            text,
        );
    }

    /// Draw `text` centered on (`cx`, `cy`) over a white box.
    pub fn draw_boxed(&self, img: &mut RgbaImage, text: &str, cx: i32, cy: i32, size: f32, color: [u8; 4]) {
        let (w, h) = self.measure(text, size);
        let padding = 2;
        let x0 = cx - w as i32 / 2 - padding;
        let y0 = cy - h as i32 / 2 - padding;
        fill_rect(img, x0, y0, w as i32 + 2 * padding, h as i32 + 2 * padding, [255, 255, 255, 255]);
        self.draw(img, text, cx, cy - h as i32 / 2, size, color, Anchor::Center);
    }
}

fn fill_rect(img: &mut RgbaImage, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
    let (img_w, img_h) = (img.width() as i32, img.height() as i32);
    for py in y.max(0)..(y + h).min(img_h) {
        for px in x.max(0)..(x + w).min(img_w) {
            img.put_pixel(px as u32, py as u32, Rgba(color));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_configured_font_falls_back() {
        let text = TextRenderer::load(Some(Path::new("/nonexistent/font.ttf"))).unwrap();
        assert_eq!(text.source(), &FontSource::Embedded);
    }

    #[test]
    fn test_not_a_font_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.ttf");
        std::fs::write(&path, b"definitely not truetype").unwrap();
        let text = TextRenderer::load(Some(&path)).unwrap();
        assert_eq!(text.source(), &FontSource::Embedded);
    }

    #[test]
    fn test_configured_font_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.ttf");
        std::fs::write(&path, EMBEDDED_FONT).unwrap();
        let text = TextRenderer::load(Some(&path)).unwrap();
        assert_eq!(text.source(), &FontSource::File(path));
    }

    #[test]
    fn test_measure_grows_with_text() {
        let text = TextRenderer::load(None).unwrap();
        let (short, h) = text.measure("5400", 12.0);
        let (long, _) = text.measure("5400 m", 12.0);
        assert!(long > short);
        assert!(h > 0);
        // Units label is drawable, not only digits
        assert!(text.measure("m", 12.0).0 > 0);
    }

    #[test]
    fn test_draw_marks_pixels() {
        let text = TextRenderer::embedded().unwrap();
        let mut img = RgbaImage::from_pixel(80, 30, Rgba([255, 255, 255, 255]));
        text.draw(&mut img, "GFS m", 40, 5, 16.0, [0, 0, 0, 255], Anchor::Center);
        assert!(img.pixels().any(|p| p.0[0] < 128));
    }
}
