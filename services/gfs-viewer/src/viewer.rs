//! Static HTML slider page for browsing the rendered frames.

use std::path::Path;

use anyhow::{Context, Result};
use gfs_common::ForecastHours;
use tracing::info;

use crate::config::{Config, OutputConfig};

/// Self-contained page referencing the frames by relative path.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPage {
    pub title: String,
    pub heading: String,
    pub hours: ForecastHours,
    /// Directory of the frames, relative to the page.
    pub images_dir: String,
    pub image_width: u32,
}

impl ViewerPage {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.output.page_title.clone(),
            heading: config.output.heading.clone(),
            hours: config.schedule.forecast_hours,
            images_dir: config.output.images_dir.trim_end_matches('/').to_string(),
            image_width: 600,
        }
    }

    /// Slider maximum: the last hour the stride actually reaches.
    fn max_hour(&self) -> u32 {
        self.hours.last().unwrap_or(self.hours.start)
    }

    pub fn render(&self) -> String {
        let start = self.hours.start;
        let first_frame = format!("{}/{}", self.images_dir, OutputConfig::frame_name(start));

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    <h2>{heading}</h2>
    <input type="range" min="{min}" max="{max}" step="{step}" id="slider" value="{min}">
    <span id="fhr_label">{min}h</span>
    <br>
    <img id="gfs_img" src="{first_frame}" width="{width}">

    <script>
    const slider = document.getElementById("slider");
    const img = document.getElementById("gfs_img");
    const label = document.getElementById("fhr_label");

    slider.addEventListener("input", function() {{
        let val = String(slider.value).padStart(3,'0');
        img.src = `{images_dir}/gfs_${{val}}.png`;
        label.textContent = slider.value + "h";
    }});
    </script>
</body>
</html>
"#,
            title = escape_html(&self.title),
            heading = escape_html(&self.heading),
            min = start,
            max = self.max_hour(),
            step = self.hours.step,
            first_frame = escape_html(&first_frame),
            width = self.image_width,
            images_dir = escape_html(&self.images_dir),
        )
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write viewer page {}", path.display()))?;
        info!(path = %path.display(), "Viewer page written");
        Ok(())
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page() {
        let html = ViewerPage::from_config(&Config::default()).render();
        assert!(html.contains(r#"<input type="range" min="0" max="240" step="3" id="slider" value="0">"#));
        assert!(html.contains(r#"<span id="fhr_label">0h</span>"#));
        assert!(html.contains(r#"<img id="gfs_img" src="images/gfs_000.png" width="600">"#));
        assert!(html.contains("<title>GFS Japan Forecast</title>"));
        assert!(html.contains("<h2>GFS Forecast Japan 500hPa Z</h2>"));
        assert!(html.contains("padStart(3,'0')"));
        assert!(html.contains("img.src = `images/gfs_${val}.png`;"));
    }

    #[test]
    fn test_max_snaps_to_stride() {
        let mut config = Config::default();
        config.schedule.forecast_hours = ForecastHours::new(6, 40, 6);
        let html = ViewerPage::from_config(&config).render();
        assert!(html.contains(r#"min="6" max="36" step="6""#));
        assert!(html.contains("images/gfs_006.png"));
    }

    #[test]
    fn test_title_is_escaped() {
        let mut config = Config::default();
        config.output.page_title = "Z <500>".to_string();
        let html = ViewerPage::from_config(&config).render();
        assert!(html.contains("<title>Z &lt;500&gt;</title>"));
    }
}
