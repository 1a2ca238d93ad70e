//! The per-hour fetch, extract and render loop.
//!
//! Each stage sits behind a trait so the loop can be driven by fakes in
//! tests. Hours are processed strictly one after another and the first
//! error ends the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use gfs_common::{BoundingBox, ForecastHours, GeoField, ModelRun};
use grib2_parser::{extract_field, FieldSelector};
use renderer::MapRenderer;
use tracing::{info, instrument};

use crate::config::Config;
use crate::download::Fetcher;

/// Provides the local GRIB2 file for a forecast hour.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self, forecast_hour: u32) -> Result<PathBuf>;
}

/// Decodes a GRIB2 file into the field to plot. Runs on the blocking pool.
pub trait FieldSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<GeoField>;
}

/// Writes one frame image. Runs on the blocking pool.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, field: &GeoField, title: &str, out: &Path) -> Result<()>;
}

#[async_trait]
impl ForecastSource for Fetcher {
    async fn fetch(&self, forecast_hour: u32) -> Result<PathBuf> {
        Ok(Fetcher::fetch(self, forecast_hour).await?)
    }
}

/// Field extraction from GRIB2 files on disk.
#[derive(Debug, Clone)]
pub struct GribFieldSource {
    pub selector: FieldSelector,
    pub bbox: BoundingBox,
}

impl GribFieldSource {
    pub fn from_config(config: &Config) -> Self {
        Self {
            selector: config.field.selector(),
            bbox: config.region.bbox,
        }
    }
}

impl FieldSource for GribFieldSource {
    fn extract(&self, path: &Path) -> Result<GeoField> {
        extract_field(path, &self.selector, &self.bbox)
            .with_context(|| format!("Failed to extract {} from {}", self.selector, path.display()))
    }
}

/// PNG frames drawn by the map renderer.
pub struct MapFrameRenderer {
    pub renderer: MapRenderer,
    pub bbox: BoundingBox,
}

impl MapFrameRenderer {
    pub fn from_config(config: &Config) -> Result<Self> {
        let renderer =
            MapRenderer::new(config.map.clone()).context("Failed to set up map renderer")?;
        Ok(Self {
            renderer,
            bbox: config.region.bbox,
        })
    }
}

impl FrameRenderer for MapFrameRenderer {
    fn render(&self, field: &GeoField, title: &str, out: &Path) -> Result<()> {
        self.renderer
            .render_to_file(field, &self.bbox, title, out)
            .with_context(|| format!("Failed to render {}", out.display()))
    }
}

/// One rendered forecast hour.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub forecast_hour: u32,
    pub source: PathBuf,
    pub image: PathBuf,
}

pub struct SequenceDriver {
    config: Config,
    run: ModelRun,
    source: Arc<dyn ForecastSource>,
    fields: Arc<dyn FieldSource>,
    renderer: Arc<dyn FrameRenderer>,
}

impl SequenceDriver {
    pub fn new(
        config: Config,
        run: ModelRun,
        source: Arc<dyn ForecastSource>,
        fields: Arc<dyn FieldSource>,
        renderer: Arc<dyn FrameRenderer>,
    ) -> Self {
        Self {
            config,
            run,
            source,
            fields,
            renderer,
        }
    }

    /// Driver backed by the real downloader, GRIB2 decoder and map renderer.
    pub fn from_config(config: Config, run: ModelRun) -> Result<Self> {
        let fetcher = Fetcher::from_config(&config, run).context("Failed to create HTTP client")?;
        let fields = GribFieldSource::from_config(&config);
        let renderer = MapFrameRenderer::from_config(&config)?;
        Ok(Self::new(
            config,
            run,
            Arc::new(fetcher),
            Arc::new(fields),
            Arc::new(renderer),
        ))
    }

    /// Process every hour in `hours`, stopping at the first failure.
    pub async fn run(&self, hours: &ForecastHours) -> Result<Vec<Frame>> {
        let hours = hours.hours();
        info!(run = %self.run, count = hours.len(), "Starting forecast sequence");

        let mut frames = Vec::with_capacity(hours.len());
        for hour in hours {
            let image = self.config.output.frame_path(hour);
            frames.push(self.process(hour, image).await?);
        }

        info!(frames = frames.len(), "Forecast sequence complete");
        Ok(frames)
    }

    /// Fetch, extract and render a single hour into `image`.
    #[instrument(skip(self, image))]
    pub async fn process(&self, forecast_hour: u32, image: PathBuf) -> Result<Frame> {
        let source = self
            .source
            .fetch(forecast_hour)
            .await
            .with_context(|| format!("Failed to fetch forecast hour {}", forecast_hour))?;

        let fields = Arc::clone(&self.fields);
        let grib_path = source.clone();
        let field = tokio::task::spawn_blocking(move || fields.extract(&grib_path))
            .await
            .context("Extraction task panicked")??;

        if let Some(parent) = image.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let title = self.config.frame_title(&self.run, forecast_hour);
        let renderer = Arc::clone(&self.renderer);
        let out = image.clone();
        tokio::task::spawn_blocking(move || renderer.render(&field, &title, &out))
            .await
            .context("Render task panicked")??;

        info!(path = %image.display(), "Frame written");
        Ok(Frame {
            forecast_hour,
            source,
            image,
        })
    }
}
