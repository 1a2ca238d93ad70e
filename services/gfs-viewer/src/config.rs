//! Configuration for the viewer pipeline.
//!
//! Loaded from a single YAML file. Every section has defaults, so a partial
//! file only overrides what it names and no file at all reproduces the
//! GFS 500 hPa Japan setup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use gfs_common::{BoundingBox, ForecastHours, ModelRun};
use grib2_parser::FieldSelector;
use renderer::MapStyle;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelInfo,
    pub source: SourceConfig,
    pub schedule: ScheduleConfig,
    pub region: RegionConfig,
    pub field: FieldConfig,
    pub output: OutputConfig,
    pub map: MapStyle,
}

/// Basic model identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            id: "gfs".to_string(),
            name: "GFS - Global Forecast System".to_string(),
        }
    }
}

/// Public GFS distribution points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mirror {
    #[default]
    Nomads,
    Aws,
}

impl Mirror {
    pub fn base_url(&self) -> &'static str {
        match self {
            Mirror::Nomads => "https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod",
            Mirror::Aws => "https://noaa-gfs-bdp-pds.s3.amazonaws.com",
        }
    }
}

/// Where files come from and how they are cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub mirror: Mirror,
    /// Overrides the mirror's base URL when set.
    pub base_url: Option<String>,
    /// Remote path below the base URL.
    pub file_pattern: String,
    /// Local file name under the images directory.
    pub cache_pattern: String,
    /// Responses shorter than this are rejected.
    pub min_payload_bytes: u64,
    /// No timeout unless set.
    pub request_timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mirror: Mirror::Nomads,
            base_url: None,
            file_pattern: "gfs.{date}/{cycle}/atmos/gfs.t{cycle}z.pgrb2.0p25.f{forecast:03}"
                .to_string(),
            cache_pattern: "gfs.{date}.t{cycle}z.f{forecast:03}.grib2".to_string(),
            min_payload_bytes: 1000,
            request_timeout_secs: None,
        }
    }
}

impl SourceConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.mirror.base_url())
            .trim_end_matches('/')
    }

    /// Remote URL for one forecast hour of `run`.
    pub fn url_for(&self, run: &ModelRun, forecast_hour: u32) -> String {
        format!(
            "{}/{}",
            self.base_url(),
            expand_pattern(&self.file_pattern, run, forecast_hour)
        )
    }

    /// Cache file name for one forecast hour of `run`.
    pub fn cache_name(&self, run: &ModelRun, forecast_hour: u32) -> String {
        expand_pattern(&self.cache_pattern, run, forecast_hour)
    }
}

/// Substitute `{date}`, `{cycle}`, `{cycle:02}`, `{forecast}`,
/// `{forecast:02}` and `{forecast:03}`.
pub fn expand_pattern(pattern: &str, run: &ModelRun, forecast_hour: u32) -> String {
    pattern
        .replace("{date}", &run.date_str())
        .replace("{cycle:02}", &run.cycle_str())
        .replace("{cycle}", &run.cycle_str())
        .replace("{forecast:03}", &format!("{:03}", forecast_hour))
        .replace("{forecast:02}", &format!("{:02}", forecast_hour))
        .replace("{forecast}", &forecast_hour.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub forecast_hours: ForecastHours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub name: String,
    pub bbox: BoundingBox,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "Japan".to_string(),
            bbox: BoundingBox::japan(),
        }
    }
}

/// Which field to extract, and how to name it in titles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub parameter: String,
    pub type_of_level: String,
    pub level: f64,
    pub units: String,
    /// Short label used in image titles, e.g. "500hPa Z".
    pub label: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            parameter: "HGT".to_string(),
            type_of_level: "isobaricInhPa".to_string(),
            level: 500.0,
            units: "m".to_string(),
            label: "500hPa Z".to_string(),
        }
    }
}

impl FieldConfig {
    pub fn selector(&self) -> FieldSelector {
        FieldSelector::new(&self.parameter, &self.type_of_level, self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub images_dir: String,
    pub html_file: String,
    pub page_title: String,
    pub heading: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            images_dir: "images".to_string(),
            html_file: "gfs_japan.html".to_string(),
            page_title: "GFS Japan Forecast".to_string(),
            heading: "GFS Forecast Japan 500hPa Z".to_string(),
        }
    }
}

impl OutputConfig {
    /// Directory holding both cached GRIB2 files and rendered frames.
    pub fn images_path(&self) -> PathBuf {
        self.dir.join(&self.images_dir)
    }

    pub fn html_path(&self) -> PathBuf {
        self.dir.join(&self.html_file)
    }

    /// File name of the frame for one forecast hour.
    pub fn frame_name(forecast_hour: u32) -> String {
        format!("gfs_{:03}.png", forecast_hour)
    }

    pub fn frame_path(&self, forecast_hour: u32) -> PathBuf {
        self.images_path().join(Self::frame_name(forecast_hour))
    }

    pub fn latest_path(&self) -> PathBuf {
        self.images_path().join("gfs_latest.png")
    }
}

impl Config {
    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(model = %config.model.id, path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let hours = &self.schedule.forecast_hours;
        if hours.step == 0 {
            bail!("schedule.forecast_hours.step must be positive");
        }
        if hours.end < hours.start {
            bail!(
                "schedule.forecast_hours.end ({}) is before start ({})",
                hours.end,
                hours.start
            );
        }

        self.region
            .bbox
            .validate()
            .with_context(|| format!("Invalid bbox for region {}", self.region.name))?;

        if !(self.map.pixels_per_degree.is_finite() && self.map.pixels_per_degree > 0.0) {
            bail!(
                "map.pixels_per_degree must be positive, got {}",
                self.map.pixels_per_degree
            );
        }

        self.field
            .selector()
            .fixed_surface()
            .context("Invalid field selector")?;

        if self.source.cache_pattern.is_empty() || self.source.file_pattern.is_empty() {
            bail!("source.file_pattern and source.cache_pattern must not be empty");
        }

        Ok(())
    }

    /// Image title for one forecast hour, e.g. `GFS 500hPa Z (+24h) 20240115 00UTC`.
    pub fn frame_title(&self, run: &ModelRun, forecast_hour: u32) -> String {
        format!(
            "GFS {} (+{}h) {} {}UTC",
            self.field.label,
            forecast_hour,
            run.date_str(),
            run.cycle_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gfs_common::ModelCycle;

    fn run() -> ModelRun {
        ModelRun::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(), ModelCycle::Z06)
    }

    #[test]
    fn test_default_url() {
        let config = Config::default();
        assert_eq!(
            config.source.url_for(&run(), 24),
            "https://nomads.ncep.noaa.gov/pub/data/nccf/com/gfs/prod/gfs.20240115/06/atmos/gfs.t06z.pgrb2.0p25.f024"
        );
    }

    #[test]
    fn test_aws_mirror_and_override() {
        let mut source = SourceConfig {
            mirror: Mirror::Aws,
            ..SourceConfig::default()
        };
        assert!(source
            .url_for(&run(), 0)
            .starts_with("https://noaa-gfs-bdp-pds.s3.amazonaws.com/gfs.20240115/06/"));

        source.base_url = Some("http://127.0.0.1:8080/".to_string());
        assert_eq!(
            source.url_for(&run(), 3),
            "http://127.0.0.1:8080/gfs.20240115/06/atmos/gfs.t06z.pgrb2.0p25.f003"
        );
    }

    #[test]
    fn test_cache_name() {
        let source = SourceConfig::default();
        assert_eq!(source.cache_name(&run(), 9), "gfs.20240115.t06z.f009.grib2");

        let hour_only = SourceConfig {
            cache_pattern: "gfs_{forecast:03}.grib2".to_string(),
            ..SourceConfig::default()
        };
        assert_eq!(hour_only.cache_name(&run(), 9), "gfs_009.grib2");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
schedule:
  forecast_hours:
    start: 0
    end: 24
    step: 6
source:
  mirror: aws
map:
  colormap: turbo
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.schedule.forecast_hours.hours(), vec![0, 6, 12, 18, 24]);
        assert_eq!(config.source.mirror, Mirror::Aws);
        assert_eq!(config.source.min_payload_bytes, 1000);
        assert_eq!(config.region.bbox, BoundingBox::japan());
        assert_eq!(config.map.colormap, renderer::Colormap::Turbo);
        assert_eq!(config.map.pixels_per_degree, 24.0);
        assert_eq!(config.output.html_file, "gfs_japan.html");
        config.validate().unwrap();
    }

    #[test]
    fn test_shipped_config_draws_coastlines_and_borders() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/gfs-japan.yaml");
        let config = Config::load(&path).unwrap();
        config.validate().unwrap();

        let builtins: Vec<_> = config.map.overlays.iter().filter_map(|o| o.builtin).collect();
        assert_eq!(
            builtins,
            vec![renderer::BuiltinOverlay::Coastlines, renderer::BuiltinOverlay::Borders]
        );
        assert_eq!(config.map.overlays, Config::default().map.overlays);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.schedule.forecast_hours.step = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.forecast_hours = ForecastHours::new(12, 6, 3);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.region.bbox = BoundingBox::new(150.0, 20.0, 120.0, 50.0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.map.pixels_per_degree = -1.0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_frame_naming() {
        let config = Config::default();
        assert_eq!(OutputConfig::frame_name(24), "gfs_024.png");
        assert_eq!(
            config.frame_title(&run(), 24),
            "GFS 500hPa Z (+24h) 20240115 06UTC"
        );
        assert_eq!(
            config.output.frame_path(0),
            PathBuf::from("./images/gfs_000.png")
        );
    }
}
