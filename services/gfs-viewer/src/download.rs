//! Fetching forecast files into the local cache.
//!
//! One GET per forecast hour, no retry. A file already present at the cache
//! path is trusted as-is.

use std::path::PathBuf;
use std::time::Duration;

use gfs_common::ModelRun;
use reqwest::Client;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::config::{Config, SourceConfig};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Download failed for {url}: HTTP {status}")]
    Download { url: String, status: u16 },

    #[error("Payload from {url} too small: {bytes} bytes (minimum {min})")]
    TooSmall { url: String, bytes: u64, min: u64 },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads forecast hours of one model run into the images directory.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    source: SourceConfig,
    run: ModelRun,
    cache_dir: PathBuf,
}

impl Fetcher {
    pub fn new(source: SourceConfig, run: ModelRun, cache_dir: PathBuf) -> Result<Self, FetchError> {
        let mut builder = Client::builder().tcp_nodelay(true);
        if let Some(secs) = source.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            source,
            run,
            cache_dir,
        })
    }

    pub fn from_config(config: &Config, run: ModelRun) -> Result<Self, FetchError> {
        Self::new(config.source.clone(), run, config.output.images_path())
    }

    pub fn url_for(&self, forecast_hour: u32) -> String {
        self.source.url_for(&self.run, forecast_hour)
    }

    pub fn cache_path(&self, forecast_hour: u32) -> PathBuf {
        self.cache_dir
            .join(self.source.cache_name(&self.run, forecast_hour))
    }

    /// Return the cached file for `forecast_hour`, downloading it first if
    /// it is not there yet.
    #[instrument(skip(self), fields(run = %self.run))]
    pub async fn fetch(&self, forecast_hour: u32) -> Result<PathBuf, FetchError> {
        fs::create_dir_all(&self.cache_dir).await?;

        let path = self.cache_path(forecast_hour);
        if fs::try_exists(&path).await? {
            debug!(path = %path.display(), "Cache hit, skipping download");
            return Ok(path);
        }

        let url = self.url_for(forecast_hour);
        info!(url = %url, "Downloading");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Download {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let bytes = body.len() as u64;
        if bytes < self.source.min_payload_bytes {
            return Err(FetchError::TooSmall {
                url,
                bytes,
                min: self.source.min_payload_bytes,
            });
        }

        fs::write(&path, &body).await?;
        info!(path = %path.display(), bytes, "Download completed");

        Ok(path)
    }
}
