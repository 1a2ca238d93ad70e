//! Forecast map sequence for a single GFS field over a fixed region.
//!
//! Downloads each forecast hour of the latest run, renders it as a PNG map
//! and assembles a slider page that steps through the frames.

pub mod config;
pub mod download;
pub mod sequence;
pub mod viewer;

pub use config::Config;
pub use download::{FetchError, Fetcher};
pub use sequence::{FieldSource, ForecastSource, Frame, FrameRenderer, SequenceDriver};
pub use viewer::ViewerPage;
