//! Common types shared by the GFS viewer crates.

pub mod bbox;
pub mod field;
pub mod grid;
pub mod time;

pub use bbox::{normalize_longitude, BoundingBox};
pub use field::GeoField;
pub use grid::{GridSpec, ScanMode};
pub use time::{ForecastHours, ModelCycle, ModelRun};
