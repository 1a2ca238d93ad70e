//! Map rendering for gridded forecast fields.
//!
//! - Colormap fill (viridis, turbo, grayscale)
//! - Contour lines (marching squares) with labels
//! - GeoJSON coastline/border overlays and a graticule
//! - PNG encoding with DPI metadata

pub mod contour;
pub mod gradient;
pub mod map;
pub mod overlay;
pub mod png;
pub mod text;

pub use gradient::{Color, Colormap};
pub use map::{MapRenderer, MapStyle};
pub use overlay::{default_overlays, BuiltinOverlay, OverlayLayer, OverlayStyle};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Field has no finite values")]
    EmptyField,

    #[error("Overlay {path}: {reason}")]
    Overlay { path: String, reason: String },

    #[error("Font error: {0}")]
    Font(String),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
