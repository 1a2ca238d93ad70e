//! A cropped 2D field with its coordinate axes.

/// Gridded values over a lat/lon window.
///
/// Values are row-major with rows following `lats` (north to south) and
/// columns following `lons` (west to east, [-180, 180) convention). Missing
/// points are NaN.
#[derive(Debug, Clone)]
pub struct GeoField {
    /// Parameter short name, e.g. "HGT"
    pub parameter: String,
    /// Human readable level, e.g. "500 hPa"
    pub level: String,
    /// Physical units of the values, e.g. "m"
    pub units: String,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub values: Vec<f32>,
}

impl GeoField {
    pub fn width(&self) -> usize {
        self.lons.len()
    }

    pub fn height(&self) -> usize {
        self.lats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value_at(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height() || col >= self.width() {
            return None;
        }
        self.values.get(row * self.width() + col).copied()
    }

    /// Finite min/max of the values, `None` if everything is missing.
    pub fn value_range(&self) -> Option<(f32, f32)> {
        let (min, max) = self
            .values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min.is_finite() {
            Some((min, max))
        } else {
            None
        }
    }
}
