//! Geographic bounding box and longitude convention helpers.

use serde::{Deserialize, Serialize};

/// Map a longitude into the [-180, 180) convention.
///
/// GFS grids are stored with longitudes in [0, 360); everything downstream
/// of the extractor works in [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// A geographic bounding box in degrees (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// The Japan window used by the default configuration.
    pub fn japan() -> Self {
        Self::new(120.0, 20.0, 150.0, 50.0)
    }

    /// Parse a "min_lon,min_lat,max_lon,max_lat" string.
    pub fn from_csv(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let parse = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| BboxParseError::InvalidNumber(p.to_string()))
        };

        let bbox = Self::new(
            parse(parts[0])?,
            parse(parts[1])?,
            parse(parts[2])?,
            parse(parts[3])?,
        );
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check ordering and ranges.
    ///
    /// Longitudes must already be in the [-180, 180] convention; boxes that
    /// cross the antimeridian are not supported.
    pub fn validate(&self) -> Result<(), BboxParseError> {
        let finite = [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(BboxParseError::OutOfRange(*self));
        }
        if self.min_lon >= self.max_lon || self.min_lat >= self.max_lat {
            return Err(BboxParseError::Inverted(*self));
        }
        if self.min_lon < -180.0
            || self.max_lon > 180.0
            || self.min_lat < -90.0
            || self.max_lat > 90.0
        {
            return Err(BboxParseError::OutOfRange(*self));
        }
        Ok(())
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Inclusive longitude test with a small tolerance for grid rounding.
    pub fn contains_lon(&self, lon: f64) -> bool {
        lon >= self.min_lon - EPSILON && lon <= self.max_lon + EPSILON
    }

    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.min_lat - EPSILON && lat <= self.max_lat + EPSILON
    }
}

const EPSILON: f64 = 1e-9;

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bbox format: {0}. Expected 'min_lon,min_lat,max_lon,max_lat'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),

    #[error("Bounding box corners are inverted: {0:?}")]
    Inverted(BoundingBox),

    #[error("Bounding box outside geographic range: {0:?}")]
    OutOfRange(BoundingBox),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_longitude() {
        let input = [0.0, 179.0, 180.0, 359.0];
        let output: Vec<f64> = input.iter().map(|&l| normalize_longitude(l)).collect();
        assert_eq!(output, vec![0.0, 179.0, -180.0, -1.0]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for lon in [-180.0, -90.5, 0.0, 45.25, 179.75] {
            assert_eq!(normalize_longitude(lon), lon);
        }
    }

    #[test]
    fn test_parse_csv() {
        let bbox = BoundingBox::from_csv("120,20,150,50").unwrap();
        assert_eq!(bbox, BoundingBox::japan());
    }
}
