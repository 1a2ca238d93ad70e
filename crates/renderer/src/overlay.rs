//! Vector overlays: coastlines and borders from GeoJSON, plus a graticule.
//!
//! Geometry is reduced to polylines in (lon, lat). Points and their
//! multi-variants are ignored; polygon rings are drawn as closed lines.

use crate::gradient::Color;
use crate::RenderError;
use gfs_common::BoundingBox;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A polyline in (lon, lat) degrees.
pub type Polyline = Vec<(f64, f64)>;

const COASTLINES_GEOJSON: &str = include_str!("../assets/east_asia_coastlines.geojson");
const BORDERS_GEOJSON: &str = include_str!("../assets/east_asia_borders.geojson");

/// Simplified East Asia layers compiled into the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinOverlay {
    Coastlines,
    Borders,
}

impl BuiltinOverlay {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinOverlay::Coastlines => "coastlines",
            BuiltinOverlay::Borders => "borders",
        }
    }

    fn geojson(&self) -> &'static str {
        match self {
            BuiltinOverlay::Coastlines => COASTLINES_GEOJSON,
            BuiltinOverlay::Borders => BORDERS_GEOJSON,
        }
    }
}

/// One overlay layer: a GeoJSON file or a built-in layer, and its stroke.
///
/// `path` wins when both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub builtin: Option<BuiltinOverlay>,
    #[serde(default = "default_overlay_color")]
    pub color: String,
    /// Line width in points.
    #[serde(default = "default_overlay_width")]
    pub width: f32,
}

impl OverlayStyle {
    pub fn file(path: impl Into<PathBuf>, color: &str, width: f32) -> Self {
        Self {
            path: Some(path.into()),
            builtin: None,
            color: color.to_string(),
            width,
        }
    }

    pub fn builtin(layer: BuiltinOverlay, color: &str, width: f32) -> Self {
        Self {
            path: None,
            builtin: Some(layer),
            color: color.to_string(),
            width,
        }
    }

    /// Human-readable origin, used in logs and errors.
    fn origin(&self) -> String {
        match (&self.path, self.builtin) {
            (Some(path), _) => path.display().to_string(),
            (None, Some(layer)) => format!("builtin:{}", layer.name()),
            (None, None) => "<unset>".to_string(),
        }
    }
}

/// Coastlines and borders as in a default map.
pub fn default_overlays() -> Vec<OverlayStyle> {
    vec![
        OverlayStyle::builtin(BuiltinOverlay::Coastlines, "#000000", 0.8),
        OverlayStyle::builtin(BuiltinOverlay::Borders, "#000000", 0.5),
    ]
}

fn default_overlay_color() -> String {
    "#000000".to_string()
}

fn default_overlay_width() -> f32 {
    0.5
}

/// A loaded overlay ready to draw.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub name: String,
    pub lines: Vec<Polyline>,
    pub color: Color,
    pub width: f32,
}

impl OverlayLayer {
    /// Read and parse the GeoJSON named by `style`.
    pub fn load(style: &OverlayStyle) -> Result<Self, RenderError> {
        let origin = style.origin();
        let overlay_err = |reason: String| RenderError::Overlay {
            path: origin.clone(),
            reason,
        };

        let color = Color::from_hex(&style.color)
            .ok_or_else(|| overlay_err(format!("invalid color {:?}", style.color)))?;

        let (name, text) = match (&style.path, style.builtin) {
            (Some(path), _) => (
                layer_name(path),
                Cow::Owned(std::fs::read_to_string(path).map_err(|e| overlay_err(e.to_string()))?),
            ),
            (None, Some(layer)) => (layer.name().to_string(), Cow::Borrowed(layer.geojson())),
            (None, None) => {
                return Err(overlay_err("neither path nor builtin is set".to_string()))
            }
        };
        let lines = parse_geojson(&text).map_err(overlay_err)?;

        debug!(
            origin = %origin,
            lines = lines.len(),
            points = lines.iter().map(Vec::len).sum::<usize>(),
            "Loaded overlay"
        );

        Ok(Self {
            name,
            lines,
            color,
            width: style.width,
        })
    }

    /// Lines with at least one vertex inside `bbox` (grown by `margin` degrees).
    pub fn lines_near<'a>(
        &'a self,
        bbox: &'a BoundingBox,
        margin: f64,
    ) -> impl Iterator<Item = &'a Polyline> + 'a {
        self.lines.iter().filter(move |line| {
            line.iter().any(|&(lon, lat)| {
                lon >= bbox.min_lon - margin
                    && lon <= bbox.max_lon + margin
                    && lat >= bbox.min_lat - margin
                    && lat <= bbox.max_lat + margin
            })
        })
    }
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract every line-like geometry from a GeoJSON document.
pub fn parse_geojson(text: &str) -> Result<Vec<Polyline>, String> {
    let doc: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    let mut lines = Vec::new();
    collect_object(&doc, &mut lines)?;
    Ok(lines)
}

fn collect_object(obj: &Value, lines: &mut Vec<Polyline>) -> Result<(), String> {
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| "GeoJSON object without \"type\"".to_string())?;

    match kind {
        "FeatureCollection" => {
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| "FeatureCollection without \"features\"".to_string())?;
            for feature in features {
                collect_object(feature, lines)?;
            }
        }
        "Feature" => {
            // A feature may have a null geometry
            if let Some(geometry) = obj.get("geometry").filter(|g| !g.is_null()) {
                collect_object(geometry, lines)?;
            }
        }
        "GeometryCollection" => {
            let geometries = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| "GeometryCollection without \"geometries\"".to_string())?;
            for geometry in geometries {
                collect_object(geometry, lines)?;
            }
        }
        "LineString" => lines.push(parse_line(coordinates(obj)?)?),
        "MultiLineString" | "Polygon" => {
            for line in as_array(coordinates(obj)?)? {
                lines.push(parse_line(line)?);
            }
        }
        "MultiPolygon" => {
            for polygon in as_array(coordinates(obj)?)? {
                for ring in as_array(polygon)? {
                    lines.push(parse_line(ring)?);
                }
            }
        }
        "Point" | "MultiPoint" => {}
        other => return Err(format!("unsupported GeoJSON type {:?}", other)),
    }

    Ok(())
}

fn coordinates(obj: &Value) -> Result<&Value, String> {
    obj.get("coordinates")
        .ok_or_else(|| "geometry without \"coordinates\"".to_string())
}

fn as_array(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("expected an array, got {}", value))
}

fn parse_line(value: &Value) -> Result<Polyline, String> {
    as_array(value)?
        .iter()
        .map(|position| {
            let pair = as_array(position)?;
            match (
                pair.first().and_then(Value::as_f64),
                pair.get(1).and_then(Value::as_f64),
            ) {
                (Some(lon), Some(lat)) => Ok((lon, lat)),
                _ => Err(format!("invalid position {}", position)),
            }
        })
        .collect()
}

/// Meridians and parallels at multiples of `step` degrees inside `bbox`.
///
/// Returns (meridian longitudes, parallel latitudes).
pub fn graticule(bbox: &BoundingBox, step: f64) -> (Vec<f64>, Vec<f64>) {
    if step <= 0.0 {
        return (vec![], vec![]);
    }
    let multiples = |lo: f64, hi: f64| -> Vec<f64> {
        let first = (lo / step - 1e-9).ceil() as i64;
        let last = (hi / step + 1e-9).floor() as i64;
        (first..=last).map(|k| k as f64 * step).collect()
    };
    (
        multiples(bbox.min_lon, bbox.max_lon),
        multiples(bbox.min_lat, bbox.max_lat),
    )
}

/// "140°E", "10°W", "0°"
pub fn format_longitude(lon: f64) -> String {
    let lon = gfs_common::normalize_longitude(lon);
    if lon.abs() < 1e-9 || (lon.abs() - 180.0).abs() < 1e-9 {
        format!("{:.0}°", lon.abs())
    } else if lon > 0.0 {
        format!("{:.0}°E", lon)
    } else {
        format!("{:.0}°W", -lon)
    }
}

/// "35°N", "10°S", "0°"
pub fn format_latitude(lat: f64) -> String {
    if lat.abs() < 1e-9 {
        "0°".to_string()
    } else if lat > 0.0 {
        format!("{:.0}°N", lat)
    } else {
        format!("{:.0}°S", -lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let doc = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[130, 30], [131, 31.5]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "MultiPolygon", "coordinates": [
                    [[[139, 35], [140, 35], [140, 36], [139, 35]]],
                    [[[141, 43], [142, 43], [141, 44], [141, 43]]]
                 ]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [135, 35]}}
            ]
        }"#;

        let lines = parse_geojson(doc).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], vec![(130.0, 30.0), (131.0, 31.5)]);
        assert_eq!(lines[1].len(), 4);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_geojson("not json").is_err());
        assert!(parse_geojson(r#"{"type": "LineString", "coordinates": [[1]]}"#).is_err());
        assert!(parse_geojson(r#"{"type": "Torus"}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let style = OverlayStyle::file("/nonexistent/coast.geojson", "#000000", 0.5);
        let err = OverlayLayer::load(&style).unwrap_err();
        assert!(matches!(err, RenderError::Overlay { .. }));
    }

    #[test]
    fn test_load_requires_a_source() {
        let style = OverlayStyle {
            path: None,
            builtin: None,
            color: default_overlay_color(),
            width: default_overlay_width(),
        };
        assert!(OverlayLayer::load(&style).is_err());
    }

    #[test]
    fn test_builtin_layers_cover_japan() {
        let japan = BoundingBox::japan();
        for style in default_overlays() {
            let layer = OverlayLayer::load(&style).unwrap();
            assert_eq!(Some(layer.name.as_str()), style.builtin.map(|b| b.name()));
            assert!(layer.lines_near(&japan, 0.0).count() > 0, "{}", layer.name);
        }

        let coast = OverlayLayer::load(&OverlayStyle::builtin(BuiltinOverlay::Coastlines, "#000000", 0.8)).unwrap();
        // Tokyo Bay lies on the Honshu outline
        assert!(coast
            .lines
            .iter()
            .flatten()
            .any(|&(lon, lat)| (lon - 139.9).abs() < 0.5 && (lat - 35.5).abs() < 0.5));
    }

    #[test]
    fn test_style_from_yaml_names() {
        let style: OverlayStyle = serde_json::from_str(r#"{"builtin": "borders"}"#).unwrap();
        assert_eq!(style.builtin, Some(BuiltinOverlay::Borders));
        assert_eq!(style.path, None);
        assert_eq!(style.color, "#000000");

        let style: OverlayStyle =
            serde_json::from_str(r#"{"path": "ne_10m_coastline.geojson", "width": 1.0}"#).unwrap();
        assert_eq!(style.path, Some(PathBuf::from("ne_10m_coastline.geojson")));
        assert_eq!(style.width, 1.0);
    }

    #[test]
    fn test_graticule_japan() {
        let (lons, lats) = graticule(&BoundingBox::japan(), 10.0);
        assert_eq!(lons, vec![120.0, 130.0, 140.0, 150.0]);
        assert_eq!(lats, vec![20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn test_degree_labels() {
        assert_eq!(format_longitude(140.0), "140°E");
        assert_eq!(format_longitude(350.0), "10°W");
        assert_eq!(format_longitude(0.0), "0°");
        assert_eq!(format_latitude(-15.0), "15°S");
        assert_eq!(format_latitude(35.0), "35°N");
    }
}
