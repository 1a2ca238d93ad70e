//! Selecting one field from a GRIB2 file and cropping it to a window.

use crate::{Grib2Error, Grib2Message, Grib2Reader};
use gfs_common::{normalize_longitude, BoundingBox, GeoField, GridSpec};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, instrument};

/// Which message to pick: parameter short name plus fixed surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelector {
    /// Parameter short name, e.g. "HGT"
    pub parameter: String,
    /// Level type in eccodes vocabulary, e.g. "isobaricInhPa"
    pub type_of_level: String,
    /// Level in the units implied by `type_of_level`
    pub level: f64,
}

impl FieldSelector {
    pub fn new(parameter: impl Into<String>, type_of_level: impl Into<String>, level: f64) -> Self {
        Self {
            parameter: parameter.into(),
            type_of_level: type_of_level.into(),
            level,
        }
    }

    /// 500 hPa geopotential height.
    pub fn hgt_500() -> Self {
        Self::new("HGT", "isobaricInhPa", 500.0)
    }

    /// GRIB2 fixed surface type (Code Table 4.5) and the level in the
    /// message's native units.
    pub fn fixed_surface(&self) -> Result<(u8, f64), Grib2Error> {
        let (code, factor) = match self.type_of_level.as_str() {
            "surface" => (1, 1.0),
            "isobaricInhPa" => (100, 100.0),
            "isobaricInPa" => (100, 1.0),
            "meanSea" => (101, 1.0),
            "heightAboveSea" => (102, 1.0),
            "heightAboveGround" => (103, 1.0),
            other => return Err(Grib2Error::UnsupportedLevelType(other.to_string())),
        };
        Ok((code, self.level * factor))
    }

    pub fn matches(&self, msg: &Grib2Message) -> Result<bool, Grib2Error> {
        let (level_type, level_value) = self.fixed_surface()?;
        let pd = &msg.product_definition;
        Ok(pd.parameter_short_name == self.parameter
            && pd.level_type == level_type
            && (pd.level_value - level_value).abs() < 1e-3)
    }
}

impl std::fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {} {}", self.parameter, self.type_of_level, self.level)
    }
}

/// Extract the first field matching `selector` and crop it to `bbox`.
///
/// Longitudes come out normalized to [-180, 180) and ascending, latitudes
/// descending. The crop is inclusive on all four edges.
#[instrument(skip(selector, bbox), fields(selector = %selector))]
pub fn extract_field(
    path: &Path,
    selector: &FieldSelector,
    bbox: &BoundingBox,
) -> Result<GeoField, Grib2Error> {
    // Fail on an unusable selector before reading anything.
    selector.fixed_surface()?;

    let mut reader = Grib2Reader::open(path)?;
    while let Some(msg) = reader.next_message()? {
        if !selector.matches(&msg)? {
            continue;
        }

        debug!(
            message_index = reader.messages_read(),
            parameter = msg.parameter(),
            level = msg.level(),
            "Found matching message"
        );

        let grid = msg.grid_definition.grid_spec()?;
        let values = msg.unpack_data()?;
        let pd = &msg.product_definition;
        let mut field = crop_to_bbox(&grid, &values, bbox)?;
        field.parameter = pd.parameter_short_name.clone();
        field.level = pd.level_description.clone();
        field.units = pd.parameter_units.clone();
        return Ok(field);
    }

    Err(Grib2Error::FieldNotFound(selector.to_string()))
}

/// Crop storage-order `values` on `grid` to the points inside `bbox`.
///
/// Returns a field with empty metadata strings.
pub fn crop_to_bbox(
    grid: &GridSpec,
    values: &[f32],
    bbox: &BoundingBox,
) -> Result<GeoField, Grib2Error> {
    if values.len() != grid.len() {
        return Err(Grib2Error::UnpackingError(format!(
            "{} values for a {}x{} grid",
            values.len(),
            grid.nx,
            grid.ny
        )));
    }

    // (normalized lon, column index), ascending, duplicates (0 and 360) dropped
    let mut columns: Vec<(f64, usize)> = grid
        .longitudes()
        .into_iter()
        .map(normalize_longitude)
        .enumerate()
        .filter(|(_, lon)| bbox.contains_lon(*lon))
        .map(|(i, lon)| (lon, i))
        .collect();
    columns.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    columns.dedup_by(|a, b| (a.0 - b.0).abs() < 1e-9);

    // (lat, row index), descending
    let mut rows: Vec<(f64, usize)> = grid
        .latitudes()
        .into_iter()
        .enumerate()
        .filter(|(_, lat)| bbox.contains_lat(*lat))
        .map(|(j, lat)| (lat, j))
        .collect();
    rows.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    if columns.is_empty() || rows.is_empty() {
        return Err(Grib2Error::EmptySelection(format!(
            "{:?} ({} columns, {} rows)",
            bbox,
            columns.len(),
            rows.len()
        )));
    }

    let mut cropped = Vec::with_capacity(columns.len() * rows.len());
    for &(_, j) in &rows {
        for &(_, i) in &columns {
            cropped.push(values[grid.flat_index(i, j)]);
        }
    }

    Ok(GeoField {
        parameter: String::new(),
        level: String::new(),
        units: String::new(),
        lats: rows.into_iter().map(|(lat, _)| lat).collect(),
        lons: columns.into_iter().map(|(lon, _)| lon).collect(),
        values: cropped,
    })
}
