//! GRIB2 reader and field extraction (WMO FM 92 GRIB Edition 2).
//!
//! Messages are streamed from any `Read` source. Section headers are parsed
//! locally; payloads are decoded locally for simple packing and through the
//! `grib` crate for every other data representation template.

pub mod field;
pub mod sections;
#[cfg(any(test, feature = "testdata"))]
pub mod testdata;
pub mod unpacking;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

pub use field::{extract_field, FieldSelector};
pub use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, Indicator,
    ProductDefinition,
};
pub use unpacking::unpack_simple;

/// Shortest possible message: section 0 plus the "7777" trailer.
const MIN_MESSAGE_LENGTH: u64 = 20;

/// Sanity cap on a single message; GFS 0.25° fields are a few MB at most.
const MAX_MESSAGE_LENGTH: u64 = 1 << 30;

/// Streaming GRIB2 reader.
///
/// Yields one [`Grib2Message`] per "GRIB" ... "7777" record. Bytes between
/// records are skipped.
pub struct Grib2Reader<R> {
    inner: R,
    messages_read: usize,
}

impl<R: Read> Grib2Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            messages_read: 0,
        }
    }

    /// Number of messages returned so far.
    pub fn messages_read(&self) -> usize {
        self.messages_read
    }

    /// Read the next message, or `None` at end of input.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        if !self.seek_magic()? {
            return Ok(None);
        }

        let mut header = [0u8; 16];
        header[..4].copy_from_slice(b"GRIB");
        self.inner
            .read_exact(&mut header[4..])
            .map_err(|e| truncated(e, "indicator section"))?;

        let edition = header[7];
        if edition != 2 {
            return Err(Grib2Error::InvalidFormat(format!(
                "Expected GRIB edition 2, got {}",
                edition
            )));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[8..16]);
        let total_length = u64::from_be_bytes(len_bytes);
        if !(MIN_MESSAGE_LENGTH..=MAX_MESSAGE_LENGTH).contains(&total_length) {
            return Err(Grib2Error::InvalidFormat(format!(
                "Implausible message length {}",
                total_length
            )));
        }

        let mut message = Vec::with_capacity(total_length as usize);
        message.extend_from_slice(&header);
        let remaining = total_length - header.len() as u64;
        let read = (&mut self.inner)
            .take(remaining)
            .read_to_end(&mut message)?;
        if (read as u64) < remaining {
            return Err(Grib2Error::InvalidFormat(format!(
                "Truncated message: expected {} bytes, got {}",
                total_length,
                message.len()
            )));
        }

        let msg = Grib2Message::parse(Bytes::from(message))?;
        self.messages_read += 1;
        Ok(Some(msg))
    }

    /// Advance past the next "GRIB" marker. Returns false at end of input.
    fn seek_magic(&mut self) -> Result<bool, Grib2Error> {
        let mut window = [0u8; 4];
        let mut filled = 0usize;
        let mut byte = [0u8; 1];

        loop {
            if self.inner.read(&mut byte)? == 0 {
                return Ok(false);
            }
            if filled < window.len() {
                window[filled] = byte[0];
                filled += 1;
            } else {
                window.rotate_left(1);
                window[3] = byte[0];
            }
            if filled == window.len() && &window == b"GRIB" {
                return Ok(true);
            }
        }
    }
}

impl Grib2Reader<BufReader<File>> {
    /// Open a file for streaming.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Grib2Error> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl Grib2Reader<Cursor<Bytes>> {
    /// Read messages from an in-memory buffer.
    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(Cursor::new(data))
    }
}

impl<R: Read> Iterator for Grib2Reader<R> {
    type Item = Result<Grib2Message, Grib2Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

fn truncated(e: std::io::Error, what: &str) -> Grib2Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Grib2Error::InvalidFormat(format!("Truncated {}", what))
    } else {
        Grib2Error::Io(e)
    }
}

/// A single parsed GRIB2 message.
///
/// Only the first field of a message is described; NCEP products carry one
/// field per message.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub indicator: Indicator,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    pub bitmap: Option<Bitmap>,
    pub data_section: DataSection,
    /// The complete raw message
    pub raw_data: Bytes,
}

impl Grib2Message {
    /// Parse all sections of a complete message.
    pub fn parse(raw_data: Bytes) -> Result<Self, Grib2Error> {
        let data = raw_data.as_ref();
        if !data.ends_with(b"7777") {
            return Err(Grib2Error::InvalidFormat(
                "Message does not end with 7777".to_string(),
            ));
        }

        let indicator = sections::parse_indicator(data)?;
        let identification = sections::parse_identification(data)?;
        let grid_definition = sections::parse_grid_definition(data)?;
        let product_definition = sections::parse_product_definition(data, indicator.discipline)?;
        let data_representation = sections::parse_data_representation(data)?;
        let bitmap = sections::parse_bitmap(data)?;
        let data_section = sections::parse_data_section(data)?;

        Ok(Self {
            indicator,
            identification,
            grid_definition,
            product_definition,
            data_representation,
            bitmap,
            data_section,
            raw_data,
        })
    }

    /// Parameter short name, e.g. "HGT".
    pub fn parameter(&self) -> &str {
        &self.product_definition.parameter_short_name
    }

    /// Level description, e.g. "500 hPa".
    pub fn level(&self) -> &str {
        &self.product_definition.level_description
    }

    /// Grid dimensions as (rows, columns).
    pub fn grid_dims(&self) -> (u32, u32) {
        (
            self.grid_definition.num_points_latitude,
            self.grid_definition.num_points_longitude,
        )
    }

    /// Reference time plus forecast offset.
    pub fn valid_time(&self) -> DateTime<Utc> {
        self.identification.reference_time
            + Duration::hours(i64::from(self.product_definition.forecast_hour))
    }

    /// Decode the field values in storage order. Missing points are NaN.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let expected = self.grid_definition.num_data_points as usize;

        let values = match self.data_representation.template_number {
            0 => {
                let unpacked = unpack_simple(
                    &self.data_section.data,
                    self.grid_definition.num_data_points,
                    self.data_representation.bits_per_value,
                    self.data_representation.reference_value,
                    self.data_representation.binary_scale_factor,
                    self.data_representation.decimal_scale_factor,
                    self.bitmap.as_ref().map(|b| b.data.as_ref()),
                )?;
                unpacked
                    .into_iter()
                    .map(|v| v.unwrap_or(f32::NAN))
                    .collect()
            }
            _ => unpacking::unpack_with_grib(&self.raw_data)?,
        };

        if values.len() != expected {
            return Err(Grib2Error::UnpackingError(format!(
                "Decoded {} values for a grid of {} points",
                values.len(),
                expected
            )));
        }
        Ok(values)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking error: {0}")]
    UnpackingError(String),

    #[error("No message matching {0}")]
    FieldNotFound(String),

    #[error("Bounding box selects no grid points: {0}")]
    EmptySelection(String),

    #[error("Unsupported grid: {0}")]
    UnsupportedGrid(String),

    #[error("Unsupported level type: {0}")]
    UnsupportedLevelType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
