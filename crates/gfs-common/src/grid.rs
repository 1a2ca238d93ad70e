//! Regular lat/lon grid specifications.

use serde::{Deserialize, Serialize};

/// Specification of a regular lat/lon grid as stored in a GRIB2 message.
///
/// `dx`/`dy` are signed: they already include the scan direction, so
/// `first_x + i * dx` is the longitude of the i-th point in storage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of points along a parallel
    pub nx: usize,
    /// Number of points along a meridian
    pub ny: usize,
    /// Signed longitude increment in degrees
    pub dx: f64,
    /// Signed latitude increment in degrees
    pub dy: f64,
    /// Longitude of the first stored point
    pub first_x: f64,
    /// Latitude of the first stored point
    pub first_y: f64,
    pub scan_mode: ScanMode,
}

impl GridSpec {
    pub fn new(
        nx: usize,
        ny: usize,
        dx: f64,
        dy: f64,
        first_x: f64,
        first_y: f64,
        scan_mode: ScanMode,
    ) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            first_x,
            first_y,
            scan_mode,
        }
    }

    /// Build from unsigned GRIB2 increments, applying the scan direction.
    pub fn from_grib(
        nx: usize,
        ny: usize,
        di: f64,
        dj: f64,
        first_lon: f64,
        first_lat: f64,
        scan_mode: ScanMode,
    ) -> Self {
        let dx = if scan_mode.i_negative { -di } else { di };
        let dy = if scan_mode.j_positive { dj } else { -dj };
        Self::new(nx, ny, dx, dy, first_lon, first_lat, scan_mode)
    }

    /// Longitudes of the columns in storage order (source convention).
    pub fn longitudes(&self) -> Vec<f64> {
        (0..self.nx)
            .map(|i| self.first_x + i as f64 * self.dx)
            .collect()
    }

    /// Latitudes of the rows in storage order.
    pub fn latitudes(&self) -> Vec<f64> {
        (0..self.ny)
            .map(|j| self.first_y + j as f64 * self.dy)
            .collect()
    }

    /// Get the 1D array index for a 2D grid position.
    pub fn flat_index(&self, i: usize, j: usize) -> usize {
        self.scan_mode.flat_index(i, j, self.nx, self.ny)
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.nx == 0 || self.ny == 0
    }
}

/// Scan mode flags for grid data ordering.
///
/// Based on GRIB2 scanning mode (Flag Table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMode {
    /// false = points scan west to east
    pub i_negative: bool,
    /// false = rows scan north to south
    pub j_positive: bool,
    /// false = adjacent points are along a row
    pub j_consecutive: bool,
    /// Row scan direction alternates
    pub alternating_rows: bool,
}

impl ScanMode {
    /// Data starts at the north-west corner, rows west to east, north to south.
    pub fn standard() -> Self {
        Self {
            i_negative: false,
            j_positive: false,
            j_consecutive: false,
            alternating_rows: false,
        }
    }

    /// Create from GRIB2 flag byte.
    pub fn from_grib2_flag(flag: u8) -> Self {
        Self {
            i_negative: (flag & 0x80) != 0,
            j_positive: (flag & 0x40) != 0,
            j_consecutive: (flag & 0x20) != 0,
            alternating_rows: (flag & 0x10) != 0,
        }
    }

    /// Calculate flat array index from 2D indices.
    pub fn flat_index(&self, i: usize, j: usize, nx: usize, ny: usize) -> usize {
        if self.j_consecutive {
            i * ny + j
        } else {
            j * nx + i
        }
    }
}
