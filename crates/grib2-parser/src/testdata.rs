//! Synthetic GRIB2 messages for tests.
//!
//! Produces small, structurally valid messages with a template 3.0 grid,
//! template 4.0 product and simple packing. Used by this crate's tests and by
//! downstream integration tests that need a file on disk.

/// Build a minimal GRIB2 message.
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    // Grid definition
    ni: u32,
    nj: u32,
    first_lat: f64,
    first_lon: f64,
    di: f64,
    dj: f64,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    time_unit: u8,
    forecast_hour: u32,
    // Data
    data_values: Vec<f32>,
    bitmap: Option<Vec<bool>>,
}

impl Default for Grib2Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Grib2Builder {
    /// 500 hPa geopotential height on a 1° grid covering 110..160E, 10..60N,
    /// stored north to south with longitudes in [0, 360).
    pub fn new() -> Self {
        let mut builder = Self {
            discipline: 0, // Meteorological
            center: 7,     // NCEP
            year: 2024,
            month: 1,
            day: 15,
            hour: 0,
            ni: 0,
            nj: 0,
            first_lat: 60.0,
            first_lon: 110.0,
            di: 1.0,
            dj: 1.0,
            scanning_mode: 0, // +i, -j, i consecutive
            param_category: 3,
            param_number: 5, // HGT
            level_type: 100,
            level_value: 50_000, // Pa
            time_unit: 1,
            forecast_hour: 0,
            data_values: Vec::new(),
            bitmap: None,
        };
        builder = builder.with_grid(51, 51);
        builder.with_height_ramp()
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.year = year;
        self.month = month;
        self.day = day;
        self.hour = hour;
        self
    }

    /// Resize the grid. Resets the data to zeros.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self.bitmap = None;
        self
    }

    /// Grid origin and spacing in degrees.
    pub fn with_origin(mut self, first_lat: f64, first_lon: f64, di: f64, dj: f64) -> Self {
        self.first_lat = first_lat;
        self.first_lon = first_lon;
        self.di = di;
        self.dj = dj;
        self
    }

    pub fn with_scanning_mode(mut self, flags: u8) -> Self {
        self.scanning_mode = flags;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    /// Code table 4.4 unit for the forecast time (1 = hours).
    pub fn with_time_unit(mut self, unit: u8) -> Self {
        self.time_unit = unit;
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = hour;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    /// Heights rising southward from 5100 m to 5900 m, the typical range of
    /// the 500 hPa surface.
    pub fn with_height_ramp(mut self) -> Self {
        let (ni, nj) = (self.ni as usize, self.nj as usize);
        let denom = nj.saturating_sub(1).max(1) as f32;
        self.data_values = (0..ni * nj)
            .map(|idx| 5100.0 + 800.0 * ((idx / ni) as f32 / denom))
            .collect();
        self
    }

    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Mark points present (`true`) or missing. Missing points are not packed.
    pub fn with_bitmap(mut self, present: Vec<bool>) -> Self {
        self.bitmap = Some(present);
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let packed_values: Vec<f32> = match &self.bitmap {
            Some(present) => self
                .data_values
                .iter()
                .zip(present)
                .filter(|(_, p)| **p)
                .map(|(&v, _)| v)
                .collect(),
            None => self.data_values.clone(),
        };
        let packing = Packing::for_values(&packed_values);

        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(&packing, packed_values.len() as u32),
            self.build_section6(),
            self.build_section7(&packing, &packed_values),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);

        // Section 0: Indicator
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());

        for section in &sections {
            message.extend_from_slice(section);
        }

        // Section 8: End
        message.extend_from_slice(b"7777");

        message
    }

    fn build_section1(&self) -> Vec<u8> {
        let mut section = Vec::new();
        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(1); // Section number

        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(1); // Significance of reference time (start of forecast)

        section.extend_from_slice(&self.year.to_be_bytes());
        section.push(self.month);
        section.push(self.day);
        section.push(self.hour);
        section.push(0); // Minute
        section.push(0); // Second

        section.push(0); // Production status (operational)
        section.push(1); // Type of data (forecast)

        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 3.0: Latitude/Longitude
        let section_length: u32 = 14 + 58;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(3); // Section number

        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth (spherical, 6371229 m)
        section.push(0); // Scale factor of radius
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of radius
        section.push(0); // Scale factor of major axis
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of major axis
        section.push(0); // Scale factor of minor axis
        section.extend_from_slice(&0u32.to_be_bytes()); // Scaled value of minor axis

        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes()); // Subdivisions

        let i_sign = if self.scanning_mode & 0x80 != 0 { -1.0 } else { 1.0 };
        let j_sign = if self.scanning_mode & 0x40 != 0 { 1.0 } else { -1.0 };
        let last_lat = self.first_lat + j_sign * self.dj * (self.nj.max(1) - 1) as f64;
        let last_lon = self.first_lon + i_sign * self.di * (self.ni.max(1) - 1) as f64;

        section.extend_from_slice(&micro_degrees(self.first_lat)); // La1
        section.extend_from_slice(&micro_degrees(self.first_lon)); // Lo1
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&micro_degrees(last_lat)); // La2
        section.extend_from_slice(&micro_degrees(last_lon)); // Lo2
        section.extend_from_slice(&micro_degrees(self.di)); // Di
        section.extend_from_slice(&micro_degrees(self.dj)); // Dj
        section.push(self.scanning_mode);

        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 4.0: Analysis or forecast at horizontal level
        let section_length: u32 = 34;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(4); // Section number

        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0

        section.push(self.param_category);
        section.push(self.param_number);
        section.push(2); // Type of generating process (forecast)
        section.push(0); // Background generating process
        section.push(96); // Analysis or forecast process (GFS)
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(self.time_unit); // Time range unit
        section.extend_from_slice(&self.forecast_hour.to_be_bytes());

        section.push(self.level_type); // Type of first fixed surface
        section.push(0); // Scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());

        section.push(255); // Type of second fixed surface (none)
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());

        section
    }

    fn build_section5(&self, packing: &Packing, num_packed: u32) -> Vec<u8> {
        let mut section = Vec::new();

        // Template 5.0: Simple packing
        let section_length: u32 = 21;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(5); // Section number

        section.extend_from_slice(&num_packed.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 5.0

        section.extend_from_slice(&packing.reference_value.to_be_bytes());
        section.extend_from_slice(&sign_magnitude_i16(packing.binary_scale_factor));
        section.extend_from_slice(&0u16.to_be_bytes()); // Decimal scale factor
        section.push(packing.bits_per_value);
        section.push(0); // Original field type (floating point)

        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();

        let bitmap_bytes: Vec<u8> = match &self.bitmap {
            Some(present) => present
                .chunks(8)
                .map(|chunk| {
                    chunk
                        .iter()
                        .enumerate()
                        .fold(0u8, |acc, (bit, &p)| acc | ((p as u8) << (7 - bit)))
                })
                .collect(),
            None => Vec::new(),
        };

        let section_length = 6 + bitmap_bytes.len() as u32;
        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(6); // Section number
        section.push(if self.bitmap.is_some() { 0 } else { 255 });
        section.extend_from_slice(&bitmap_bytes);

        section
    }

    fn build_section7(&self, packing: &Packing, values: &[f32]) -> Vec<u8> {
        let mut section = Vec::new();

        let packed_data = packing.pack(values);
        let section_length: u32 = 5 + packed_data.len() as u32;

        section.extend_from_slice(&section_length.to_be_bytes());
        section.push(7); // Section number
        section.extend_from_slice(&packed_data);

        section
    }
}

/// 16-bit simple packing parameters for a set of values.
struct Packing {
    reference_value: f32,
    binary_scale_factor: i16,
    bits_per_value: u8,
}

impl Packing {
    fn for_values(values: &[f32]) -> Self {
        let (min_val, max_val) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY),
            |(min, max), &v| (min.min(v), max.max(v)),
        );
        if !min_val.is_finite() || max_val <= min_val {
            return Self {
                reference_value: if min_val.is_finite() { min_val } else { 0.0 },
                binary_scale_factor: 0,
                bits_per_value: 0,
            };
        }

        // value = R + X * 2^E with X < 2^16, so E = ceil(log2(range / 65535))
        let range = max_val - min_val;
        Self {
            reference_value: min_val,
            binary_scale_factor: (range / 65535.0).log2().ceil() as i16,
            bits_per_value: 16,
        }
    }

    fn pack(&self, values: &[f32]) -> Vec<u8> {
        if self.bits_per_value == 0 {
            return Vec::new();
        }
        let scale = 2.0_f32.powi(self.binary_scale_factor as i32);
        values
            .iter()
            .flat_map(|&v| {
                let packed = ((v - self.reference_value) / scale).round() as u16;
                packed.to_be_bytes()
            })
            .collect()
    }
}

/// Degrees to GRIB2 sign-magnitude microdegrees.
fn micro_degrees(deg: f64) -> [u8; 4] {
    let micro = (deg.abs() * 1e6).round() as u32 & 0x7FFF_FFFF;
    let raw = if deg < 0.0 { micro | 0x8000_0000 } else { micro };
    raw.to_be_bytes()
}

fn sign_magnitude_i16(v: i16) -> [u8; 2] {
    let magnitude = v.unsigned_abs() & 0x7FFF;
    let raw = if v < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}
