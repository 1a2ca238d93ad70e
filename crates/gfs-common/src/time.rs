//! Model run identification and forecast hour ranges.

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Model run cycles for models that run four times a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelCycle {
    /// 00Z run
    Z00,
    /// 06Z run
    Z06,
    /// 12Z run
    Z12,
    /// 18Z run
    Z18,
}

impl ModelCycle {
    /// Exact cycle hour lookup.
    pub fn from_hour(hour: u32) -> Option<Self> {
        match hour {
            0 => Some(ModelCycle::Z00),
            6 => Some(ModelCycle::Z06),
            12 => Some(ModelCycle::Z12),
            18 => Some(ModelCycle::Z18),
            _ => None,
        }
    }

    /// The cycle bucket an hour of day falls into: floor(hour / 6) * 6.
    pub fn containing_hour(hour: u32) -> Self {
        match (hour % 24) / 6 {
            0 => ModelCycle::Z00,
            1 => ModelCycle::Z06,
            2 => ModelCycle::Z12,
            _ => ModelCycle::Z18,
        }
    }

    pub fn hour(&self) -> u32 {
        match self {
            ModelCycle::Z00 => 0,
            ModelCycle::Z06 => 6,
            ModelCycle::Z12 => 12,
            ModelCycle::Z18 => 18,
        }
    }
}

/// A single model run: initialization date plus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelRun {
    pub date: NaiveDate,
    pub cycle: ModelCycle,
}

impl ModelRun {
    pub fn new(date: NaiveDate, cycle: ModelCycle) -> Self {
        Self { date, cycle }
    }

    /// The most recent cycle bucket at `now`.
    ///
    /// This does not account for publication delay: the selected run may not
    /// be on the mirror yet.
    pub fn latest(now: DateTime<Utc>) -> Self {
        Self {
            date: now.date_naive(),
            cycle: ModelCycle::containing_hour(now.hour()),
        }
    }

    /// Parse a "YYYYMMDDHH" run identifier.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let s = s.trim();
        if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TimeParseError::InvalidFormat(s.to_string()));
        }

        let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d")
            .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;
        let hour: u32 = s[8..]
            .parse()
            .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;
        let cycle = ModelCycle::from_hour(hour).ok_or(TimeParseError::InvalidCycle(hour))?;

        Ok(Self { date, cycle })
    }

    /// Date component as used in provider paths, e.g. "20240115".
    pub fn date_str(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Two-digit cycle hour, e.g. "06".
    pub fn cycle_str(&self) -> String {
        format!("{:02}", self.cycle.hour())
    }
}

impl std::fmt::Display for ModelRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.date_str(), self.cycle_str())
    }
}

/// Closed range of forecast hours with a fixed stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastHours {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl ForecastHours {
    pub fn new(start: u32, end: u32, step: u32) -> Self {
        Self { start, end, step }
    }

    /// Generate the list of forecast hours.
    pub fn hours(&self) -> Vec<u32> {
        if self.step == 0 || self.end < self.start {
            return Vec::new();
        }
        (self.start..=self.end).step_by(self.step as usize).collect()
    }

    /// Last hour actually reached by the stride.
    pub fn last(&self) -> Option<u32> {
        self.hours().last().copied()
    }

    pub fn len(&self) -> usize {
        self.hours().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ForecastHours {
    fn default() -> Self {
        Self::new(0, 240, 3)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid run identifier: {0}. Expected YYYYMMDDHH")]
    InvalidFormat(String),

    #[error("Invalid cycle hour {0}, expected one of 00, 06, 12, 18")]
    InvalidCycle(u32),
}
