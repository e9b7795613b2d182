//! Meter constants and the persisted meter snapshot.
//!
//! The live, self-advancing meter is an actor in `hydro-engine`; this module
//! only holds what a meter *is* on disk and the rules its reading obeys.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  id::SerialId,
  store::{EntityKind, expect_arity, parse_decimal},
};

/// Highest reading a meter can display; the next increment wraps it to zero.
pub const LIMIT_MAX: f64 = 9_999_999.0;

/// Smallest consumption added per cycle (inclusive).
pub const MIN_CYCLE_DELTA: f64 = 0.001;

/// Largest consumption added per cycle (exclusive).
pub const MAX_CYCLE_DELTA: f64 = 0.010;

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(5_000);

/// Readings must be finite and non-negative.
pub fn validate_reading(reading: f64) -> Result<f64> {
  if reading.is_finite() && reading >= 0.0 {
    Ok(reading)
  } else {
    Err(Error::InvalidReading(reading))
  }
}

/// A meter as persisted: identity and last reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
  pub meter_id: SerialId,
  pub reading:  f64,
}

impl MeterRecord {
  pub fn to_fields(&self) -> Vec<String> {
    vec![self.meter_id.to_string(), self.reading.to_string()]
  }

  pub fn from_fields(fields: &[&str]) -> Result<Self> {
    expect_arity(EntityKind::Meter, fields, 2)?;
    let meter_id = SerialId::parse(fields[0])?;
    let reading = validate_reading(parse_decimal(EntityKind::Meter, fields[1])?)?;
    Ok(Self { meter_id, reading })
  }
}
