//! Generated seven-digit identifiers shared by meters and accounts.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of distinct serial ids; ids are zero-padded draws below this bound.
pub const SERIAL_ID_SPACE: u32 = 10_000_000;

const SERIAL_ID_DIGITS: usize = 7;

/// A zero-padded seven-digit identifier such as `"0042917"`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct SerialId(String);

impl SerialId {
  /// Draw a uniformly random id. Uniqueness is the caller's concern.
  pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
    Self(format!("{:07}", rng.gen_range(0..SERIAL_ID_SPACE)))
  }

  /// Parse an id typed by an operator or read from disk. Surrounding
  /// whitespace is ignored.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    if trimmed.len() != SERIAL_ID_DIGITS
      || !trimmed.bytes().all(|b| b.is_ascii_digit())
    {
      return Err(Error::SerialIdFormat(raw.to_owned()));
    }
    Ok(Self(trimmed.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SerialId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for SerialId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<SerialId> for String {
  fn from(id: SerialId) -> Self { id.0 }
}
