//! Error types for `hydro-core`.
//!
//! Everything here is a validation failure: the input was rejected before any
//! state was touched.

use thiserror::Error;

use crate::store::EntityKind;

#[derive(Debug, Error)]
pub enum Error {
  #[error("national id must not be empty")]
  EmptyNationalId,

  #[error("national id {0:?} must have exactly 11 digits")]
  NationalIdFormat(String),

  #[error("national id {0:?} is not a valid CPF")]
  NationalIdInvalid(String),

  #[error("name must not be empty")]
  EmptyName,

  #[error("name {0:?} may only contain letters and spaces")]
  NameCharacters(String),

  #[error("secret must have at least {min} characters")]
  WeakSecret { min: usize },

  #[error("serial id {0:?} must have exactly 7 digits")]
  SerialIdFormat(String),

  #[error("reading {0} must be a finite, non-negative number")]
  InvalidReading(f64),

  #[error("malformed {kind} record: {reason}")]
  MalformedRecord { kind: EntityKind, reason: String },
}

impl Error {
  pub(crate) fn malformed(kind: EntityKind, reason: impl Into<String>) -> Self {
    Self::MalformedRecord { kind, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
