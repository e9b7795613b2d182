//! Error type for `hydro-engine`.
//!
//! Validation failures come from `hydro-core`; the remaining variants are
//! state errors. In every case nothing was mutated.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] hydro_core::Error),

  #[error("the system has not been initialised")]
  NotInitialized,

  #[error("a session is already active")]
  SessionAlreadyActive,

  #[error("no session is active")]
  NoActiveSession,

  #[error("unknown user or wrong secret")]
  AuthenticationFailed,

  #[error("user {0} holds the active session and cannot be deleted")]
  CannotDeleteActiveSession(String),

  #[error("user {0} already exists")]
  DuplicateUser(String),

  #[error("unknown user: {0}")]
  UnknownUser(String),

  #[error("unknown meter: {0}")]
  UnknownMeter(String),

  #[error("unknown account: {0}")]
  UnknownAccount(String),

  #[error("meter {meter_id} already belongs to account {account_id}")]
  DuplicateAccountForMeter { meter_id: String, account_id: String },

  #[error("secret hashing failed: {0}")]
  SecretHash(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
