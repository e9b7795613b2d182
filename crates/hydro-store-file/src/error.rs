//! Error type for `hydro-store-file`.

use std::path::PathBuf;

use hydro_core::store::EntityKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("i/o error on {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A record line could not be decoded and the kind does not tolerate it.
  #[error("{kind} file line {line}: {source}")]
  Malformed {
    kind:   EntityKind,
    line:   usize,
    #[source]
    source: hydro_core::Error,
  },

  /// A field would corrupt the line format if written.
  #[error("{kind} {key:?} has a field containing the separator")]
  FieldContainsSeparator { kind: EntityKind, key: String },
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
