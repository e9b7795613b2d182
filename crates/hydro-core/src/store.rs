//! The `Entity` and `RecordStore` traits.
//!
//! `Entity` describes how a domain record is keyed and how it maps onto the
//! flat, positional field list used by persistence backends. `RecordStore` is
//! implemented by backends (e.g. `hydro-store-file`); higher layers depend on
//! this abstraction, not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::{Result, event::Topic};

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The three persisted entity kinds.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
  User,
  Meter,
  Account,
}

/// What a backend does with a record line it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedPolicy {
  /// Log and drop the record, keep loading.
  Skip,
  /// Abort the load with an error.
  Reject,
}

impl EntityKind {
  /// Topic published when an entity of this kind is deleted, if any.
  pub fn deletion_topic(self) -> Option<Topic> {
    match self {
      Self::User => Some(Topic::UserDeleted),
      Self::Meter => Some(Topic::MeterDeleted),
      Self::Account => None,
    }
  }

  pub fn malformed_policy(self) -> MalformedPolicy {
    match self {
      Self::User => MalformedPolicy::Skip,
      Self::Meter | Self::Account => MalformedPolicy::Reject,
    }
  }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A keyed record that can be held in an entity store and persisted.
///
/// Fields must never contain the backend's separator; every implementation in
/// this crate guarantees that through its validation rules.
pub trait Entity: Clone + Send + Sync + 'static {
  const KIND: EntityKind;

  /// The identity under which the entity is stored.
  fn key(&self) -> &str;

  /// Positional fields, identity first.
  fn to_fields(&self) -> Vec<String>;

  /// Rebuild an entity from trimmed positional fields.
  fn from_fields(fields: &[&str]) -> Result<Self>;
}

pub(crate) fn expect_arity(
  kind: EntityKind,
  fields: &[&str],
  arity: usize,
) -> Result<()> {
  if fields.len() == arity {
    Ok(())
  } else {
    Err(crate::Error::malformed(
      kind,
      format!("expected {arity} fields, found {}", fields.len()),
    ))
  }
}

pub(crate) fn parse_decimal(kind: EntityKind, raw: &str) -> Result<f64> {
  raw
    .parse::<f64>()
    .map_err(|e| crate::Error::malformed(kind, format!("bad number {raw:?}: {e}")))
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Bulk persistence backend: every kind is loaded and saved wholesale.
///
/// `persist_all` overwrites whatever the backend held for that kind; there is
/// no append or per-record write.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Load every persisted record of kind `T::KIND`. A backend with nothing
  /// stored for the kind returns an empty list.
  fn load_all<T: Entity>(
    &self,
  ) -> impl Future<Output = Result<Vec<T>, Self::Error>> + Send + '_;

  /// Replace everything stored for kind `T::KIND` with `records`.
  fn persist_all<'a, T: Entity>(
    &'a self,
    records: &'a [T],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
