//! Encoding and decoding between entities and record lines.
//!
//! A line is the entity's positional fields joined by [`SEPARATOR`]. On read
//! each field is trimmed, so older files written with ` - ` still load.

use hydro_core::store::{Entity, MalformedPolicy};

use crate::{Error, Result};

pub const SEPARATOR: char = '-';

// ─── Single records ──────────────────────────────────────────────────────────

pub fn encode_line<T: Entity>(entity: &T) -> Result<String> {
  let fields = entity.to_fields();
  if fields.iter().any(|f| f.contains(SEPARATOR)) {
    return Err(Error::FieldContainsSeparator {
      kind: T::KIND,
      key:  entity.key().to_owned(),
    });
  }
  Ok(fields.join(&SEPARATOR.to_string()))
}

pub fn decode_line<T: Entity>(line: &str) -> hydro_core::Result<T> {
  let fields: Vec<&str> = line.split(SEPARATOR).map(str::trim).collect();
  T::from_fields(&fields)
}

// ─── Whole files ─────────────────────────────────────────────────────────────

pub fn encode_file<T: Entity>(records: &[T]) -> Result<String> {
  let mut out = String::new();
  for record in records {
    out.push_str(&encode_line(record)?);
    out.push('\n');
  }
  Ok(out)
}

/// Decode every non-blank line of `contents`, applying the kind's
/// [`MalformedPolicy`] to lines that fail.
pub fn decode_file<T: Entity>(contents: &str) -> Result<Vec<T>> {
  let policy = T::KIND.malformed_policy();
  let mut records = Vec::new();

  for (idx, line) in contents.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    match decode_line::<T>(line) {
      Ok(record) => records.push(record),
      Err(source) => match policy {
        MalformedPolicy::Skip => {
          tracing::warn!(kind = %T::KIND, line = idx + 1, error = %source, "skipping malformed record");
        }
        MalformedPolicy::Reject => {
          return Err(Error::Malformed { kind: T::KIND, line: idx + 1, source });
        }
      },
    }
  }

  Ok(records)
}
