//! Users: the operators and customers identified by their CPF.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  store::{Entity, EntityKind, expect_arity},
};

/// Minimum length accepted for a plaintext secret.
pub const MIN_SECRET_LEN: usize = 4;

// ─── National id ─────────────────────────────────────────────────────────────

/// A Brazilian CPF, stored as its 11 bare digits.
///
/// Masks (`111.222.333-44`) are accepted on input and stripped.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
  /// Validate the format: 11 digits once `.` and `-` are removed, and not
  /// all the same digit.
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Err(Error::EmptyNationalId);
    }

    let digits: String = trimmed.chars().filter(|c| !matches!(c, '.' | '-')).collect();
    if digits.len() != 11 || !digits.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::NationalIdFormat(raw.to_owned()));
    }

    let first = digits.as_bytes()[0];
    if digits.bytes().all(|b| b == first) {
      return Err(Error::NationalIdInvalid(raw.to_owned()));
    }

    Ok(Self(digits))
  }

  /// [`parse`](Self::parse), then also verify both mod-11 check digits.
  pub fn parse_strict(raw: &str) -> Result<Self> {
    let id = Self::parse(raw)?;
    if id.has_valid_check_digits() {
      Ok(id)
    } else {
      Err(Error::NationalIdInvalid(raw.to_owned()))
    }
  }

  pub fn has_valid_check_digits(&self) -> bool {
    let digits: Vec<u32> = self.0.bytes().map(|b| u32::from(b - b'0')).collect();
    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The conventional `000.000.000-00` rendering.
  pub fn masked(&self) -> String {
    let d = &self.0;
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
  }
}

/// One CPF verifier digit over `prefix` (9 or 10 digits long).
fn check_digit(prefix: &[u32]) -> u32 {
  let weight_start = prefix.len() as u32 + 1;
  let sum: u32 = prefix
    .iter()
    .enumerate()
    .map(|(i, d)| d * (weight_start - i as u32))
    .sum();
  let digit = 11 - (sum % 11);
  if digit >= 10 { 0 } else { digit }
}

impl fmt::Display for NationalId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl TryFrom<String> for NationalId {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value) }
}

impl From<NationalId> for String {
  fn from(id: NationalId) -> Self { id.0 }
}

// ─── Field rules ─────────────────────────────────────────────────────────────

/// Validate and normalise a display name: letters and spaces only, trimmed.
pub fn validate_name(raw: &str) -> Result<String> {
  let name = raw.trim();
  if name.is_empty() {
    return Err(Error::EmptyName);
  }
  if !name.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
    return Err(Error::NameCharacters(raw.to_owned()));
  }
  Ok(name.to_owned())
}

/// Reject secrets that are too short to be worth hashing.
pub fn validate_secret(secret: &str) -> Result<()> {
  if secret.trim().is_empty() || secret.chars().count() < MIN_SECRET_LEN {
    return Err(Error::WeakSecret { min: MIN_SECRET_LEN });
  }
  Ok(())
}

// ─── User ────────────────────────────────────────────────────────────────────

/// A registered user. The secret is held only as a password-hash string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:     NationalId,
  pub name:        String,
  pub secret_hash: String,
}

impl User {
  pub fn new(user_id: NationalId, name: &str, secret_hash: String) -> Result<Self> {
    Ok(Self { user_id, name: validate_name(name)?, secret_hash })
  }
}

impl Entity for User {
  const KIND: EntityKind = EntityKind::User;

  fn key(&self) -> &str { self.user_id.as_str() }

  fn to_fields(&self) -> Vec<String> {
    vec![
      self.user_id.to_string(),
      self.secret_hash.clone(),
      self.name.clone(),
    ]
  }

  fn from_fields(fields: &[&str]) -> Result<Self> {
    expect_arity(Self::KIND, fields, 3)?;
    let secret_hash = fields[1];
    if secret_hash.is_empty() {
      return Err(Error::malformed(Self::KIND, "empty secret"));
    }
    Self::new(NationalId::parse(fields[0])?, fields[2], secret_hash.to_owned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn national_id_strips_mask() {
    let id = NationalId::parse("111.222.333-44").unwrap();
    assert_eq!(id.as_str(), "11122233344");
    assert_eq!(id.masked(), "111.222.333-44");
  }

  #[test]
  fn national_id_rejects_bad_format() {
    assert!(matches!(NationalId::parse("  "), Err(Error::EmptyNationalId)));
    assert!(matches!(
      NationalId::parse("123.456"),
      Err(Error::NationalIdFormat(_))
    ));
    assert!(matches!(
      NationalId::parse("1112223334a"),
      Err(Error::NationalIdFormat(_))
    ));
    assert!(matches!(
      NationalId::parse("222.222.222-22"),
      Err(Error::NationalIdInvalid(_))
    ));
  }

  #[test]
  fn strict_mode_checks_verifier_digits() {
    // 529.982.247-25 is the canonical valid example.
    assert!(NationalId::parse_strict("529.982.247-25").is_ok());
    assert!(NationalId::parse_strict("529.982.247-26").is_err());
    // Format-valid but checksum-invalid ids are accepted by the lax parser.
    assert!(NationalId::parse("111.222.333-44").is_ok());
    assert!(NationalId::parse_strict("111.222.333-44").is_err());
  }

  #[test]
  fn name_rules() {
    assert_eq!(validate_name("  Ana Maria ").unwrap(), "Ana Maria");
    assert!(matches!(validate_name(""), Err(Error::EmptyName)));
    assert!(matches!(validate_name("Ana-1"), Err(Error::NameCharacters(_))));
  }

  #[test]
  fn secret_rules() {
    assert!(validate_secret("secret1").is_ok());
    assert!(validate_secret("abc").is_err());
    assert!(validate_secret("    ").is_err());
  }

  #[test]
  fn user_fields_are_id_secret_name() {
    let user = User::new(
      NationalId::parse("11122233344").unwrap(),
      "Ana",
      "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".into(),
    )
    .unwrap();

    let fields = user.to_fields();
    assert_eq!(fields[0], "11122233344");
    assert_eq!(fields[2], "Ana");

    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    assert_eq!(User::from_fields(&refs).unwrap(), user);
  }

  #[test]
  fn user_from_fields_rejects_wrong_arity() {
    assert!(matches!(
      User::from_fields(&["11122233344", "hash"]),
      Err(Error::MalformedRecord { kind: EntityKind::User, .. })
    ));
  }
}
