//! Accounts: the billing link between one user and one meter.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  id::SerialId,
  meter::validate_reading,
  store::{Entity, EntityKind, expect_arity, parse_decimal},
  user::NationalId,
};

/// A billing account.
///
/// An account is only meaningful while both its user and its meter exist;
/// the engine's consistency coordinator removes it when either goes away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
  pub account_id:   SerialId,
  pub user_id:      NationalId,
  pub meter_id:     SerialId,
  /// Meter reading captured when the account was opened or last refreshed.
  pub last_reading: f64,
}

impl Entity for Account {
  const KIND: EntityKind = EntityKind::Account;

  fn key(&self) -> &str { self.account_id.as_str() }

  fn to_fields(&self) -> Vec<String> {
    vec![
      self.account_id.to_string(),
      self.user_id.to_string(),
      self.meter_id.to_string(),
      self.last_reading.to_string(),
    ]
  }

  fn from_fields(fields: &[&str]) -> Result<Self> {
    expect_arity(Self::KIND, fields, 4)?;
    Ok(Self {
      account_id:   SerialId::parse(fields[0])?,
      user_id:      NationalId::parse(fields[1])?,
      meter_id:     SerialId::parse(fields[2])?,
      last_reading: validate_reading(parse_decimal(Self::KIND, fields[3])?)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn account_fields_round_trip() {
    let account = Account {
      account_id:   SerialId::parse("1234567").unwrap(),
      user_id:      NationalId::parse("111.222.333-44").unwrap(),
      meter_id:     SerialId::parse("7654321").unwrap(),
      last_reading: 10.25,
    };

    let fields = account.to_fields();
    assert_eq!(fields, ["1234567", "11122233344", "7654321", "10.25"]);

    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    assert_eq!(Account::from_fields(&refs).unwrap(), account);
  }

  #[test]
  fn bad_reading_is_malformed() {
    let err = Account::from_fields(&["1234567", "11122233344", "7654321", "x"]).unwrap_err();
    assert!(err.to_string().contains("account"));
  }
}
