//! Engine configuration, deserialised from the application's config file.

use std::time::Duration;

use hydro_core::meter::DEFAULT_CYCLE_INTERVAL;
use serde::Deserialize;

/// Cost parameters for argon2id secret hashing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SecretHashConfig {
  /// Memory cost in KiB.
  pub memory_kib:  u32,
  pub iterations:  u32,
  pub parallelism: u32,
}

impl Default for SecretHashConfig {
  fn default() -> Self {
    Self {
      memory_kib:  argon2::Params::DEFAULT_M_COST,
      iterations:  argon2::Params::DEFAULT_T_COST,
      parallelism: argon2::Params::DEFAULT_P_COST,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Time between two reading cycles of every meter.
  pub meter_interval_ms:  u64,
  /// Also verify CPF check digits when registering users.
  pub strict_national_id: bool,
  pub secret_hash:        SecretHashConfig,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      meter_interval_ms:  DEFAULT_CYCLE_INTERVAL.as_millis() as u64,
      strict_national_id: false,
      secret_hash:        SecretHashConfig::default(),
    }
  }
}

impl EngineConfig {
  pub fn meter_interval(&self) -> Duration {
    Duration::from_millis(self.meter_interval_ms.max(1))
  }
}
