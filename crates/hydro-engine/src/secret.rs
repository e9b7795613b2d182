//! Argon2id hashing and verification of user secrets.

use argon2::{
  Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
  password_hash::SaltString,
};
use rand_core::OsRng;

use crate::{Error, Result, config::SecretHashConfig};

/// Produces and checks PHC-format hash strings (`$argon2id$v=19$…`).
#[derive(Clone)]
pub struct SecretHasher {
  argon2: Argon2<'static>,
}

impl SecretHasher {
  pub fn new(config: &SecretHashConfig) -> Result<Self> {
    let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
      .map_err(|e| Error::SecretHash(e.to_string()))?;
    Ok(Self { argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
  }

  pub fn hash(&self, secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = self
      .argon2
      .hash_password(secret.as_bytes(), &salt)
      .map_err(|e| Error::SecretHash(e.to_string()))?;
    Ok(hash.to_string())
  }

  /// `true` only if `phc` parses and matches `secret`. The cost parameters
  /// embedded in `phc` are used, so hashes made under older settings still
  /// verify.
  pub fn verify(&self, secret: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
      tracing::warn!("stored secret is not a valid password hash");
      return false;
    };
    self.argon2.verify_password(secret.as_bytes(), &parsed).is_ok()
  }
}

impl std::fmt::Debug for SecretHasher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SecretHasher").finish_non_exhaustive()
  }
}

#[cfg(test)]
pub(crate) fn cheap_config() -> SecretHashConfig {
  SecretHashConfig { memory_kib: 64, iterations: 1, parallelism: 1 }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_then_verify() {
    let hasher = SecretHasher::new(&cheap_config()).unwrap();
    let phc = hasher.hash("secret1").unwrap();

    assert!(phc.starts_with("$argon2id$"));
    assert!(!phc.contains('-'));
    assert!(hasher.verify("secret1", &phc));
    assert!(!hasher.verify("secret2", &phc));
  }

  #[test]
  fn salts_differ_between_hashes() {
    let hasher = SecretHasher::new(&cheap_config()).unwrap();
    assert_ne!(hasher.hash("secret1").unwrap(), hasher.hash("secret1").unwrap());
  }

  #[test]
  fn garbage_hash_never_verifies() {
    let hasher = SecretHasher::new(&cheap_config()).unwrap();
    assert!(!hasher.verify("secret1", "plaintext"));
  }

  #[test]
  fn invalid_params_are_rejected() {
    let config = SecretHashConfig { memory_kib: 1, iterations: 0, parallelism: 1 };
    assert!(matches!(SecretHasher::new(&config), Err(Error::SecretHash(_))));
  }
}
