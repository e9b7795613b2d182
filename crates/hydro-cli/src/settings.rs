//! Application configuration: optional TOML file, then `HYDRO_*` environment
//! variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use hydro_engine::EngineConfig;
use hydro_store_file::FileNames;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Directory holding the record files. A leading `~/` is expanded.
  pub data_dir:      PathBuf,
  pub files:         FileNames,
  /// Append logs here instead of writing them to stderr.
  pub log_file:      Option<PathBuf>,
  /// TOML file overriding any of the built-in messages.
  pub messages_file: Option<PathBuf>,
  pub engine:        EngineConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      data_dir:      PathBuf::from("data"),
      files:         FileNames::default(),
      log_file:      None,
      messages_file: None,
      engine:        EngineConfig::default(),
    }
  }
}

impl AppConfig {
  /// Layer the sources. Nested keys use `__` in the environment, e.g.
  /// `HYDRO_ENGINE__METER_INTERVAL_MS=1000`.
  pub fn load(file: &Path, data_dir: Option<&Path>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("HYDRO")
          .prefix_separator("_")
          .separator("__"),
      )
      .set_override_option("data_dir", data_dir.map(|p| p.to_string_lossy().into_owned()))
      .context("applying command-line overrides")?
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    let mut config: Self = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;
    config.data_dir = expand_tilde(&config.data_dir);
    Ok(config)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(&dir.path().join("absent.toml"), None).unwrap();

    assert_eq!(config.data_dir, PathBuf::from("data"));
    assert_eq!(config.files, FileNames::default());
    assert_eq!(config.engine, EngineConfig::default());
  }

  #[test]
  fn file_values_and_flag_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hydro.toml");
    std::fs::write(
      &path,
      r#"
data_dir = "/var/lib/hydro"

[files]
users = "usuarios.txt"

[engine]
meter_interval_ms = 250
strict_national_id = true
"#,
    )
    .unwrap();

    let from_file = AppConfig::load(&path, None).unwrap();
    assert_eq!(from_file.data_dir, PathBuf::from("/var/lib/hydro"));
    assert_eq!(from_file.files.users, "usuarios.txt");
    assert_eq!(from_file.files.meters, "meters.txt");
    assert_eq!(from_file.engine.meter_interval_ms, 250);
    assert!(from_file.engine.strict_national_id);

    let flagged = AppConfig::load(&path, Some(Path::new("/tmp/hydro"))).unwrap();
    assert_eq!(flagged.data_dir, PathBuf::from("/tmp/hydro"));
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else {
      return;
    };
    assert_eq!(expand_tilde(Path::new("~/hydro")), PathBuf::from(home).join("hydro"));
    assert_eq!(expand_tilde(Path::new("data")), PathBuf::from("data"));
  }
}
