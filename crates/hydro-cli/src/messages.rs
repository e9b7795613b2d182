//! Operator-facing text, keyed by `section.name`.
//!
//! The built-in bundle is compiled in from `messages.toml`. An override file
//! with the same layout can replace any subset of keys.

use std::{borrow::Cow, collections::HashMap, path::Path};

use anyhow::Context as _;

const EMBEDDED: &str = include_str!("messages.toml");

#[derive(Debug, Clone, Default)]
pub struct Messages {
  entries: HashMap<String, String>,
}

impl Messages {
  /// The embedded bundle, overlaid with `override_file` when given.
  pub fn load(override_file: Option<&Path>) -> anyhow::Result<Self> {
    let mut messages = Self::parse(EMBEDDED).context("parsing built-in messages")?;

    if let Some(path) = override_file {
      let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading messages file {}", path.display()))?;
      let overrides = Self::parse(&raw)
        .with_context(|| format!("parsing messages file {}", path.display()))?;
      tracing::debug!(path = %path.display(), keys = overrides.entries.len(), "message overrides loaded");
      messages.entries.extend(overrides.entries);
    }

    Ok(messages)
  }

  pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
    let table: toml::Table = toml::from_str(raw)?;
    let mut entries = HashMap::new();
    flatten("", &table, &mut entries);
    Ok(Self { entries })
  }

  /// The text for `key`, or `!key!` when there is none.
  pub fn get(&self, key: &str) -> Cow<'_, str> {
    match self.entries.get(key) {
      Some(text) => Cow::Borrowed(text),
      None => {
        tracing::warn!(key, "missing message");
        Cow::Owned(format!("!{key}!"))
      }
    }
  }

  /// [`get`](Self::get) with every `{name}` placeholder replaced.
  pub fn fill(&self, key: &str, args: &[(&str, String)]) -> String {
    let mut text = self.get(key).into_owned();
    for (name, value) in args {
      text = text.replace(&format!("{{{name}}}"), value);
    }
    text
  }
}

fn flatten(prefix: &str, table: &toml::Table, out: &mut HashMap<String, String>) {
  for (key, value) in table {
    let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
    match value {
      toml::Value::Table(inner) => flatten(&path, inner, out),
      toml::Value::String(text) => {
        out.insert(path, text.clone());
      }
      other => {
        out.insert(path, other.to_string());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_bundle_parses() {
    let messages = Messages::load(None).unwrap();
    assert_eq!(messages.get("menu.invalid"), "Invalid option.");
  }

  #[test]
  fn missing_keys_are_marked() {
    let messages = Messages::default();
    assert_eq!(messages.get("menu.nope"), "!menu.nope!");
  }

  #[test]
  fn placeholders_are_filled() {
    let messages = Messages::parse("[user]\nrow = \"{id} is {name}, {name}\"").unwrap();
    let text = messages.fill("user.row", &[("id", "1".into()), ("name", "Ana".into())]);
    assert_eq!(text, "1 is Ana, Ana");
  }

  #[test]
  fn override_file_replaces_only_its_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pt.toml");
    std::fs::write(&path, "[menu]\ninvalid = \"Opção inválida.\"\n").unwrap();

    let messages = Messages::load(Some(&path)).unwrap();

    assert_eq!(messages.get("menu.invalid"), "Opção inválida.");
    assert_eq!(messages.get("command.exit"), "Exit");
  }
}
