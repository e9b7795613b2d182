//! [`FileStore`]: the flat-file implementation of [`RecordStore`].

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
  sync::Arc,
};

use hydro_core::store::{Entity, EntityKind, RecordStore};
use serde::Deserialize;

use crate::{
  Error, Result,
  encode::{decode_file, encode_file},
};

// ─── File names ──────────────────────────────────────────────────────────────

/// File name used for each entity kind, relative to the store directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileNames {
  pub users:    String,
  pub meters:   String,
  pub accounts: String,
}

impl Default for FileNames {
  fn default() -> Self {
    Self {
      users:    "users.txt".into(),
      meters:   "meters.txt".into(),
      accounts: "accounts.txt".into(),
    }
  }
}

impl FileNames {
  pub fn for_kind(&self, kind: EntityKind) -> &str {
    match kind {
      EntityKind::User => &self.users,
      EntityKind::Meter => &self.meters,
      EntityKind::Account => &self.accounts,
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by one text file per entity kind in a directory.
///
/// Cloning is cheap; the file name table is reference-counted.
///
/// Saves truncate and rewrite the file in place. A failure part-way through a
/// write leaves that file truncated; the caller's in-memory state is the only
/// copy until the next successful save.
#[derive(Debug, Clone)]
pub struct FileStore {
  dir:   PathBuf,
  names: Arc<FileNames>,
}

impl FileStore {
  /// A store rooted at `dir` using the default file names. Nothing is touched
  /// on disk until the first load or save.
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self::with_file_names(dir, FileNames::default())
  }

  pub fn with_file_names(dir: impl Into<PathBuf>, names: FileNames) -> Self {
    Self { dir: dir.into(), names: Arc::new(names) }
  }

  pub fn dir(&self) -> &Path { &self.dir }

  pub fn path_for(&self, kind: EntityKind) -> PathBuf {
    self.dir.join(self.names.for_kind(kind))
  }

  async fn read_kind(&self, kind: EntityKind) -> Result<Option<String>> {
    let path = self.path_for(kind);
    match tokio::fs::read_to_string(&path).await {
      Ok(contents) => Ok(Some(contents)),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(Error::io(path, e)),
    }
  }

  async fn write_kind(&self, kind: EntityKind, contents: String) -> Result<()> {
    tokio::fs::create_dir_all(&self.dir)
      .await
      .map_err(|e| Error::io(&self.dir, e))?;

    let path = self.path_for(kind);
    tokio::fs::write(&path, contents)
      .await
      .map_err(|e| Error::io(path, e))
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for FileStore {
  type Error = Error;

  async fn load_all<T: Entity>(&self) -> Result<Vec<T>> {
    let Some(contents) = self.read_kind(T::KIND).await? else {
      tracing::debug!(kind = %T::KIND, "no record file yet, starting empty");
      return Ok(Vec::new());
    };

    let records = decode_file::<T>(&contents)?;
    tracing::debug!(kind = %T::KIND, count = records.len(), "loaded records");
    Ok(records)
  }

  async fn persist_all<'a, T: Entity>(&'a self, records: &'a [T]) -> Result<()> {
    let contents = encode_file(records)?;
    self.write_kind(T::KIND, contents).await?;
    tracing::debug!(kind = %T::KIND, count = records.len(), "persisted records");
    Ok(())
  }
}
