//! Tests for `FileStore` against a temporary directory.

use hydro_core::{
  account::Account,
  id::SerialId,
  store::{EntityKind, RecordStore},
  user::{NationalId, User},
};

use crate::{Error, FileNames, FileStore};

fn store() -> (tempfile::TempDir, FileStore) {
  let dir = tempfile::tempdir().expect("temp dir");
  let store = FileStore::new(dir.path());
  (dir, store)
}

fn user(id: &str, name: &str) -> User {
  User::new(
    NationalId::parse(id).unwrap(),
    name,
    "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".into(),
  )
  .unwrap()
}

fn account(id: &str, user_id: &str, meter_id: &str, reading: f64) -> Account {
  Account {
    account_id:   SerialId::parse(id).unwrap(),
    user_id:      NationalId::parse(user_id).unwrap(),
    meter_id:     SerialId::parse(meter_id).unwrap(),
    last_reading: reading,
  }
}

// ─── Missing files ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_file_loads_empty() {
  let (_dir, s) = store();
  let users: Vec<User> = s.load_all().await.unwrap();
  assert!(users.is_empty());
  let accounts: Vec<Account> = s.load_all().await.unwrap();
  assert!(accounts.is_empty());
}

// ─── Round trips ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn users_round_trip() {
  let (_dir, s) = store();
  let users = vec![user("111.222.333-44", "Ana"), user("55566677788", "Bruno Lima")];

  s.persist_all(&users).await.unwrap();
  let loaded: Vec<User> = s.load_all().await.unwrap();

  assert_eq!(loaded, users);
}

#[tokio::test]
async fn accounts_round_trip_with_fractional_readings() {
  let (_dir, s) = store();
  let accounts = vec![
    account("0000001", "11122233344", "1000000", 10.0),
    account("0000002", "55566677788", "2000000", 9_999_998.123_456),
  ];

  s.persist_all(&accounts).await.unwrap();
  let loaded: Vec<Account> = s.load_all().await.unwrap();

  assert_eq!(loaded, accounts);
}

#[tokio::test]
async fn persist_overwrites_previous_contents() {
  let (_dir, s) = store();
  s.persist_all(&[user("11122233344", "Ana"), user("55566677788", "Bruno")])
    .await
    .unwrap();
  s.persist_all(&[user("99988877766", "Carla")]).await.unwrap();

  let loaded: Vec<User> = s.load_all().await.unwrap();
  assert_eq!(loaded.len(), 1);
  assert_eq!(loaded[0].name, "Carla");
}

#[tokio::test]
async fn persisting_empty_list_leaves_empty_file() {
  let (_dir, s) = store();
  s.persist_all(&[user("11122233344", "Ana")]).await.unwrap();
  s.persist_all::<User>(&[]).await.unwrap();

  let contents = std::fs::read_to_string(s.path_for(EntityKind::User)).unwrap();
  assert!(contents.is_empty());
}

// ─── Line format ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn account_lines_are_dash_separated() {
  let (_dir, s) = store();
  s.persist_all(&[account("0000001", "11122233344", "1000000", 10.5)])
    .await
    .unwrap();

  let contents = std::fs::read_to_string(s.path_for(EntityKind::Account)).unwrap();
  assert_eq!(contents, "0000001-11122233344-1000000-10.5\n");
}

#[tokio::test]
async fn spaced_separators_are_tolerated() {
  let (_dir, s) = store();
  std::fs::write(
    s.path_for(EntityKind::Account),
    "0000001 - 11122233344 - 1000000 - 3.25\n\n",
  )
  .unwrap();

  let loaded: Vec<Account> = s.load_all().await.unwrap();
  assert_eq!(loaded, vec![account("0000001", "11122233344", "1000000", 3.25)]);
}

// ─── Malformed records ───────────────────────────────────────────────────────

#[tokio::test]
async fn malformed_user_lines_are_skipped() {
  let (_dir, s) = store();
  std::fs::write(
    s.path_for(EntityKind::User),
    "11122233344-hash-Ana\nnot a record\n222.222.222-22-hash-Bad\n55566677788-hash-Bruno\n",
  )
  .unwrap();

  let loaded: Vec<User> = s.load_all().await.unwrap();
  let names: Vec<&str> = loaded.iter().map(|u| u.name.as_str()).collect();
  assert_eq!(names, ["Ana", "Bruno"]);
}

#[tokio::test]
async fn malformed_account_line_rejects_the_load() {
  let (_dir, s) = store();
  std::fs::write(
    s.path_for(EntityKind::Account),
    "0000001-11122233344-1000000-1.0\n0000002-11122233344-oops\n",
  )
  .unwrap();

  let err = s.load_all::<Account>().await.unwrap_err();
  assert!(matches!(
    err,
    Error::Malformed { kind: EntityKind::Account, line: 2, .. }
  ));
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_file_names_are_used() {
  let dir = tempfile::tempdir().unwrap();
  let s = FileStore::with_file_names(
    dir.path(),
    FileNames {
      users:    "usuarios.txt".into(),
      meters:   "hidrometros.txt".into(),
      accounts: "contas.txt".into(),
    },
  );

  s.persist_all(&[user("11122233344", "Ana")]).await.unwrap();
  assert!(dir.path().join("usuarios.txt").exists());
}

#[tokio::test]
async fn missing_directory_is_created_on_save() {
  let dir = tempfile::tempdir().unwrap();
  let s = FileStore::new(dir.path().join("nested").join("data"));

  s.persist_all(&[user("11122233344", "Ana")]).await.unwrap();
  let loaded: Vec<User> = s.load_all().await.unwrap();
  assert_eq!(loaded.len(), 1);
}

#[tokio::test]
async fn unwritable_directory_is_an_io_error() {
  let dir = tempfile::tempdir().unwrap();
  let blocker = dir.path().join("not-a-dir");
  std::fs::write(&blocker, "").unwrap();
  let s = FileStore::new(&blocker);

  let err = s.persist_all(&[user("11122233344", "Ana")]).await.unwrap_err();
  assert!(matches!(err, Error::Io { .. }));
}
