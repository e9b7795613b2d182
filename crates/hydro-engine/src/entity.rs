//! [`EntityStore`]: a keyed, lock-protected in-memory collection of one
//! entity kind, with bulk load/save through a [`RecordStore`] backend.
//!
//! The store lock is never held while an event is published, so subscribers
//! are free to call back into any store, this one included.

use std::{collections::BTreeMap, fmt, sync::Arc};

use hydro_core::{
  event::Event,
  id::SerialId,
  store::{Entity, EntityKind, RecordStore},
};
use parking_lot::Mutex;

use crate::bus::EventBus;

/// An entity with the same key is already stored.
#[derive(Debug, thiserror::Error)]
#[error("{kind} {key:?} already exists")]
pub struct DuplicateKey {
  pub kind: EntityKind,
  pub key:  String,
}

pub struct EntityStore<T: Entity> {
  items: Mutex<BTreeMap<String, T>>,
  bus:   Arc<EventBus>,
}

impl<T: Entity> EntityStore<T> {
  pub fn new(bus: Arc<EventBus>) -> Self {
    Self { items: Mutex::new(BTreeMap::new()), bus }
  }

  pub fn kind(&self) -> EntityKind { T::KIND }

  // ── Create ────────────────────────────────────────────────────────────────

  /// Insert an entity that carries its own key. Never overwrites.
  pub fn create(&self, entity: T) -> Result<(), DuplicateKey> {
    let mut items = self.items.lock();
    let key = entity.key().to_owned();
    if items.contains_key(&key) {
      return Err(DuplicateKey { kind: T::KIND, key });
    }
    items.insert(key, entity);
    Ok(())
  }

  /// Draw a random unused serial id, build the entity with it and insert it.
  pub fn create_with_generated_id(&self, build: impl FnOnce(SerialId) -> T) -> T {
    match self.create_with_generated_id_unless(|_| false, build) {
      Ok(entity) | Err(entity) => entity,
    }
  }

  /// Like [`create_with_generated_id`](Self::create_with_generated_id), but
  /// checked and inserted under one lock: if any stored entity satisfies
  /// `conflict`, nothing is built and that entity is returned as the error.
  pub fn create_with_generated_id_unless(
    &self,
    conflict: impl Fn(&T) -> bool,
    build: impl FnOnce(SerialId) -> T,
  ) -> Result<T, T> {
    let mut items = self.items.lock();
    if let Some(existing) = items.values().find(|e| conflict(e)) {
      return Err(existing.clone());
    }

    let id = unused_id(&items);
    let entity = build(id);
    debug_assert!(!items.contains_key(entity.key()), "built entity must use the generated id");
    items.insert(entity.key().to_owned(), entity.clone());
    Ok(entity)
  }

  // ── Read ──────────────────────────────────────────────────────────────────

  pub fn find(&self, key: &str) -> Option<T> { self.items.lock().get(key).cloned() }

  pub fn contains(&self, key: &str) -> bool { self.items.lock().contains_key(key) }

  /// A snapshot of every entity, ordered by key.
  pub fn list(&self) -> Vec<T> { self.items.lock().values().cloned().collect() }

  pub fn list_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
    self.items.lock().values().filter(|e| predicate(e)).cloned().collect()
  }

  pub fn len(&self) -> usize { self.items.lock().len() }

  pub fn is_empty(&self) -> bool { self.items.lock().is_empty() }

  // ── Update / delete ───────────────────────────────────────────────────────

  /// Mutate a stored entity in place. Returns `None` if the key is absent.
  /// `f` must not change the entity's key.
  pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    self.items.lock().get_mut(key).map(f)
  }

  /// Remove an entity, then publish this kind's deletion event before
  /// returning. Removing an absent key does nothing and publishes nothing.
  pub fn delete(&self, key: &str) -> Option<T> {
    let removed = self.items.lock().remove(key)?;
    tracing::debug!(kind = %T::KIND, key, "deleted");

    if let Some(topic) = T::KIND.deletion_topic() {
      let report = self.bus.publish(&Event::new(topic, key));
      if !report.is_clean() {
        tracing::warn!(kind = %T::KIND, key, failed = report.failed, "deletion subscribers reported failures");
      }
    }

    Some(removed)
  }

  // ── Persistence ───────────────────────────────────────────────────────────

  /// Replace the contents with `entities`; later duplicates win.
  pub fn replace_all(&self, entities: Vec<T>) -> usize {
    let mut items = self.items.lock();
    items.clear();
    for entity in entities {
      items.insert(entity.key().to_owned(), entity);
    }
    items.len()
  }

  /// Replace the contents with whatever `backend` holds for this kind.
  /// On error the current contents are left untouched.
  pub async fn load_all<P: RecordStore>(&self, backend: &P) -> Result<usize, P::Error> {
    let entities = backend.load_all::<T>().await?;
    Ok(self.replace_all(entities))
  }

  /// Overwrite the backend's copy of this kind with a snapshot of the store.
  pub async fn persist_all<P: RecordStore>(&self, backend: &P) -> Result<usize, P::Error> {
    let snapshot = self.list();
    backend.persist_all(&snapshot).await?;
    Ok(snapshot.len())
  }
}

impl<T: Entity> fmt::Debug for EntityStore<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EntityStore")
      .field("kind", &T::KIND)
      .field("len", &self.len())
      .finish()
  }
}

fn unused_id<T>(items: &BTreeMap<String, T>) -> SerialId {
  let mut rng = rand::thread_rng();
  loop {
    let id = SerialId::random(&mut rng);
    if !items.contains_key(id.as_str()) {
      return id;
    }
  }
}

#[cfg(test)]
mod tests {
  use hydro_core::{
    account::Account,
    event::Topic,
    user::{NationalId, User},
  };

  use super::*;

  fn user(id: &str) -> User {
    User::new(NationalId::parse(id).unwrap(), "Ana", "hash".into()).unwrap()
  }

  fn account_for(store: &EntityStore<Account>, meter: &str) -> Account {
    store.create_with_generated_id(|account_id| Account {
      account_id,
      user_id: NationalId::parse("11122233344").unwrap(),
      meter_id: SerialId::parse(meter).unwrap(),
      last_reading: 0.0,
    })
  }

  #[test]
  fn create_rejects_duplicate_keys() {
    let store = EntityStore::new(Arc::new(EventBus::new()));
    store.create(user("11122233344")).unwrap();

    let err = store.create(user("111.222.333-44")).unwrap_err();
    assert_eq!(err.kind, EntityKind::User);
    assert_eq!(err.key, "11122233344");
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn generated_ids_are_unique_and_findable() {
    let store = EntityStore::new(Arc::new(EventBus::new()));
    let a = account_for(&store, "1000000");
    let b = account_for(&store, "2000000");

    assert_ne!(a.account_id, b.account_id);
    assert_eq!(store.find(a.account_id.as_str()), Some(a));
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn conflicting_create_returns_the_existing_entity() {
    let store = EntityStore::new(Arc::new(EventBus::new()));
    let first = account_for(&store, "1000000");

    let meter = SerialId::parse("1000000").unwrap();
    let result = store.create_with_generated_id_unless(
      |a: &Account| a.meter_id == meter,
      |_| unreachable!("must not build on conflict"),
    );

    assert_eq!(result.unwrap_err(), first);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn list_is_a_snapshot() {
    let store = EntityStore::new(Arc::new(EventBus::new()));
    store.create(user("11122233344")).unwrap();
    store.create(user("55566677788")).unwrap();

    let snapshot = store.list();
    store.delete("11122233344");

    assert_eq!(snapshot.len(), 2);
    assert_eq!(store.len(), 1);
  }

  #[test]
  fn delete_publishes_before_returning_and_only_once() {
    let bus = Arc::new(EventBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe_fn(Topic::UserDeleted, "test", move |e| {
      sink.lock().push(e.subject_id.clone());
      Ok(())
    });

    let store = EntityStore::new(Arc::clone(&bus));
    store.create(user("11122233344")).unwrap();

    assert!(store.delete("11122233344").is_some());
    assert_eq!(*seen.lock(), ["11122233344"]);

    assert!(store.delete("11122233344").is_none());
    assert_eq!(seen.lock().len(), 1);
  }

  #[test]
  fn subscribers_can_read_the_store_during_delete() {
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(EntityStore::<User>::new(Arc::clone(&bus)));
    let observed = Arc::new(Mutex::new(None));

    let (s, o) = (Arc::downgrade(&store), Arc::clone(&observed));
    bus.subscribe_fn(Topic::UserDeleted, "reader", move |_| {
      if let Some(store) = s.upgrade() {
        *o.lock() = Some(store.len());
      }
      Ok(())
    });

    store.create(user("11122233344")).unwrap();
    store.delete("11122233344");
    assert_eq!(*observed.lock(), Some(0));
  }

  #[test]
  fn update_mutates_in_place() {
    let store = EntityStore::new(Arc::new(EventBus::new()));
    store.create(user("11122233344")).unwrap();

    let updated = store.update("11122233344", |u| u.name = "Beatriz".into());
    assert!(updated.is_some());
    assert_eq!(store.find("11122233344").unwrap().name, "Beatriz");
    assert!(store.update("99988877766", |_| ()).is_none());
  }
}
