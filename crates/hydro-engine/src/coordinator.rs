//! Keeps accounts consistent with the users and meters they reference.
//!
//! The coordinator reacts to deletion events: when a user or a meter goes
//! away, every account pointing at it is deleted through the account store.
//! Because the bus dispatches synchronously, those deletions finish before
//! the original `delete` call returns.

use std::sync::{Arc, Weak};

use hydro_core::{
  account::Account,
  event::{Event, Topic},
};

use crate::{
  bus::{EventBus, Subscriber},
  entity::EntityStore,
};

/// Holds the account store weakly: the store owns the bus, and the bus owns
/// its subscribers.
pub struct ConsistencyCoordinator {
  accounts: Weak<EntityStore<Account>>,
}

impl ConsistencyCoordinator {
  pub fn new(accounts: &Arc<EntityStore<Account>>) -> Self {
    Self { accounts: Arc::downgrade(accounts) }
  }

  /// Subscribe to [`Topic::UserDeleted`] and [`Topic::MeterDeleted`].
  pub fn attach(self: Arc<Self>, bus: &EventBus) {
    bus.subscribe(Topic::UserDeleted, self.clone());
    bus.subscribe(Topic::MeterDeleted, self);
  }

  /// Delete every account matching `orphaned`. Accounts already gone by the
  /// time we reach them are skipped silently.
  fn cascade(&self, event: &Event, orphaned: impl Fn(&Account) -> bool) -> usize {
    let Some(accounts) = self.accounts.upgrade() else {
      tracing::debug!(topic = %event.topic, "account store is gone, nothing to cascade");
      return 0;
    };
    let dependents = accounts.list_where(orphaned);
    let mut removed = 0;
    for account in dependents {
      if accounts.delete(account.account_id.as_str()).is_some() {
        removed += 1;
        tracing::info!(
          account = %account.account_id,
          cause = %event.topic,
          subject = %event.subject_id,
          "removed dependent account"
        );
      }
    }
    removed
  }
}

impl Subscriber for ConsistencyCoordinator {
  fn name(&self) -> &str { "consistency-coordinator" }

  fn handle(&self, event: &Event) -> anyhow::Result<()> {
    let subject = event.subject_id.as_str();
    let removed = match event.topic {
      Topic::UserDeleted => self.cascade(event, |a| a.user_id.as_str() == subject),
      Topic::MeterDeleted => self.cascade(event, |a| a.meter_id.as_str() == subject),
      Topic::MeterThresholdCrossed => {
        anyhow::bail!("coordinator received unexpected topic {}", event.topic)
      }
    };
    tracing::debug!(topic = %event.topic, subject, removed, "cascade finished");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use hydro_core::{id::SerialId, user::NationalId};

  use super::*;

  struct Fixture {
    bus:      Arc<EventBus>,
    accounts: Arc<EntityStore<Account>>,
  }

  fn fixture() -> Fixture {
    let bus = Arc::new(EventBus::new());
    let accounts = Arc::new(EntityStore::new(Arc::clone(&bus)));
    Arc::new(ConsistencyCoordinator::new(&accounts)).attach(&bus);
    Fixture { bus, accounts }
  }

  fn open(f: &Fixture, user: &str, meter: &str) -> Account {
    f.accounts.create_with_generated_id(|account_id| Account {
      account_id,
      user_id: NationalId::parse(user).unwrap(),
      meter_id: SerialId::parse(meter).unwrap(),
      last_reading: 0.0,
    })
  }

  #[test]
  fn user_deletion_removes_only_that_users_accounts() {
    let f = fixture();
    open(&f, "11122233344", "1000000");
    open(&f, "11122233344", "2000000");
    let kept = open(&f, "55566677788", "3000000");

    let report = f.bus.publish(&Event::user_deleted("11122233344"));

    assert!(report.is_clean());
    assert_eq!(f.accounts.list(), vec![kept]);
  }

  #[test]
  fn meter_deletion_removes_its_account() {
    let f = fixture();
    open(&f, "11122233344", "1000000");
    let kept = open(&f, "11122233344", "2000000");

    f.bus.publish(&Event::meter_deleted("1000000"));

    assert_eq!(f.accounts.list(), vec![kept]);
  }

  #[test]
  fn cascade_is_idempotent() {
    let f = fixture();
    open(&f, "11122233344", "1000000");

    f.bus.publish(&Event::meter_deleted("1000000"));
    let report = f.bus.publish(&Event::meter_deleted("1000000"));

    assert!(report.is_clean());
    assert!(f.accounts.is_empty());
  }

  #[test]
  fn unrelated_topics_are_not_subscribed() {
    let f = fixture();
    assert_eq!(f.bus.subscriber_count(Topic::MeterThresholdCrossed), 0);
    assert_eq!(f.bus.subscriber_count(Topic::UserDeleted), 1);
  }

  #[test]
  fn dropping_the_stores_frees_the_bus() {
    let f = fixture();
    let bus = Arc::downgrade(&f.bus);
    let accounts = Arc::downgrade(&f.accounts);

    drop(f);

    assert!(accounts.upgrade().is_none());
    assert!(bus.upgrade().is_none());
  }
}
