//! [`SessionFacade`]: the single entry point used by the presentation layer.
//!
//! The facade is driven from one operator task. It owns the initialised
//! state, the current session and the wiring between stores, bus, meter
//! actors and the consistency coordinator. Concurrency lives below it: the
//! meter actors and the lock-protected stores.

use std::{collections::HashSet, sync::Arc};

use hydro_core::{
  account::Account,
  event::{Event, Topic},
  id::SerialId,
  meter::validate_reading,
  store::{Entity, EntityKind, RecordStore},
  user::{NationalId, User, validate_name, validate_secret},
};
use tokio::runtime::Handle;

use crate::{
  Error, Result,
  bus::{EventBus, Subscriber},
  config::EngineConfig,
  coordinator::ConsistencyCoordinator,
  entity::EntityStore,
  meter::{MeterActor, MeterStatus},
  secret::SecretHasher,
};

// ─── Reports ─────────────────────────────────────────────────────────────────

/// A load or save of one entity kind that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
  pub kind:    EntityKind,
  pub message: String,
}

/// Outcome of a bulk load or save. Failures are warnings: the in-memory state
/// stays authoritative for the rest of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistenceReport {
  /// Records loaded or written successfully.
  pub records:            usize,
  /// Accounts dropped at load because their user or meter was missing.
  pub orphans_removed:    usize,
  /// Accounts dropped at load because an earlier account had the same meter.
  pub duplicates_removed: usize,
  pub failures:           Vec<PersistenceFailure>,
}

impl PersistenceReport {
  pub fn is_clean(&self) -> bool { self.failures.is_empty() }

  fn failed(&self, kind: EntityKind) -> bool { self.failures.iter().any(|f| f.kind == kind) }

  fn record<E: std::fmt::Display>(&mut self, kind: EntityKind, outcome: Result<usize, E>) {
    match outcome {
      Ok(n) => self.records += n,
      Err(e) => {
        tracing::error!(%kind, error = %e, "persistence failed");
        self.failures.push(PersistenceFailure { kind, message: e.to_string() });
      }
    }
  }
}

/// Bring loaded accounts back in line with the invariants: at most one
/// account per meter, and only for users and meters that exist. Files written
/// by a single logout are consistent; hand-edited ones may not be.
///
/// Orphans are only judged when users and meters both loaded. A failed load
/// leaves its store empty, which says nothing about what the file held.
fn reconcile_accounts(
  users: &EntityStore<User>,
  meters: &EntityStore<MeterActor>,
  accounts: &EntityStore<Account>,
  report: &mut PersistenceReport,
) {
  let check_references = !report.failed(EntityKind::User) && !report.failed(EntityKind::Meter);
  if !check_references {
    tracing::warn!("users or meters failed to load, keeping every loaded account");
  }

  let mut claimed = HashSet::new();
  for account in accounts.list() {
    if !claimed.insert(account.meter_id.clone()) {
      tracing::warn!(
        account = %account.account_id,
        meter = %account.meter_id,
        "dropping second account for the same meter"
      );
      accounts.delete(account.key());
      report.duplicates_removed += 1;
      continue;
    }

    if check_references
      && (!users.contains(account.user_id.as_str()) || !meters.contains(account.meter_id.as_str()))
    {
      tracing::warn!(account = %account.account_id, "dropping account with missing user or meter");
      accounts.delete(account.key());
      report.orphans_removed += 1;
    }
  }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

struct System {
  runtime:  Handle,
  bus:      Arc<EventBus>,
  users:    Arc<EntityStore<User>>,
  meters:   Arc<EntityStore<MeterActor>>,
  accounts: Arc<EntityStore<Account>>,
}

impl System {
  fn meter(&self, meter_id: &str) -> Result<MeterActor> {
    let key = SerialId::parse(meter_id)?;
    self
      .meters
      .find(key.as_str())
      .ok_or_else(|| Error::UnknownMeter(key.to_string()))
  }

  fn start_meter(&self, meter: &MeterActor) {
    meter.start(&self.runtime, Arc::clone(&self.bus));
  }
}

// ─── Facade ──────────────────────────────────────────────────────────────────

pub struct SessionFacade<P: RecordStore> {
  backend: P,
  config:  EngineConfig,
  hasher:  SecretHasher,
  system:  Option<System>,
  session: Option<NationalId>,
}

impl<P: RecordStore> SessionFacade<P> {
  pub fn new(backend: P, config: EngineConfig) -> Result<Self> {
    let hasher = SecretHasher::new(&config.secret_hash)?;
    Ok(Self { backend, config, hasher, system: None, session: None })
  }

  pub fn backend(&self) -> &P { &self.backend }

  pub fn is_initialized(&self) -> bool { self.system.is_some() }

  pub fn has_session(&self) -> bool { self.session.is_some() }

  fn system(&self) -> Result<&System> { self.system.as_ref().ok_or(Error::NotInitialized) }

  #[cfg(test)]
  pub(crate) fn meter_actor(&self, meter_id: &str) -> Option<MeterActor> {
    self.system().ok()?.meter(meter_id).ok()
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// Build the stores, load persisted state, start one actor per meter and
  /// wire the coordinator. Only the first call does anything.
  ///
  /// Must be called from within a tokio runtime; meters are spawned on it.
  pub async fn initialize(&mut self) -> PersistenceReport {
    if self.system.is_some() {
      tracing::debug!("already initialised");
      return PersistenceReport::default();
    }

    let bus = Arc::new(EventBus::new());
    let users = Arc::new(EntityStore::<User>::new(Arc::clone(&bus)));
    let meters = Arc::new(EntityStore::<MeterActor>::new(Arc::clone(&bus)));
    let accounts = Arc::new(EntityStore::<Account>::new(Arc::clone(&bus)));

    let mut report = PersistenceReport::default();
    report.record(EntityKind::User, users.load_all(&self.backend).await);
    report.record(EntityKind::Meter, meters.load_all(&self.backend).await);
    report.record(EntityKind::Account, accounts.load_all(&self.backend).await);

    reconcile_accounts(&users, &meters, &accounts, &mut report);

    Arc::new(ConsistencyCoordinator::new(&accounts)).attach(&bus);
    bus.subscribe_fn(Topic::MeterThresholdCrossed, "threshold-log", |event: &Event| {
      tracing::warn!(
        meter = %event.subject_id,
        prior = ?event.prior_reading,
        "reading passed the limit and was reset to zero"
      );
      Ok(())
    });

    let system = System { runtime: Handle::current(), bus, users, meters, accounts };
    let interval = self.config.meter_interval();
    for meter in system.meters.list() {
      meter.set_interval(interval);
      system.start_meter(&meter);
    }

    tracing::info!(
      users = system.users.len(),
      meters = system.meters.len(),
      accounts = system.accounts.len(),
      warnings = report.failures.len(),
      "system initialised"
    );
    self.system = Some(system);
    report
  }

  /// Write all three stores to the backend. Failures are reported, never
  /// fatal.
  pub async fn persist_all(&self) -> Result<PersistenceReport> {
    let system = self.system()?;
    let mut report = PersistenceReport::default();
    report.record(EntityKind::User, system.users.persist_all(&self.backend).await);
    report.record(EntityKind::Meter, system.meters.persist_all(&self.backend).await);
    report.record(EntityKind::Account, system.accounts.persist_all(&self.backend).await);
    tracing::info!(records = report.records, warnings = report.failures.len(), "state persisted");
    Ok(report)
  }

  /// Stop every meter and wait until their tasks have exited.
  pub async fn shutdown(&mut self) {
    let Some(system) = self.system.as_ref() else {
      return;
    };
    let meters = system.meters.list();
    for meter in &meters {
      meter.stop();
    }
    for meter in &meters {
      meter.stopped().await;
    }
    tracing::info!(meters = meters.len(), "all meters stopped");
  }

  /// Register an additional subscriber on the system bus.
  pub fn subscribe(&self, topic: Topic, subscriber: Arc<dyn Subscriber>) -> Result<()> {
    self.system()?.bus.subscribe(topic, subscriber);
    Ok(())
  }

  pub fn subscribe_fn<F>(&self, topic: Topic, name: &str, handler: F) -> Result<()>
  where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.system()?.bus.subscribe_fn(topic, name, handler);
    Ok(())
  }

  // ── Session ───────────────────────────────────────────────────────────────

  pub fn login(&mut self, user_id: &str, secret: &str) -> Result<User> {
    let system = self.system()?;
    if self.session.is_some() {
      return Err(Error::SessionAlreadyActive);
    }

    let user = NationalId::parse(user_id)
      .ok()
      .and_then(|id| system.users.find(id.as_str()))
      .ok_or(Error::AuthenticationFailed)?;

    if !self.hasher.verify(secret, &user.secret_hash) {
      tracing::warn!(user = %user.user_id, "login rejected");
      return Err(Error::AuthenticationFailed);
    }

    tracing::info!(user = %user.user_id, "logged in");
    self.session = Some(user.user_id.clone());
    Ok(user)
  }

  /// End the session and checkpoint every store to the backend.
  pub async fn logout(&mut self) -> Result<PersistenceReport> {
    self.system()?;
    let user = self.session.take().ok_or(Error::NoActiveSession)?;
    tracing::info!(%user, "logged out");
    self.persist_all().await
  }

  /// The user holding the session, if any.
  pub fn session_user(&self) -> Option<User> {
    let system = self.system.as_ref()?;
    system.users.find(self.session.as_ref()?.as_str())
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  fn parse_new_user_id(&self, raw: &str) -> Result<NationalId> {
    let id = if self.config.strict_national_id {
      NationalId::parse_strict(raw)?
    } else {
      NationalId::parse(raw)?
    };
    Ok(id)
  }

  pub fn register_user(&self, user_id: &str, name: &str, secret: &str) -> Result<User> {
    let system = self.system()?;
    let user_id = self.parse_new_user_id(user_id)?;
    let name = validate_name(name)?;
    validate_secret(secret)?;

    if system.users.contains(user_id.as_str()) {
      return Err(Error::DuplicateUser(user_id.to_string()));
    }

    let user = User::new(user_id, &name, self.hasher.hash(secret)?)?;
    system
      .users
      .create(user.clone())
      .map_err(|dup| Error::DuplicateUser(dup.key))?;

    tracing::info!(user = %user.user_id, "user registered");
    Ok(user)
  }

  pub fn update_user(&self, user_id: &str, name: &str, secret: &str) -> Result<User> {
    let system = self.system()?;
    let key = NationalId::parse(user_id)?;
    let name = validate_name(name)?;
    validate_secret(secret)?;
    let secret_hash = self.hasher.hash(secret)?;

    let user = system
      .users
      .update(key.as_str(), |u| {
        u.name = name;
        u.secret_hash = secret_hash;
        u.clone()
      })
      .ok_or_else(|| Error::UnknownUser(key.to_string()))?;

    tracing::info!(user = %user.user_id, "user updated");
    Ok(user)
  }

  pub fn find_user(&self, user_id: &str) -> Result<Option<User>> {
    let key = NationalId::parse(user_id)?;
    Ok(self.system()?.users.find(key.as_str()))
  }

  pub fn list_users(&self) -> Result<Vec<User>> { Ok(self.system()?.users.list()) }

  /// Delete a user and, through the coordinator, every account it owns.
  pub fn delete_user(&self, user_id: &str) -> Result<User> {
    let system = self.system()?;
    let key = NationalId::parse(user_id)?;

    if self.session.as_ref() == Some(&key) {
      return Err(Error::CannotDeleteActiveSession(key.to_string()));
    }

    let user = system
      .users
      .delete(key.as_str())
      .ok_or_else(|| Error::UnknownUser(key.to_string()))?;
    tracing::info!(user = %user.user_id, "user deleted");
    Ok(user)
  }

  // ── Meters ────────────────────────────────────────────────────────────────

  pub fn create_meter(&self, initial_reading: f64) -> Result<MeterStatus> {
    let system = self.system()?;
    let reading = validate_reading(initial_reading)?;
    let interval = self.config.meter_interval();

    let meter = system
      .meters
      .create_with_generated_id(|id| MeterActor::new(id, reading).with_interval(interval));
    system.start_meter(&meter);

    tracing::info!(meter = %meter.meter_id(), reading, "meter created");
    Ok(meter.status())
  }

  pub fn find_meter(&self, meter_id: &str) -> Result<Option<MeterStatus>> {
    match self.system()?.meter(meter_id) {
      Ok(meter) => Ok(Some(meter.status())),
      Err(Error::UnknownMeter(_)) => Ok(None),
      Err(e) => Err(e),
    }
  }

  pub fn list_meters(&self) -> Result<Vec<MeterStatus>> {
    Ok(self.system()?.meters.list().iter().map(MeterActor::status).collect())
  }

  pub fn set_meter_reading(&self, meter_id: &str, reading: f64) -> Result<MeterStatus> {
    let meter = self.system()?.meter(meter_id)?;
    meter.set_reading(reading)?;
    Ok(meter.status())
  }

  /// Stop a meter, then delete it and, through the coordinator, its account.
  pub fn delete_meter(&self, meter_id: &str) -> Result<MeterStatus> {
    let system = self.system()?;
    let meter = system.meter(meter_id)?;

    // The actor must be quiet before the store entry disappears.
    meter.stop();
    system.meters.delete(meter.key());

    tracing::info!(meter = %meter.meter_id(), "meter deleted");
    Ok(meter.status())
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  pub fn create_account(&self, user_id: &str, meter_id: &str) -> Result<Account> {
    let system = self.system()?;

    let user_id = NationalId::parse(user_id)?;
    if !system.users.contains(user_id.as_str()) {
      return Err(Error::UnknownUser(user_id.to_string()));
    }
    let meter = system.meter(meter_id)?;
    let meter_key = meter.meter_id().clone();

    let account = system
      .accounts
      .create_with_generated_id_unless(
        |a| a.meter_id == meter_key,
        |account_id| Account {
          account_id,
          user_id,
          meter_id: meter_key.clone(),
          last_reading: meter.reading(),
        },
      )
      .map_err(|existing| Error::DuplicateAccountForMeter {
        meter_id:   existing.meter_id.to_string(),
        account_id: existing.account_id.to_string(),
      })?;

    tracing::info!(
      account = %account.account_id,
      user = %account.user_id,
      meter = %account.meter_id,
      reading = account.last_reading,
      "account created"
    );
    Ok(account)
  }

  pub fn find_account(&self, account_id: &str) -> Result<Option<Account>> {
    let key = SerialId::parse(account_id)?;
    Ok(self.system()?.accounts.find(key.as_str()))
  }

  pub fn list_accounts(&self) -> Result<Vec<Account>> { Ok(self.system()?.accounts.list()) }

  pub fn delete_account(&self, account_id: &str) -> Result<Account> {
    let key = SerialId::parse(account_id)?;
    let account = self
      .system()?
      .accounts
      .delete(key.as_str())
      .ok_or_else(|| Error::UnknownAccount(key.to_string()))?;
    tracing::info!(account = %account.account_id, "account deleted");
    Ok(account)
  }

  /// Re-snapshot the account's meter reading.
  pub fn refresh_account_reading(&self, account_id: &str) -> Result<Account> {
    let system = self.system()?;
    let key = SerialId::parse(account_id)?;
    let account = system
      .accounts
      .find(key.as_str())
      .ok_or_else(|| Error::UnknownAccount(key.to_string()))?;
    let reading = system.meter(account.meter_id.as_str())?.reading();

    system
      .accounts
      .update(key.as_str(), |a| {
        a.last_reading = reading;
        a.clone()
      })
      .ok_or_else(|| Error::UnknownAccount(key.to_string()))
  }
}

impl<P: RecordStore> Drop for SessionFacade<P> {
  fn drop(&mut self) {
    if let Some(system) = &self.system {
      for meter in system.meters.list() {
        meter.stop();
      }
    }
  }
}
