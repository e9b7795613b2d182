//! The meter actor: one autonomously advancing reading per meter.
//!
//! A [`MeterActor`] is plain data plus a control handle. `start` spawns a
//! tokio task that sleeps for the configured interval, then adds a small
//! random consumption to the reading. Readings that would pass
//! [`LIMIT_MAX`] wrap to zero and publish
//! [`Topic::MeterThresholdCrossed`](hydro_core::event::Topic).
//!
//! # Stopping
//!
//! `stop` cancels the task's sleep and returns immediately. Once it has
//! returned the reading is never touched by the cycle again; the task itself
//! exits at its next wake-up. Use `stopped` when the task must be gone, e.g.
//! before process exit.

use std::{
  fmt,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use hydro_core::{
  event::Event,
  id::SerialId,
  meter::{
    DEFAULT_CYCLE_INTERVAL, LIMIT_MAX, MAX_CYCLE_DELTA, MIN_CYCLE_DELTA, MeterRecord,
    validate_reading,
  },
  store::{Entity, EntityKind},
};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::bus::EventBus;

/// Point-in-time view of a meter for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterStatus {
  pub meter_id: SerialId,
  pub reading:  f64,
  pub running:  bool,
}

/// Outcome of one reading cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cycle {
  Advanced,
  Wrapped { prior: f64 },
  Stopped,
}

struct Control {
  cancel: CancellationToken,
  task:   Option<JoinHandle<()>>,
}

struct Inner {
  meter_id: SerialId,
  /// Written only by the cycle and by `set_reading`; both take this lock.
  reading:  Mutex<f64>,
  interval: Mutex<Duration>,
  running:  AtomicBool,
  control:  Mutex<Option<Control>>,
}

/// A live meter. Cloning is cheap and every clone controls the same task.
#[derive(Clone)]
pub struct MeterActor {
  inner: Arc<Inner>,
}

impl MeterActor {
  /// A stopped meter. `reading` is expected to be validated already.
  pub fn new(meter_id: SerialId, reading: f64) -> Self {
    Self {
      inner: Arc::new(Inner {
        meter_id,
        reading: Mutex::new(reading),
        interval: Mutex::new(DEFAULT_CYCLE_INTERVAL),
        running: AtomicBool::new(false),
        control: Mutex::new(None),
      }),
    }
  }

  pub fn with_interval(self, interval: Duration) -> Self {
    self.set_interval(interval);
    self
  }

  // ── Accessors ─────────────────────────────────────────────────────────────

  pub fn meter_id(&self) -> &SerialId { &self.inner.meter_id }

  pub fn reading(&self) -> f64 { *self.inner.reading.lock() }

  pub fn interval(&self) -> Duration { *self.inner.interval.lock() }

  /// Takes effect from the next cycle on.
  pub fn set_interval(&self, interval: Duration) {
    *self.inner.interval.lock() = interval.max(Duration::from_millis(1));
  }

  pub fn is_running(&self) -> bool { self.inner.running.load(Ordering::SeqCst) }

  pub fn status(&self) -> MeterStatus {
    MeterStatus {
      meter_id: self.inner.meter_id.clone(),
      reading:  self.reading(),
      running:  self.is_running(),
    }
  }

  /// Administrative override of the reading, independent of the cycle.
  pub fn set_reading(&self, reading: f64) -> hydro_core::Result<()> {
    let reading = validate_reading(reading)?;
    let previous = std::mem::replace(&mut *self.inner.reading.lock(), reading);
    tracing::info!(
      meter = %self.inner.meter_id,
      previous,
      reading,
      "reading overridden by operator"
    );
    Ok(())
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// Spawn the reading cycle on `runtime`. Returns `false` if the meter is
  /// already running.
  pub fn start(&self, runtime: &Handle, bus: Arc<EventBus>) -> bool {
    let mut control = self.inner.control.lock();
    if control.as_ref().is_some_and(|c| !c.cancel.is_cancelled()) {
      return false;
    }

    let cancel = CancellationToken::new();
    self.inner.running.store(true, Ordering::SeqCst);
    let task = runtime.spawn(self.clone().run(bus, cancel.clone()));
    *control = Some(Control { cancel, task: Some(task) });

    tracing::debug!(meter = %self.inner.meter_id, interval = ?self.interval(), "meter started");
    true
  }

  /// Request the cycle to stop. Idempotent and non-blocking; returns `true`
  /// only for the call that actually stopped a running meter.
  pub fn stop(&self) -> bool {
    let control = self.inner.control.lock();
    let Some(control) = control.as_ref() else {
      return false;
    };
    if control.cancel.is_cancelled() {
      return false;
    }

    control.cancel.cancel();
    // A cycle that already passed its cancellation check finishes its write
    // under the reading lock; wait it out so nothing changes after we return.
    drop(self.inner.reading.lock());
    self.inner.running.store(false, Ordering::SeqCst);

    tracing::info!(meter = %self.inner.meter_id, reading = self.reading(), "meter stopped");
    true
  }

  /// Wait until the cycle task has exited. Returns at once if the meter was
  /// never started or has already been awaited.
  pub async fn stopped(&self) {
    let task = self
      .inner
      .control
      .lock()
      .as_mut()
      .and_then(|c| c.task.take());

    if let Some(task) = task
      && let Err(e) = task.await
    {
      tracing::debug!(meter = %self.inner.meter_id, error = %e, "meter task ended abnormally");
    }
  }

  // ── Cycle ─────────────────────────────────────────────────────────────────

  async fn run(self, bus: Arc<EventBus>, cancel: CancellationToken) {
    loop {
      let interval = self.interval();
      tokio::select! {
        biased;
        _ = cancel.cancelled() => break,
        _ = tokio::time::sleep(interval) => {}
      }

      match self.cycle(draw_delta(), &cancel) {
        Cycle::Advanced => {}
        Cycle::Stopped => break,
        Cycle::Wrapped { prior } => {
          tracing::debug!(meter = %self.inner.meter_id, prior, "reading wrapped");
          bus.publish(&Event::threshold_crossed(self.inner.meter_id.to_string(), prior));
        }
      }
    }
    // The flag is owned by `stop()`: a restarted meter may already have a
    // newer task running by the time this one exits.
  }

  fn cycle(&self, delta: f64, cancel: &CancellationToken) -> Cycle {
    let mut reading = self.inner.reading.lock();
    if cancel.is_cancelled() {
      return Cycle::Stopped;
    }

    let prior = *reading;
    let next = prior + delta;
    if next > LIMIT_MAX {
      *reading = 0.0;
      Cycle::Wrapped { prior }
    } else {
      *reading = next;
      Cycle::Advanced
    }
  }
}

fn draw_delta() -> f64 { rand::thread_rng().gen_range(MIN_CYCLE_DELTA..MAX_CYCLE_DELTA) }

impl Entity for MeterActor {
  const KIND: EntityKind = EntityKind::Meter;

  fn key(&self) -> &str { self.inner.meter_id.as_str() }

  fn to_fields(&self) -> Vec<String> {
    MeterRecord { meter_id: self.inner.meter_id.clone(), reading: self.reading() }.to_fields()
  }

  fn from_fields(fields: &[&str]) -> hydro_core::Result<Self> {
    let record = MeterRecord::from_fields(fields)?;
    Ok(Self::new(record.meter_id, record.reading))
  }
}

impl fmt::Debug for MeterActor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MeterActor")
      .field("meter_id", &self.inner.meter_id)
      .field("reading", &self.reading())
      .field("running", &self.is_running())
      .finish()
  }
}
