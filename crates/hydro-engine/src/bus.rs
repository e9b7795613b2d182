//! Synchronous, in-process topic dispatch.
//!
//! `publish` runs every subscriber of the event's topic on the caller's stack,
//! in subscription order, before it returns. A subscriber that fails or
//! panics is logged and counted; the remaining subscribers still run.

use std::{
  fmt,
  panic::{AssertUnwindSafe, catch_unwind},
  sync::Arc,
};

use hydro_core::event::{Event, Topic};
use parking_lot::{ReentrantMutex, RwLock};

// ─── Subscriber ──────────────────────────────────────────────────────────────

/// Something that reacts to published events.
pub trait Subscriber: Send + Sync {
  /// Short label used in logs.
  fn name(&self) -> &str;

  fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

struct FnSubscriber<F> {
  name:    String,
  handler: F,
}

impl<F> Subscriber for FnSubscriber<F>
where
  F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
  fn name(&self) -> &str { &self.name }

  fn handle(&self, event: &Event) -> anyhow::Result<()> { (self.handler)(event) }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Outcome of a single [`EventBus::publish`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
  pub delivered: usize,
  pub failed:    usize,
}

impl PublishReport {
  pub fn is_clean(&self) -> bool { self.failed == 0 }
}

// ─── Bus ─────────────────────────────────────────────────────────────────────

pub struct EventBus {
  subscribers: RwLock<Vec<(Topic, Arc<dyn Subscriber>)>>,
  /// Serialises publishes across threads. Re-entrant so a subscriber may
  /// publish from inside its handler.
  dispatch:    ReentrantMutex<()>,
}

impl EventBus {
  pub fn new() -> Self {
    Self {
      subscribers: RwLock::new(Vec::new()),
      dispatch:    ReentrantMutex::new(()),
    }
  }

  pub fn subscribe(&self, topic: Topic, subscriber: Arc<dyn Subscriber>) {
    tracing::debug!(%topic, subscriber = subscriber.name(), "subscribed");
    self.subscribers.write().push((topic, subscriber));
  }

  /// Subscribe a closure under `name`.
  pub fn subscribe_fn<F>(&self, topic: Topic, name: impl Into<String>, handler: F)
  where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
  {
    self.subscribe(topic, Arc::new(FnSubscriber { name: name.into(), handler }));
  }

  pub fn subscriber_count(&self, topic: Topic) -> usize {
    self.subscribers.read().iter().filter(|(t, _)| *t == topic).count()
  }

  pub fn publish(&self, event: &Event) -> PublishReport {
    let _serial = self.dispatch.lock();

    // Snapshot so handlers never run under the subscriber lock.
    let targets: Vec<Arc<dyn Subscriber>> = self
      .subscribers
      .read()
      .iter()
      .filter(|(topic, _)| *topic == event.topic)
      .map(|(_, s)| Arc::clone(s))
      .collect();

    let mut report = PublishReport::default();
    for subscriber in targets {
      match catch_unwind(AssertUnwindSafe(|| subscriber.handle(event))) {
        Ok(Ok(())) => report.delivered += 1,
        Ok(Err(error)) => {
          report.failed += 1;
          tracing::warn!(
            topic = %event.topic,
            subject = %event.subject_id,
            subscriber = subscriber.name(),
            error = %format!("{error:#}"),
            "subscriber failed"
          );
        }
        Err(panic) => {
          report.failed += 1;
          tracing::error!(
            topic = %event.topic,
            subject = %event.subject_id,
            subscriber = subscriber.name(),
            panic = panic_message(panic.as_ref()),
            "subscriber panicked"
          );
        }
      }
    }

    report
  }
}

impl Default for EventBus {
  fn default() -> Self { Self::new() }
}

impl fmt::Debug for EventBus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventBus")
      .field("subscribers", &self.subscribers.read().len())
      .finish()
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
  if let Some(s) = payload.downcast_ref::<&'static str>() {
    *s
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.as_str()
  } else {
    "non-string panic payload"
  }
}

#[cfg(test)]
mod tests {
  use parking_lot::Mutex;

  use super::*;

  fn recorder(bus: &EventBus, topic: Topic, label: &'static str, log: &Arc<Mutex<Vec<String>>>) {
    let log = Arc::clone(log);
    bus.subscribe_fn(topic, label, move |event| {
      log.lock().push(format!("{label}:{}", event.subject_id));
      Ok(())
    });
  }

  #[test]
  fn delivers_in_subscription_order_to_matching_topic_only() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    recorder(&bus, Topic::UserDeleted, "first", &log);
    recorder(&bus, Topic::MeterDeleted, "meters", &log);
    recorder(&bus, Topic::UserDeleted, "second", &log);

    let report = bus.publish(&Event::user_deleted("u1"));

    assert_eq!(report, PublishReport { delivered: 2, failed: 0 });
    assert_eq!(*log.lock(), ["first:u1", "second:u1"]);
  }

  #[test]
  fn publish_without_subscribers_is_a_no_op() {
    let bus = EventBus::new();
    let report = bus.publish(&Event::meter_deleted("0000001"));
    assert_eq!(report, PublishReport::default());
  }

  #[test]
  fn failing_and_panicking_subscribers_do_not_stop_others() {
    let bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    bus.subscribe_fn(Topic::UserDeleted, "fails", |_| anyhow::bail!("boom"));
    bus.subscribe_fn(Topic::UserDeleted, "panics", |_| panic!("kaboom"));
    recorder(&bus, Topic::UserDeleted, "survivor", &log);

    let report = bus.publish(&Event::user_deleted("u1"));

    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 2);
    assert!(!report.is_clean());
    assert_eq!(*log.lock(), ["survivor:u1"]);
  }

  #[test]
  fn subscribers_may_publish_reentrantly() {
    let bus = Arc::new(EventBus::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    recorder(&bus, Topic::MeterDeleted, "inner", &log);

    let weak = Arc::downgrade(&bus);
    bus.subscribe_fn(Topic::UserDeleted, "relay", move |event| {
      if let Some(bus) = weak.upgrade() {
        bus.publish(&Event::meter_deleted(event.subject_id.clone()));
      }
      Ok(())
    });

    let report = bus.publish(&Event::user_deleted("x"));
    assert!(report.is_clean());
    assert_eq!(*log.lock(), ["inner:x"]);
  }

  #[test]
  fn counts_subscribers_per_topic() {
    let bus = EventBus::new();
    bus.subscribe_fn(Topic::UserDeleted, "a", |_| Ok(()));
    bus.subscribe_fn(Topic::UserDeleted, "b", |_| Ok(()));
    assert_eq!(bus.subscriber_count(Topic::UserDeleted), 2);
    assert_eq!(bus.subscriber_count(Topic::MeterThresholdCrossed), 0);
  }
}
