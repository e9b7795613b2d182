//! Domain events carried by the in-process bus.
//!
//! Events are immutable facts: they are produced once by the action that
//! caused them, handed to every subscriber of their topic and then dropped.
//! Nothing here is ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Named event category on the bus.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Display,
  EnumString,
  EnumIter,
  Serialize,
  Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  /// A user was removed from the user store.
  UserDeleted,
  /// A meter was stopped and removed from the meter store.
  MeterDeleted,
  /// A meter's reading passed [`LIMIT_MAX`](crate::meter::LIMIT_MAX) and was
  /// reset to zero.
  MeterThresholdCrossed,
}

/// A single published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
  pub topic:         Topic,
  /// Identity of the user or meter the event is about.
  pub subject_id:    String,
  /// For [`Topic::MeterThresholdCrossed`]: the reading before the reset.
  pub prior_reading: Option<f64>,
  pub occurred_at:   DateTime<Utc>,
}

impl Event {
  pub fn new(topic: Topic, subject_id: impl Into<String>) -> Self {
    Self {
      topic,
      subject_id: subject_id.into(),
      prior_reading: None,
      occurred_at: Utc::now(),
    }
  }

  pub fn user_deleted(user_id: impl Into<String>) -> Self {
    Self::new(Topic::UserDeleted, user_id)
  }

  pub fn meter_deleted(meter_id: impl Into<String>) -> Self {
    Self::new(Topic::MeterDeleted, meter_id)
  }

  pub fn threshold_crossed(meter_id: impl Into<String>, prior_reading: f64) -> Self {
    Self {
      prior_reading: Some(prior_reading),
      ..Self::new(Topic::MeterThresholdCrossed, meter_id)
    }
  }
}
