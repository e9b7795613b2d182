//! The running hydro back office: entity stores, the event bus, live meters,
//! the account consistency coordinator and the session facade that ties them
//! together.
//!
//! Storage is pluggable through [`hydro_core::store::RecordStore`]; the
//! engine itself never touches the filesystem.

pub mod bus;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod meter;
pub mod secret;
pub mod session;

pub use bus::{EventBus, PublishReport, Subscriber};
pub use config::{EngineConfig, SecretHashConfig};
pub use entity::{DuplicateKey, EntityStore};
pub use error::{Error, Result};
pub use meter::{MeterActor, MeterStatus};
pub use session::{PersistenceFailure, PersistenceReport, SessionFacade};
