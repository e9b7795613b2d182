//! Core types and trait definitions for the hydro back office.
//!
//! This crate holds the domain records (users, meters, accounts), their
//! validation rules, the event vocabulary and the persistence abstraction.
//! It performs no I/O; every other crate depends on it.

// We intentionally use native `async fn` in traits.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod error;
pub mod event;
pub mod id;
pub mod meter;
pub mod store;
pub mod user;

pub use error::{Error, Result};
