//! Flat-file backend for the hydro record store.
//!
//! One text file per entity kind, one record per line, fields joined by `-`.
//! Every save rewrites the whole file.

mod encode;
mod store;

pub mod error;

pub use encode::SEPARATOR;
pub use error::{Error, Result};
pub use store::{FileNames, FileStore};

#[cfg(test)]
mod tests;
