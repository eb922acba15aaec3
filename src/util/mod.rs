//! Shared utility helpers.

pub mod error;

pub use error::{FilterError, Result as FilterResult};
