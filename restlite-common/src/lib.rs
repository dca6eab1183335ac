//! restlite Common Types and Utilities
//!
//! Shared types, configuration, and error handling for the engine and the REST layer.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::RestliteConfig;
pub use error::{Error, Result};
