//! restlite REST API Service
//!
//! Exposes the dynamic schema and query engine over HTTP:
//! - Table creation, introspection and deletion
//! - Row listing with filters, search, ordering, projection and relation expansion
//! - Bulk by-key reads, updates and deletes
//! - Row change events for broadcast subscribers

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod changes;
pub mod handlers;
pub mod server;

pub use changes::{ChangeEvent, ChangeListener, ChangeType};
pub use handlers::RestState;
pub use server::{configure, RestServer};
