//! restlite Dynamic Schema & Query Engine
//!
//! Compiles declarative table schemas and REST query parameters into SQLite
//! statements, and runs them through a single shared connection.
//!
//! # Example
//!
//! ```ignore
//! use restlite_engine::{Engine, QueryRequest};
//!
//! let engine = Engine::open(&config.database, config.api.next_link)?;
//! let page = engine.list_rows("books", &QueryRequest::default(), "/tables/books/rows")?;
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod ddl;
pub mod engine;
pub mod filter;
pub mod ident;
pub mod pagination;
pub mod port;
pub mod query;
pub mod relation;
pub mod stmt;

pub use catalog::{Catalog, TableShape};
pub use ddl::{ColumnSpec, CompileOptions, TableSpec, UniqueConstraint};
pub use engine::{CreatedTable, Engine, InsertFields, MutationOutcome, RowPage};
pub use filter::{parse_filters, FilterClause, FilterOperator, FilterValue};
pub use pagination::{PageLinks, PageRequest};
pub use port::{Execution, Row, RowAccess, SqliteStore};
pub use query::{KeySet, QueryRequest};
pub use relation::{Expansion, RelationExpansion};
pub use stmt::{SqlValue, Statement};
