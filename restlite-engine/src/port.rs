//! Row access port
//!
//! The only place that talks to the SQLite driver. Compiled statements go in,
//! rows, scalars and change counts come out.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use restlite_common::config::DatabaseConfig;
use restlite_common::error::{Error, Result};

use crate::stmt::Statement;

/// A materialized row keyed by result column name
pub type Row = serde_json::Map<String, JsonValue>;

/// Outcome of a write statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub changes: u64,
    pub last_insert_rowid: i64,
}

/// Execution boundary between the compilers and the engine driver
pub trait RowAccess: Send + Sync {
    /// Run a read statement and materialize every row
    fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Row>>;

    /// Run a write statement
    fn execute(&self, stmt: &Statement) -> Result<Execution>;

    /// Run several statements atomically
    fn execute_batch(&self, stmts: &[Statement]) -> Result<()>;

    /// Run a read statement and return its first row
    fn fetch_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        Ok(self.fetch_all(stmt)?.into_iter().next())
    }
}

/// SQLite store holding the single process-wide connection
pub struct SqliteStore {
    connection: Mutex<Connection>,
    verbose: bool,
}

impl SqliteStore {
    /// Open the database described by `config`
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let connection = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(classify)?;

        if config.wal && !config.is_in_memory() {
            let mode: String = connection
                .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                .map_err(classify)?;
            info!(journal_mode = %mode, "Configured journal mode");
        }

        connection
            .pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(classify)?;

        info!(path = %config.path, "Opened SQLite database");

        Ok(Self {
            connection: Mutex::new(connection),
            verbose: config.verbose,
        })
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the database.
    pub fn in_memory() -> Result<Self> {
        Self::open(&DatabaseConfig::default())
    }

    fn trace(&self, stmt: &Statement) {
        if self.verbose {
            info!(sql = %stmt.sql, params = stmt.params.len(), "executing statement");
        } else {
            debug!(sql = %stmt.sql, params = stmt.params.len(), "executing statement");
        }
    }
}

impl RowAccess for SqliteStore {
    fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.trace(stmt);
        let connection = self.connection.lock();

        let mut prepared = connection.prepare_cached(&stmt.sql).map_err(classify)?;
        let names: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = prepared
            .query(params_from_iter(stmt.params.iter()))
            .map_err(classify)?;

        let mut ret = Vec::new();
        while let Some(row) = rows.next().map_err(classify)? {
            let mut record = Row::new();
            for (index, name) in names.iter().enumerate() {
                let value = row.get_ref(index).map_err(classify)?;
                record.insert(name.clone(), json_from_sql(value));
            }
            ret.push(record);
        }

        Ok(ret)
    }

    fn execute(&self, stmt: &Statement) -> Result<Execution> {
        self.trace(stmt);
        let connection = self.connection.lock();

        let changes = connection
            .prepare_cached(&stmt.sql)
            .and_then(|mut prepared| prepared.execute(params_from_iter(stmt.params.iter())))
            .map_err(classify)?;

        Ok(Execution {
            changes: changes as u64,
            last_insert_rowid: connection.last_insert_rowid(),
        })
    }

    fn execute_batch(&self, stmts: &[Statement]) -> Result<()> {
        let mut connection = self.connection.lock();
        let tx = connection.transaction().map_err(classify)?;

        for stmt in stmts {
            self.trace(stmt);
            tx.execute(&stmt.sql, params_from_iter(stmt.params.iter()))
                .map_err(classify)?;
        }

        // Dropping the transaction on an early return rolls it back
        tx.commit().map_err(classify)
    }
}

fn json_from_sql(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(v) => JsonValue::from(v),
        ValueRef::Real(v) => {
            serde_json::Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
        }
        ValueRef::Text(v) => JsonValue::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => JsonValue::String(STANDARD.encode(v)),
    }
}

/// Map a driver error onto the restlite error kinds
fn classify(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if matches!(
                failure.code,
                ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch
            ) =>
        {
            Error::ConstraintViolation(message.clone().unwrap_or_else(|| err.to_string()))
        }
        rusqlite::Error::SqliteFailure(_, Some(message)) => match existing_name(message) {
            Some(name) => Error::TableAlreadyExists(name.to_string()),
            None => Error::DatabaseError(err.to_string()),
        },
        _ => Error::DatabaseError(err.to_string()),
    }
}

/// Object name from "table notes already exists in CREATE TABLE ..."
fn existing_name(message: &str) -> Option<&str> {
    let (head, _) = message.split_once(" already exists")?;
    let name = head.rsplit(' ').next()?.trim_matches(|c| c == '"' || c == '`');
    (!name.is_empty()).then_some(name)
}
