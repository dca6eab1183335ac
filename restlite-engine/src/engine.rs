//! Engine facade
//!
//! Wires the catalog, compilers and row access port together for each REST
//! operation. Every call reads the catalog afresh.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use restlite_common::config::{DatabaseConfig, NextLinkPolicy};
use restlite_common::error::{Error, Result};
use restlite_common::types::{ColumnInfo, TableSummary};

use crate::catalog::Catalog;
use crate::ddl::{self, CompileOptions, TableSpec};
use crate::ident::{self, quote};
use crate::pagination::page_links;
use crate::port::{Execution, Row, RowAccess, SqliteStore};
use crate::query::{self, KeySet, QueryRequest};
use crate::relation;
use crate::stmt::Statement;

/// Result of a table creation
#[derive(Debug, Clone, Serialize)]
pub struct CreatedTable {
    pub name: String,
    pub schema: Vec<ColumnInfo>,
}

/// One page of a row listing
#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
    pub data: Vec<Row>,
    pub total: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// Insert body: one object or an array of objects sharing their keys
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InsertFields {
    One(Row),
    Many(Vec<Row>),
}

impl InsertFields {
    pub fn rows(&self) -> &[Row] {
        match self {
            Self::One(row) => std::slice::from_ref(row),
            Self::Many(rows) => rows,
        }
    }
}

/// Result of a by-key update or delete
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub lookup_field: String,
    pub keys: Vec<String>,
    pub execution: Execution,
}

/// Dynamic schema and query engine
pub struct Engine {
    store: Arc<dyn RowAccess>,
    next_link: NextLinkPolicy,
}

impl Engine {
    pub fn new(store: Arc<dyn RowAccess>, next_link: NextLinkPolicy) -> Self {
        Self { store, next_link }
    }

    /// Open the SQLite database described by `config`
    pub fn open(config: &DatabaseConfig, next_link: NextLinkPolicy) -> Result<Self> {
        let store = SqliteStore::open(config)?;
        Ok(Self::new(Arc::new(store), next_link))
    }

    fn catalog(&self) -> Catalog<'_> {
        Catalog::new(self.store.as_ref())
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub fn create_table(&self, spec: &TableSpec, options: &CompileOptions) -> Result<CreatedTable> {
        let compiled = ddl::compile(spec, options)?;

        let catalog = self.catalog();
        if catalog.table_exists(&spec.name)? {
            return Err(Error::TableAlreadyExists(spec.name.clone()));
        }

        self.store.execute_batch(&compiled.ddl)?;
        info!(
            table = %spec.name,
            columns = compiled.generated_schema.len(),
            "Created table"
        );

        Ok(CreatedTable {
            name: spec.name.clone(),
            schema: catalog.columns(&spec.name)?,
        })
    }

    pub fn list_tables(
        &self,
        search: Option<&str>,
        ordering: Option<&str>,
    ) -> Result<Vec<TableSummary>> {
        self.catalog().list_tables(search, ordering)
    }

    pub fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.catalog().columns(table)
    }

    /// Drop a table, or a view of the same name
    pub fn drop_table(&self, table: &str) -> Result<()> {
        ident::validate(table)?;
        let kind = self
            .catalog()
            .object_kind(table)?
            .ok_or_else(|| Error::TableNotFound(table.to_string()))?;

        self.store.execute_batch(&[Statement::new(format!(
            "DROP {} {}",
            kind.keyword(),
            quote(table)
        ))])?;
        info!(table = %table, kind = kind.keyword(), "Dropped table");
        Ok(())
    }

    // ========================================================================
    // Rows
    // ========================================================================

    /// List one page of rows; `base` is the path used in pagination links
    pub fn list_rows(&self, table: &str, request: &QueryRequest, base: &str) -> Result<RowPage> {
        let catalog = self.catalog();
        let shape = catalog.shape(table)?;
        let expansion = relation::expand(&catalog, &shape, &request.extend_columns())?;
        let compiled = query::compile_list(&shape, &expansion, request)?;

        let mut data = self.store.fetch_all(&compiled.list)?;
        expansion.decode_rows(&mut data)?;

        let total = self
            .store
            .fetch_one(&compiled.count)?
            .and_then(|row| row.get("total").and_then(serde_json::Value::as_u64))
            .unwrap_or_default();

        let links = page_links(
            base,
            &request.link_params(),
            request.page,
            data.len(),
            total,
            self.next_link,
        );
        debug!(table = %table, rows = data.len(), total, "Listed rows");

        Ok(RowPage {
            data,
            total,
            next: links.next,
            previous: links.previous,
        })
    }

    /// Rows whose lookup field matches one of the comma separated `keys`
    pub fn get_rows(&self, table: &str, keys: &str, request: &QueryRequest) -> Result<Vec<Row>> {
        let catalog = self.catalog();
        let shape = catalog.shape(table)?;
        let keys = KeySet::parse(keys)?;
        let lookup_field = query::resolve_lookup_field(&shape, request.lookup_field.as_deref())?;
        let expansion = relation::expand(&catalog, &shape, &request.extend_columns())?;

        let stmt = query::compile_lookup(
            &shape,
            &expansion,
            &request.schema_columns(),
            &lookup_field,
            &keys,
        )?;
        let mut rows = self.store.fetch_all(&stmt)?;
        if rows.is_empty() {
            return Err(Error::RowNotFound);
        }
        expansion.decode_rows(&mut rows)?;
        Ok(rows)
    }

    pub fn insert_rows(&self, table: &str, fields: &InsertFields) -> Result<Execution> {
        let shape = self.catalog().shape(table)?;
        let stmt = query::compile_insert(&shape, fields.rows())?;
        let execution = self.store.execute(&stmt)?;
        debug!(table = %table, changes = execution.changes, "Inserted rows");
        Ok(execution)
    }

    pub fn update_rows(
        &self,
        table: &str,
        keys: &str,
        lookup_field: Option<&str>,
        fields: &Row,
    ) -> Result<MutationOutcome> {
        let shape = self.catalog().shape(table)?;
        let keys = KeySet::parse(keys)?;
        let lookup_field = query::resolve_lookup_field(&shape, lookup_field)?;

        let stmt = query::compile_update(&shape, &lookup_field, &keys, fields)?;
        let execution = self.store.execute(&stmt)?;
        debug!(table = %table, changes = execution.changes, "Updated rows");

        Ok(MutationOutcome {
            lookup_field,
            keys: keys.values().to_vec(),
            execution,
        })
    }

    /// Delete by key; nothing deleted is reported as `RowNotFound`
    pub fn delete_rows(
        &self,
        table: &str,
        keys: &str,
        lookup_field: Option<&str>,
    ) -> Result<MutationOutcome> {
        let shape = self.catalog().shape(table)?;
        let keys = KeySet::parse(keys)?;
        let lookup_field = query::resolve_lookup_field(&shape, lookup_field)?;

        let execution = self
            .store
            .execute(&query::compile_delete(&shape, &lookup_field, &keys))?;
        if execution.changes == 0 {
            return Err(Error::RowNotFound);
        }
        debug!(table = %table, changes = execution.changes, "Deleted rows");

        Ok(MutationOutcome {
            lookup_field,
            keys: keys.values().to_vec(),
            execution,
        })
    }
}
