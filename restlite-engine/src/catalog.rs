//! Catalog introspection
//!
//! Reads table, column and foreign key metadata straight from SQLite on every
//! call. Nothing is cached because tables are created and dropped through the
//! API while other requests are running.

use serde_json::Value as JsonValue;

use restlite_common::error::{Error, Result};
use restlite_common::types::{ColumnInfo, ForeignKeyInfo, TableSummary};

use crate::ident;
use crate::port::{Row, RowAccess};
use crate::query::Ordering;
use crate::stmt::{SqlValue, Statement};

/// Catalog reader over a row access port
pub struct Catalog<'a> {
    port: &'a dyn RowAccess,
}

impl<'a> Catalog<'a> {
    pub fn new(port: &'a dyn RowAccess) -> Self {
        Self { port }
    }

    /// Check whether a user table or view with this exact name exists
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.object_kind(name)?.is_some())
    }

    /// Whether `name` is a table or a view, if it exists at all
    pub fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>> {
        let stmt = Statement::with_params(
            "SELECT type FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?",
            vec![SqlValue::text(name)],
        );
        Ok(self.port.fetch_one(&stmt)?.map(|row| {
            match row.get("type").and_then(JsonValue::as_str) {
                Some("view") => ObjectKind::View,
                _ => ObjectKind::Table,
            }
        }))
    }

    /// Columns of `table` in creation order
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        ident::validate(table)?;
        if !self.table_exists(table)? {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let stmt = Statement::with_params(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid",
            vec![SqlValue::text(table)],
        );
        self.port
            .fetch_all(&stmt)?
            .into_iter()
            .map(decode::<ColumnInfo>)
            .collect()
    }

    /// Foreign keys declared on `table`
    pub fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyInfo>> {
        ident::validate(table)?;
        if !self.table_exists(table)? {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let stmt = Statement::with_params(
            "SELECT \"from\", \"table\", \"to\", on_update, on_delete FROM pragma_foreign_key_list(?) ORDER BY id, seq",
            vec![SqlValue::text(table)],
        );
        self.port
            .fetch_all(&stmt)?
            .into_iter()
            .map(decode::<ForeignKeyInfo>)
            .collect()
    }

    /// Columns plus the derived primary key, as used by the compilers
    pub fn shape(&self, table: &str) -> Result<TableShape> {
        Ok(TableShape {
            name: table.to_string(),
            columns: self.columns(table)?,
        })
    }

    /// User tables and views, optionally filtered by a name substring
    pub fn list_tables(
        &self,
        search: Option<&str>,
        ordering: Option<&str>,
    ) -> Result<Vec<TableSummary>> {
        let mut sql = String::from(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
        );
        let mut params = Vec::new();

        if let Some(term) = search.filter(|s| !s.is_empty()) {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
            params.push(SqlValue::text(format!("%{}%", escape_like(term))));
        }

        match ordering.filter(|s| !s.is_empty()).map(Ordering::parse) {
            None => sql.push_str(" ORDER BY name ASC"),
            Some(order) if order.field == "name" => {
                sql.push_str(" ORDER BY name ");
                sql.push_str(order.direction());
            }
            Some(order) => {
                return Err(Error::InvalidQueryParam(format!(
                    "tables can only be ordered by 'name', got '{}'",
                    order.field
                )))
            }
        }

        self.port
            .fetch_all(&Statement::with_params(sql, params))?
            .into_iter()
            .map(decode::<TableSummary>)
            .collect()
    }
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`
pub(crate) fn escape_like(term: &str) -> String {
    let mut ret = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            ret.push('\\');
        }
        ret.push(c);
    }
    ret
}

fn decode<T: serde::de::DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(JsonValue::Object(row))?)
}

/// Kind of a named schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

impl ObjectKind {
    /// Keyword used by `DROP`
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
        }
    }
}

/// Snapshot of a table's columns taken for one request
#[derive(Debug, Clone)]
pub struct TableShape {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableShape {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }

    /// Fail with `ColumnNotFound` unless `column` belongs to this table
    pub fn require_column<'c>(&self, column: &'c str) -> Result<&'c str> {
        if self.has_column(column) {
            Ok(column)
        } else {
            Err(Error::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }

    /// Whether `column` is a timestamp the server maintains
    ///
    /// Only columns declared as `DATETIME DEFAULT CURRENT_TIMESTAMP` count, so
    /// a user column that merely shares the name is left alone.
    pub fn is_managed_timestamp(&self, column: &str) -> bool {
        self.columns.iter().any(|c| {
            c.name == column
                && c.data_type.eq_ignore_ascii_case("DATETIME")
                && c
                    .dflt_value
                    .as_deref()
                    .is_some_and(|d| d.eq_ignore_ascii_case("CURRENT_TIMESTAMP"))
        })
    }

    /// First primary key column, falling back to SQLite's implicit `rowid`
    pub fn primary_key(&self) -> &str {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key())
            .min_by_key(|c| c.pk)
            .map_or("rowid", |c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SqliteStore;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(&[
                Statement::new("CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"),
                Statement::new(
                    "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT DEFAULT 'untitled', \
                     author_id INTEGER REFERENCES authors(id) ON DELETE CASCADE)",
                ),
                Statement::new("CREATE TABLE tags_x (label TEXT)"),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_columns_in_creation_order() {
        let store = store();
        let catalog = Catalog::new(&store);

        let columns = catalog.columns("books").unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "title", "author_id"]);
        assert!(columns[0].is_primary_key());
        assert_eq!(columns[1].dflt_value.as_deref(), Some("'untitled'"));
        assert_eq!(columns[2].data_type, "INTEGER");
    }

    #[test]
    fn test_unknown_table_is_schema_error() {
        let store = store();
        let catalog = Catalog::new(&store);

        assert!(matches!(
            catalog.columns("missing"),
            Err(Error::TableNotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            catalog.foreign_keys("missing"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_foreign_keys() {
        let store = store();
        let catalog = Catalog::new(&store);

        let fks = catalog.foreign_keys("books").unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].from, "author_id");
        assert_eq!(fks[0].table, "authors");
        assert_eq!(fks[0].to.as_deref(), Some("id"));
        assert_eq!(fks[0].on_delete, "CASCADE");
        assert!(catalog.foreign_keys("authors").unwrap().is_empty());
    }

    #[test]
    fn test_list_tables_search_and_ordering() {
        let store = store();
        let catalog = Catalog::new(&store);

        let all = catalog.list_tables(None, None).unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["authors", "books", "tags_x"]);

        let desc = catalog.list_tables(None, Some("-name")).unwrap();
        assert_eq!(desc[0].name, "tags_x");

        let found = catalog.list_tables(Some("oo"), None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "books");

        // underscore is literal, not a wildcard
        let literal = catalog.list_tables(Some("s_"), None).unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].name, "tags_x");

        assert!(catalog.list_tables(None, Some("rowid")).is_err());
    }

    #[test]
    fn test_shape_primary_key() {
        let store = store();
        let catalog = Catalog::new(&store);

        assert_eq!(catalog.shape("books").unwrap().primary_key(), "id");
        let tags = catalog.shape("tags_x").unwrap();
        assert_eq!(tags.primary_key(), "rowid");
        assert!(tags.require_column("label").is_ok());
        assert!(matches!(
            tags.require_column("nope"),
            Err(Error::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_object_kind() {
        let store = store();
        store
            .execute_batch(&[Statement::new(
                "CREATE VIEW titles AS SELECT title FROM books",
            )])
            .unwrap();
        let catalog = Catalog::new(&store);

        assert_eq!(catalog.object_kind("books").unwrap(), Some(ObjectKind::Table));
        assert_eq!(catalog.object_kind("titles").unwrap(), Some(ObjectKind::View));
        assert_eq!(catalog.object_kind("missing").unwrap(), None);
        assert!(catalog.table_exists("titles").unwrap());
    }

    #[test]
    fn test_managed_timestamp_needs_injected_shape() {
        let store = store();
        store
            .execute_batch(&[
                Statement::new(
                    "CREATE TABLE stamped (id INTEGER PRIMARY KEY, \"updatedAt\" DATETIME DEFAULT CURRENT_TIMESTAMP)",
                ),
                Statement::new(
                    "CREATE TABLE counted (id INTEGER PRIMARY KEY, \"updatedAt\" INTEGER)",
                ),
            ])
            .unwrap();
        let catalog = Catalog::new(&store);

        assert!(catalog.shape("stamped").unwrap().is_managed_timestamp("updatedAt"));
        assert!(!catalog.shape("counted").unwrap().is_managed_timestamp("updatedAt"));
        assert!(!catalog.shape("books").unwrap().is_managed_timestamp("updatedAt"));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
