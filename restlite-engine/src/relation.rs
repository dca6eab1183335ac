//! Relation expansion for `_extend`
//!
//! Each expanded foreign key column becomes a `LEFT JOIN` on the referenced
//! table plus a `json_object(...)` projection named `<column>_data`.
//! `json_object` cannot carry BLOBs, so BLOB columns travel as hex and are
//! re-encoded as base64 to match plain row listings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value as JsonValue;

use restlite_common::error::{Error, Result};

use crate::catalog::{Catalog, TableShape};
use crate::ident::{self, quote, qualified};
use crate::port::Row;

pub const DATA_SUFFIX: &str = "_data";

/// One resolved foreign key expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationExpansion {
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub target_columns: Vec<String>,
    /// Target columns declared as BLOB
    pub blob_columns: Vec<String>,
}

impl RelationExpansion {
    /// Join alias, unique per source column
    pub fn alias(&self) -> String {
        format!("{}_ref", self.source_column)
    }

    /// Result column carrying the nested object
    pub fn data_key(&self) -> String {
        format!("{}{DATA_SUFFIX}", self.source_column)
    }

    fn join_clause(&self, source_table: &str) -> String {
        let alias = self.alias();
        format!(
            "LEFT JOIN {} AS {} ON {} = {}",
            quote(&self.target_table),
            quote(&alias),
            qualified(&alias, &self.target_column),
            qualified(source_table, &self.source_column)
        )
    }

    fn projection(&self) -> String {
        let alias = self.alias();
        let pairs: Vec<String> = self
            .target_columns
            .iter()
            .map(|c| {
                let value = qualified(&alias, c);
                if self.is_blob(c) {
                    format!("'{c}', CASE WHEN {value} IS NULL THEN NULL ELSE hex({value}) END")
                } else {
                    format!("'{c}', {value}")
                }
            })
            .collect();
        format!(
            "json_object({}) AS {}",
            pairs.join(", "),
            quote(&self.data_key())
        )
    }

    fn is_blob(&self, column: &str) -> bool {
        self.blob_columns.iter().any(|c| c == column)
    }

    /// Turn hex-encoded BLOB fields of a decoded object into base64
    fn restore_blobs(&self, value: &mut JsonValue) {
        let JsonValue::Object(object) = value else {
            return;
        };
        for column in &self.blob_columns {
            if let Some(field) = object.get_mut(column) {
                if let Some(encoded) = field.as_str().and_then(base64_from_hex) {
                    *field = JsonValue::String(encoded);
                }
            }
        }
    }
}

fn base64_from_hex(hex: &str) -> Option<String> {
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect::<Option<Vec<u8>>>()?;
    Some(STANDARD.encode(bytes))
}

/// Joins and projections for every requested expansion
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    source_table: String,
    relations: Vec<RelationExpansion>,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn relations(&self) -> &[RelationExpansion] {
        &self.relations
    }

    pub fn join_clauses(&self) -> Vec<String> {
        self.relations
            .iter()
            .map(|r| r.join_clause(&self.source_table))
            .collect()
    }

    pub fn projection_fragments(&self) -> Vec<String> {
        self.relations.iter().map(RelationExpansion::projection).collect()
    }

    /// Replace the JSON text of every `<column>_data` value with the parsed object
    pub fn decode_rows(&self, rows: &mut [Row]) -> Result<()> {
        if self.relations.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = self.relations.iter().map(RelationExpansion::data_key).collect();

        for row in rows.iter_mut() {
            for (relation, key) in self.relations.iter().zip(&keys) {
                let mut parsed: JsonValue = match row.get(key) {
                    Some(JsonValue::String(text)) => serde_json::from_str(text)?,
                    _ => continue,
                };
                relation.restore_blobs(&mut parsed);
                row.insert(key.clone(), null_if_unmatched(parsed));
            }
        }
        Ok(())
    }
}

/// A LEFT JOIN miss yields an object whose fields are all null
fn null_if_unmatched(value: JsonValue) -> JsonValue {
    match &value {
        JsonValue::Object(map) if !map.is_empty() && map.values().all(JsonValue::is_null) => {
            JsonValue::Null
        }
        _ => value,
    }
}

/// Resolve `columns` of `source` to their referenced tables
///
/// Fails on the first column without a foreign key; no partial expansion is
/// returned.
pub fn expand(catalog: &Catalog<'_>, source: &TableShape, columns: &[String]) -> Result<Expansion> {
    let foreign_keys = catalog.foreign_keys(&source.name)?;
    let mut relations: Vec<RelationExpansion> = Vec::new();

    for column in columns {
        ident::validate(column)?;
        if relations.iter().any(|r| &r.source_column == column) {
            continue;
        }

        let fk = foreign_keys
            .iter()
            .find(|fk| &fk.from == column)
            .ok_or_else(|| Error::RelationNotFound(column.clone()))?;

        let target = catalog.shape(&fk.table)?;
        let target_column = match &fk.to {
            Some(to) => to.clone(),
            None => target.primary_key().to_string(),
        };

        relations.push(RelationExpansion {
            source_column: column.clone(),
            target_table: fk.table.clone(),
            target_column,
            target_columns: target.column_names().map(str::to_string).collect(),
            blob_columns: target
                .columns
                .iter()
                .filter(|c| c.data_type.to_ascii_uppercase().contains("BLOB"))
                .map(|c| c.name.clone())
                .collect(),
        });
    }

    Ok(Expansion {
        source_table: source.name.clone(),
        relations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{RowAccess, SqliteStore};
    use crate::stmt::Statement;
    use serde_json::json;

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store
            .execute_batch(&[
                Statement::new("CREATE TABLE authors (id INTEGER PRIMARY KEY, name TEXT)"),
                Statement::new("CREATE TABLE genres (code TEXT PRIMARY KEY, label TEXT)"),
                Statement::new(
                    "CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT, \
                     author_id INTEGER REFERENCES authors(id), \
                     editor_id INTEGER REFERENCES authors(id), \
                     genre TEXT REFERENCES genres)",
                ),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_expand_builds_join_and_projection() {
        let store = store();
        let catalog = Catalog::new(&store);
        let books = catalog.shape("books").unwrap();

        let expansion = expand(&catalog, &books, &["author_id".to_string()]).unwrap();
        assert_eq!(
            expansion.join_clauses(),
            vec![
                "LEFT JOIN \"authors\" AS \"author_id_ref\" ON \"author_id_ref\".\"id\" = \"books\".\"author_id\""
            ]
        );
        assert_eq!(
            expansion.projection_fragments(),
            vec![
                "json_object('id', \"author_id_ref\".\"id\", 'name', \"author_id_ref\".\"name\") AS \"author_id_data\""
            ]
        );
    }

    #[test]
    fn test_same_target_twice_uses_distinct_aliases() {
        let store = store();
        let catalog = Catalog::new(&store);
        let books = catalog.shape("books").unwrap();

        let expansion = expand(
            &catalog,
            &books,
            &[
                "author_id".to_string(),
                "editor_id".to_string(),
                "author_id".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(expansion.relations().len(), 2);
        assert_ne!(expansion.relations()[0].alias(), expansion.relations()[1].alias());
    }

    #[test]
    fn test_implicit_target_column_uses_primary_key() {
        let store = store();
        let catalog = Catalog::new(&store);
        let books = catalog.shape("books").unwrap();

        let expansion = expand(&catalog, &books, &["genre".to_string()]).unwrap();
        assert_eq!(expansion.relations()[0].target_column, "code");
    }

    #[test]
    fn test_missing_foreign_key_names_column() {
        let store = store();
        let catalog = Catalog::new(&store);
        let books = catalog.shape("books").unwrap();

        let err = expand(
            &catalog,
            &books,
            &["author_id".to_string(), "title".to_string()],
        )
        .unwrap_err();
        assert!(matches!(err, Error::RelationNotFound(ref c) if c == "title"));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_decode_rows() {
        let store = store();
        store
            .execute(&Statement::new("INSERT INTO authors (id, name) VALUES (1, 'Ann')"))
            .unwrap();
        store
            .execute(&Statement::new(
                "INSERT INTO books (id, title, author_id) VALUES (1, 'A', 1), (2, 'B', NULL)",
            ))
            .unwrap();

        let catalog = Catalog::new(&store);
        let books = catalog.shape("books").unwrap();
        let expansion = expand(&catalog, &books, &["author_id".to_string()]).unwrap();

        let sql = format!(
            "SELECT \"books\".*, {} FROM \"books\" {} ORDER BY \"books\".\"id\"",
            expansion.projection_fragments().join(", "),
            expansion.join_clauses().join(" ")
        );
        let mut rows = store.fetch_all(&Statement::new(sql)).unwrap();
        expansion.decode_rows(&mut rows).unwrap();

        assert_eq!(rows[0]["author_id_data"], json!({"id": 1, "name": "Ann"}));
        assert_eq!(rows[1]["author_id_data"], JsonValue::Null);
    }

    #[test]
    fn test_blob_columns_match_plain_listing() {
        let store = store();
        store
            .execute_batch(&[
                Statement::new("CREATE TABLE files (id INTEGER PRIMARY KEY, raw BLOB, note BLOB)"),
                Statement::new(
                    "CREATE TABLE posts (id INTEGER PRIMARY KEY, file_id INTEGER REFERENCES files(id))",
                ),
                Statement::new("INSERT INTO files (id, raw, note) VALUES (1, x'0102', NULL)"),
                Statement::new("INSERT INTO posts (id, file_id) VALUES (1, 1)"),
            ])
            .unwrap();

        let plain = store
            .fetch_all(&Statement::new("SELECT id, raw, note FROM files"))
            .unwrap();

        let catalog = Catalog::new(&store);
        let posts = catalog.shape("posts").unwrap();
        let expansion = expand(&catalog, &posts, &["file_id".to_string()]).unwrap();
        assert_eq!(expansion.relations()[0].blob_columns, vec!["raw", "note"]);

        let sql = format!(
            "SELECT \"posts\".*, {} FROM \"posts\" {}",
            expansion.projection_fragments().join(", "),
            expansion.join_clauses().join(" ")
        );
        let mut rows = store.fetch_all(&Statement::new(sql)).unwrap();
        expansion.decode_rows(&mut rows).unwrap();

        assert_eq!(
            rows[0]["file_id_data"],
            json!({ "id": 1, "raw": plain[0]["raw"], "note": null })
        );
        assert_eq!(rows[0]["file_id_data"]["raw"], json!("AQI="));
    }
}
