//! Schema compiler
//!
//! Turns a declarative [`TableSpec`] into the `CREATE TABLE` and
//! `CREATE INDEX` statements that materialize it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use restlite_common::error::{Error, Result};

use crate::ident::{self, quote};
use crate::stmt::Statement;

pub const SURROGATE_KEY: &str = "id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

// ============================================================================
// Column Types
// ============================================================================

/// Storage type accepted for a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    Text,
    Numeric,
    Integer,
    Real,
    Blob,
    Boolean,
    Date,
    DateTime,
}

impl SqlType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Numeric => "NUMERIC",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
        }
    }
}

impl TryFrom<String> for SqlType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Ok(match value.to_ascii_uppercase().as_str() {
            "TEXT" => Self::Text,
            "NUMERIC" => Self::Numeric,
            "INTEGER" => Self::Integer,
            "REAL" => Self::Real,
            "BLOB" => Self::Blob,
            "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            "DATETIME" => Self::DateTime,
            _ => {
                return Err(Error::InvalidSchema(format!(
                    "unsupported sqlType '{value}', expected one of TEXT, NUMERIC, INTEGER, REAL, BLOB, BOOLEAN, DATE, DATETIME"
                )))
            }
        })
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Referential action for `ON DELETE` / `ON UPDATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    SetDefault,
    Restrict,
}

impl ForeignKeyAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::Restrict => "RESTRICT",
        }
    }
}

impl TryFrom<String> for ForeignKeyAction {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let normalized = value.trim().to_ascii_uppercase().replace('_', " ");
        Ok(match normalized.as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            "RESTRICT" => Self::Restrict,
            _ => {
                return Err(Error::InvalidSchema(format!(
                    "unsupported foreign key action '{value}'"
                )))
            }
        })
    }
}

impl From<ForeignKeyAction> for String {
    fn from(value: ForeignKeyAction) -> Self {
        value.as_str().to_string()
    }
}

// ============================================================================
// Table Specification
// ============================================================================

/// `REFERENCES` target of a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeySpec {
    pub table: String,
    pub column: String,
    #[serde(default = "default_on_delete")]
    pub on_delete: ForeignKeyAction,
    #[serde(default = "default_on_update")]
    pub on_update: ForeignKeyAction,
}

fn default_on_delete() -> ForeignKeyAction {
    ForeignKeyAction::Cascade
}

fn default_on_update() -> ForeignKeyAction {
    ForeignKeyAction::Restrict
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    #[serde(alias = "type")]
    pub sql_type: SqlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeySpec>,
    #[serde(default)]
    pub index: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            default: None,
            not_null: false,
            unique: false,
            primary_key: false,
            foreign_key: None,
            index: false,
        }
    }

    fn timestamp(name: &str) -> Self {
        Self {
            default: Some(JsonValue::String("CURRENT_TIMESTAMP".to_string())),
            ..Self::new(name, SqlType::DateTime)
        }
    }

    fn surrogate_key() -> Self {
        Self {
            primary_key: true,
            ..Self::new(SURROGATE_KEY, SqlType::Integer)
        }
    }
}

/// Declarative table definition accepted by `POST /tables`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub name: String,
    #[serde(rename = "schema", alias = "columns")]
    pub columns: Vec<ColumnSpec>,
    #[serde(default = "default_true")]
    pub auto_add_created_at: bool,
    #[serde(default = "default_true")]
    pub auto_add_updated_at: bool,
}

fn default_true() -> bool {
    true
}

/// Named multi-column uniqueness constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub fields: Vec<String>,
}

/// Extra compilation inputs not exposed through the REST body
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub unique_constraints: Vec<UniqueConstraint>,
}

/// DDL for one table, in execution order
#[derive(Debug, Clone)]
pub struct CompiledTable {
    pub ddl: Vec<Statement>,
    /// Final column list including injected columns
    pub generated_schema: Vec<ColumnSpec>,
}

// ============================================================================
// Compilation
// ============================================================================

/// Compile a table specification into DDL statements
pub fn compile(spec: &TableSpec, options: &CompileOptions) -> Result<CompiledTable> {
    ident::validate(&spec.name)?;

    let mut seen = HashSet::new();
    for column in &spec.columns {
        ident::validate(&column.name)?;
        if !seen.insert(column.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "column '{}' is declared more than once",
                column.name
            )));
        }
    }

    let declared_keys = spec.columns.iter().filter(|c| c.primary_key).count();
    if declared_keys > 1 {
        return Err(Error::InvalidSchema(
            "only one column may be declared as primary key".to_string(),
        ));
    }

    let mut injected = Vec::new();
    if spec.auto_add_updated_at && !seen.contains(UPDATED_AT) {
        injected.push(ColumnSpec::timestamp(UPDATED_AT));
    }
    if spec.auto_add_created_at && !seen.contains(CREATED_AT) {
        injected.push(ColumnSpec::timestamp(CREATED_AT));
    }
    if declared_keys == 0 {
        if seen.contains(SURROGATE_KEY) {
            return Err(Error::InvalidSchema(format!(
                "column '{SURROGATE_KEY}' must be the primary key when no other primary key is declared"
            )));
        }
        injected.push(ColumnSpec::surrogate_key());
    }

    let generated_schema: Vec<ColumnSpec> =
        injected.into_iter().chain(spec.columns.iter().cloned()).collect();

    let mut clauses = Vec::with_capacity(generated_schema.len());
    for column in &generated_schema {
        clauses.push(column_clause(column, declared_keys == 0)?);
    }

    for constraint in &options.unique_constraints {
        ident::validate(&constraint.name)?;
        if constraint.fields.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "unique constraint '{}' has no fields",
                constraint.name
            )));
        }
        for field in &constraint.fields {
            if !generated_schema.iter().any(|c| &c.name == field) {
                return Err(Error::InvalidSchema(format!(
                    "unique constraint '{}' references unknown column '{field}'",
                    constraint.name
                )));
            }
        }
        let fields: Vec<String> = constraint.fields.iter().map(|f| quote(f.as_str())).collect();
        clauses.push(format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote(&constraint.name),
            fields.join(", ")
        ));
    }

    let mut ddl = vec![Statement::new(format!(
        "CREATE TABLE {} ({})",
        quote(&spec.name),
        clauses.join(", ")
    ))];

    for column in generated_schema.iter().filter(|c| c.index) {
        ddl.push(Statement::new(format!(
            "CREATE INDEX {} ON {} ({})",
            quote(&index_name(&spec.name, &column.name)),
            quote(&spec.name),
            quote(&column.name)
        )));
    }

    Ok(CompiledTable {
        ddl,
        generated_schema,
    })
}

pub fn index_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_index")
}

fn column_clause(column: &ColumnSpec, surrogate: bool) -> Result<String> {
    let mut clause = format!("{} {}", quote(&column.name), column.sql_type);

    if let Some(default) = &column.default {
        clause.push_str(" DEFAULT ");
        clause.push_str(&default_literal(default)?);
    }
    if column.not_null {
        clause.push_str(" NOT NULL");
    }
    if column.unique {
        clause.push_str(" UNIQUE");
    }
    if column.primary_key {
        clause.push_str(" PRIMARY KEY");
        if surrogate && column.name == SURROGATE_KEY {
            clause.push_str(" AUTOINCREMENT");
        }
    }
    if let Some(fk) = &column.foreign_key {
        ident::validate(&fk.table)?;
        ident::validate(&fk.column)?;
        clause.push_str(&format!(
            " REFERENCES {}({}) ON DELETE {} ON UPDATE {}",
            quote(&fk.table),
            quote(&fk.column),
            fk.on_delete.as_str(),
            fk.on_update.as_str()
        ));
    }

    Ok(clause)
}

/// Render a JSON default as a SQL literal
fn default_literal(value: &JsonValue) -> Result<String> {
    const KEYWORDS: [&str; 4] = ["CURRENT_TIMESTAMP", "CURRENT_DATE", "CURRENT_TIME", "NULL"];

    match value {
        JsonValue::Null => Ok("NULL".to_string()),
        JsonValue::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::String(s) => {
            let upper = s.to_ascii_uppercase();
            if KEYWORDS.contains(&upper.as_str()) {
                Ok(upper)
            } else {
                Ok(format!("'{}'", s.replace('\'', "''")))
            }
        }
        other => Err(Error::InvalidSchema(format!(
            "unsupported default value {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(value: JsonValue) -> TableSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_injects_timestamps_and_surrogate_key() {
        let table = spec(json!({
            "name": "books",
            "schema": [{ "name": "title", "sqlType": "text", "notNull": true }]
        }));
        let compiled = compile(&table, &CompileOptions::default()).unwrap();

        assert_eq!(compiled.ddl.len(), 1);
        assert_eq!(
            compiled.ddl[0].sql,
            "CREATE TABLE \"books\" (\"updatedAt\" DATETIME DEFAULT CURRENT_TIMESTAMP, \
             \"createdAt\" DATETIME DEFAULT CURRENT_TIMESTAMP, \
             \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"title\" TEXT NOT NULL)"
        );
        let names: Vec<_> = compiled
            .generated_schema
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["updatedAt", "createdAt", "id", "title"]);
    }

    #[test]
    fn test_clause_order_and_foreign_key() {
        let table = spec(json!({
            "name": "books",
            "autoAddCreatedAt": false,
            "autoAddUpdatedAt": false,
            "schema": [
                { "name": "isbn", "sqlType": "TEXT", "primaryKey": true, "unique": true, "notNull": true },
                { "name": "author_id", "sqlType": "INTEGER",
                  "foreignKey": { "table": "authors", "column": "id", "onUpdate": "set_null" } },
                { "name": "price", "sqlType": "REAL", "default": 9.5 },
                { "name": "note", "sqlType": "TEXT", "default": "it's" }
            ]
        }));
        let compiled = compile(&table, &CompileOptions::default()).unwrap();

        assert_eq!(
            compiled.ddl[0].sql,
            "CREATE TABLE \"books\" (\"isbn\" TEXT NOT NULL UNIQUE PRIMARY KEY, \
             \"author_id\" INTEGER REFERENCES \"authors\"(\"id\") ON DELETE CASCADE ON UPDATE SET NULL, \
             \"price\" REAL DEFAULT 9.5, \"note\" TEXT DEFAULT 'it''s')"
        );
    }

    #[test]
    fn test_index_statements() {
        let table = spec(json!({
            "name": "books",
            "schema": [
                { "name": "title", "sqlType": "TEXT", "index": true },
                { "name": "year", "sqlType": "INTEGER", "index": true }
            ]
        }));
        let compiled = compile(&table, &CompileOptions::default()).unwrap();

        assert_eq!(compiled.ddl.len(), 3);
        assert_eq!(
            compiled.ddl[1].sql,
            "CREATE INDEX \"books_title_index\" ON \"books\" (\"title\")"
        );
        assert_eq!(
            compiled.ddl[2].sql,
            "CREATE INDEX \"books_year_index\" ON \"books\" (\"year\")"
        );
    }

    #[test]
    fn test_unique_constraint() {
        let table = spec(json!({
            "name": "_users_roles",
            "autoAddCreatedAt": false,
            "autoAddUpdatedAt": false,
            "schema": [
                { "name": "user_id", "sqlType": "INTEGER" },
                { "name": "role_id", "sqlType": "INTEGER" }
            ]
        }));
        let options = CompileOptions {
            unique_constraints: vec![UniqueConstraint {
                name: "unique_user_role".to_string(),
                fields: vec!["user_id".to_string(), "role_id".to_string()],
            }],
        };
        let compiled = compile(&table, &options).unwrap();
        assert!(compiled.ddl[0]
            .sql
            .ends_with("CONSTRAINT \"unique_user_role\" UNIQUE (\"user_id\", \"role_id\"))"));

        let bad = CompileOptions {
            unique_constraints: vec![UniqueConstraint {
                name: "broken".to_string(),
                fields: vec!["ghost".to_string()],
            }],
        };
        assert!(matches!(compile(&table, &bad), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_rejects_invalid_specs() {
        let bad_type: std::result::Result<TableSpec, _> = serde_json::from_value(json!({
            "name": "t",
            "schema": [{ "name": "a", "sqlType": "VARCHAR" }]
        }));
        assert!(bad_type.is_err());

        let duplicate = spec(json!({
            "name": "t",
            "schema": [
                { "name": "a", "sqlType": "TEXT" },
                { "name": "a", "sqlType": "TEXT" }
            ]
        }));
        assert!(compile(&duplicate, &CompileOptions::default()).is_err());

        let bad_name = spec(json!({
            "name": "t; DROP TABLE x",
            "schema": [{ "name": "a", "sqlType": "TEXT" }]
        }));
        assert!(matches!(
            compile(&bad_name, &CompileOptions::default()),
            Err(Error::InvalidIdentifier(_))
        ));

        let shadowed_id = spec(json!({
            "name": "t",
            "schema": [{ "name": "id", "sqlType": "TEXT" }]
        }));
        assert!(compile(&shadowed_id, &CompileOptions::default()).is_err());
    }

    #[test]
    fn test_type_is_accepted_for_sql_type() {
        let table = spec(json!({
            "name": "t",
            "schema": [{ "name": "a", "type": "integer" }]
        }));
        assert_eq!(table.columns[0].sql_type, SqlType::Integer);
    }

    #[test]
    fn test_declared_timestamp_is_not_duplicated() {
        let table = spec(json!({
            "name": "events",
            "schema": [{ "name": "createdAt", "sqlType": "DATE" }]
        }));
        let compiled = compile(&table, &CompileOptions::default()).unwrap();
        let count = compiled
            .generated_schema
            .iter()
            .filter(|c| c.name == CREATED_AT)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_default_literals() {
        assert_eq!(default_literal(&json!(true)).unwrap(), "1");
        assert_eq!(default_literal(&json!(3)).unwrap(), "3");
        assert_eq!(default_literal(&json!("current_date")).unwrap(), "CURRENT_DATE");
        assert_eq!(default_literal(&json!(null)).unwrap(), "NULL");
        assert!(default_literal(&json!([1])).is_err());
    }
}
