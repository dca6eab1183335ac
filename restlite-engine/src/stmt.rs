//! Compiled statements and bound parameter values

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue, ValueRef};
use serde_json::Value as JsonValue;

/// A scalar bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

impl From<&JsonValue> for SqlValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Integer(i64::from(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Null, Self::Real),
            },
            JsonValue::String(s) => Self::Text(s.clone()),
            // Nested documents are stored as their JSON text
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        Self::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Self::Integer(v) => ToSqlOutput::Owned(SqliteValue::Integer(*v)),
            Self::Real(v) => ToSqlOutput::Owned(SqliteValue::Real(*v)),
            Self::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

/// SQL text plus the values for its positional placeholders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// `?, ?, ?` for `count` values
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_sql_value() {
        assert_eq!(SqlValue::from(&json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from(&json!(true)), SqlValue::Integer(1));
        assert_eq!(SqlValue::from(&json!(42)), SqlValue::Integer(42));
        assert_eq!(SqlValue::from(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from(&json!("hi")), SqlValue::text("hi"));
        assert_eq!(
            SqlValue::from(&json!({"a": 1})),
            SqlValue::text(r#"{"a":1}"#)
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(placeholders(0), "");
    }
}
