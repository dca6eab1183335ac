//! Common types for restlite

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Catalog Types
// ============================================================================

/// Column metadata as reported by the engine catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Position of the column in creation order
    pub cid: i64,
    pub name: String,
    /// Declared type, upper-cased as written in the DDL
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(deserialize_with = "bool_from_int")]
    pub notnull: bool,
    /// Default expression text, if any
    pub dflt_value: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it
    pub pk: i64,
}

impl ColumnInfo {
    pub fn is_primary_key(&self) -> bool {
        self.pk > 0
    }
}

/// Foreign key relationship of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyInfo {
    /// Referencing column in the source table
    pub from: String,
    /// Referenced table
    pub table: String,
    /// Referenced column; `None` means the target's primary key
    pub to: Option<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// Entry of a table listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
}

fn bool_from_int<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrBool {
        Int(i64),
        Bool(bool),
    }

    Ok(match IntOrBool::deserialize(deserializer)? {
        IntOrBool::Int(v) => v != 0,
        IntOrBool::Bool(v) => v,
    })
}

// ============================================================================
// Response Types
// ============================================================================

/// Standard API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    /// Machine-readable discriminator
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: error.into(),
        }
    }
}

impl From<&crate::Error> for ApiError {
    fn from(err: &crate::Error) -> Self {
        Self::new(err.error_code(), err.to_string())
    }
}
