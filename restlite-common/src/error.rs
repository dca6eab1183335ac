//! Error types shared by the engine and the REST layer

use thiserror::Error;

/// restlite error types
#[derive(Error, Debug)]
pub enum Error {
    // Schema Errors
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid identifier '{0}': only letters, digits, '_' and '-' are allowed")]
    InvalidIdentifier(String),

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Table name '{0}' is reserved")]
    ReservedTableName(String),

    // Query Errors
    #[error("Foreign key not found for extended field '{0}'")]
    RelationNotFound(String),

    #[error("{0}")]
    InvalidFilter(String),

    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("No fields provided")]
    NoFieldsProvided,

    // Database Errors
    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Row not found")]
    RowNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for restlite operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP status code for each error type
impl Error {
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::InvalidSchema(_)
            | Self::InvalidIdentifier(_)
            | Self::TableAlreadyExists(_)
            | Self::RelationNotFound(_)
            | Self::InvalidFilter(_)
            | Self::InvalidQueryParam(_)
            | Self::ValidationError(_)
            | Self::NoFieldsProvided
            | Self::ConstraintViolation(_)
            | Self::ColumnNotFound { .. } => 400,

            // 404 Not Found
            Self::TableNotFound(_) | Self::RowNotFound => 404,

            // 409 Conflict
            Self::ReservedTableName(_) => 409,

            // 500 Internal Server Error
            Self::DatabaseError(_)
            | Self::ConfigError(_)
            | Self::InternalError(_)
            | Self::IoError(_)
            | Self::JsonError(_) => 500,
        }
    }

    /// Error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TableNotFound(_) => "table_not_found",
            Self::ColumnNotFound { .. } => "column_not_found",
            Self::InvalidSchema(_) => "invalid_schema",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::TableAlreadyExists(_) => "table_exists",
            Self::ReservedTableName(_) => "reserved_table_name",
            Self::RelationNotFound(_) => "foreign_key_not_found",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::InvalidQueryParam(_) => "invalid_param",
            Self::ValidationError(_) => "validation_error",
            Self::NoFieldsProvided => "no_fields_provided",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::RowNotFound => "not_found",
            Self::DatabaseError(_) => "database_error",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal_error",
            Self::IoError(_) => "io_error",
            Self::JsonError(_) => "json_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::TableNotFound("books".into()).status_code(), 404);
        assert_eq!(Error::RowNotFound.status_code(), 404);
        assert_eq!(Error::RelationNotFound("author_id".into()).status_code(), 400);
        assert_eq!(Error::InvalidFilter("bad".into()).status_code(), 400);
        assert_eq!(Error::NoFieldsProvided.status_code(), 400);
        assert_eq!(Error::ReservedTableName("_users".into()).status_code(), 409);
        assert_eq!(Error::DatabaseError("disk".into()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::RowNotFound.error_code(), "not_found");
        assert_eq!(
            Error::ConstraintViolation("UNIQUE constraint failed".into()).error_code(),
            "constraint_violation"
        );
    }

    #[test]
    fn test_relation_message_names_column() {
        let err = Error::RelationNotFound("author_id".into());
        assert_eq!(
            err.to_string(),
            "Foreign key not found for extended field 'author_id'"
        );
    }
}
