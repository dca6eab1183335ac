//! Identifier validation and quoting
//!
//! Table and column names are interpolated into statements, so every name is
//! checked against a restrictive character class first. Quoting is applied on
//! top of that so names containing `-` stay valid SQL.

use regex::Regex;
use std::sync::OnceLock;

use restlite_common::error::{Error, Result};

const MAX_IDENTIFIER_LEN: usize = 64;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w-]+$").expect("identifier pattern is valid"))
}

/// Validate a table or column name
pub fn validate(name: &str) -> Result<&str> {
    if name.len() > MAX_IDENTIFIER_LEN || !identifier_pattern().is_match(name) {
        return Err(Error::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

/// Quote a validated identifier
pub fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

/// `"table"."column"`
pub fn qualified(table: &str, column: &str) -> String {
    format!("\"{table}\".\"{column}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_word_characters_and_dashes() {
        assert!(validate("books").is_ok());
        assert!(validate("author_id").is_ok());
        assert!(validate("line-items").is_ok());
        assert!(validate("createdAt").is_ok());
    }

    #[test]
    fn test_rejects_injection_attempts() {
        assert!(validate("books; DROP TABLE users").is_err());
        assert!(validate("name\"").is_err());
        assert!(validate("a b").is_err());
        assert!(validate("").is_err());
        assert!(validate(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote("line-items"), "\"line-items\"");
        assert_eq!(qualified("books", "title"), "\"books\".\"title\"");
    }
}
