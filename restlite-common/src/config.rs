//! Configuration types for restlite

use serde::{Deserialize, Serialize};

/// Main configuration for the restlite server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestliteConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Embedded database configuration
    pub database: DatabaseConfig,
    /// REST API behaviour
    pub api: ApiConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port for the REST API (default: 8000)
    pub port: u16,
    /// Number of HTTP worker threads
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 4,
        }
    }
}

/// Embedded database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path, or `:memory:`
    pub path: String,
    /// Open file databases in write-ahead-log mode
    pub wal: bool,
    /// Enforce foreign key constraints
    pub foreign_keys: bool,
    /// Log every executed statement at info level
    pub verbose: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            wal: true,
            foreign_keys: true,
            verbose: false,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:"
    }
}

/// How the `next` pagination link is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextLinkPolicy {
    /// Emit `next` when the page came back full
    Heuristic,
    /// Emit `next` when the total count exceeds `page * limit`
    Count,
}

/// REST API behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Page size used when `_limit` is absent
    pub default_page_limit: u64,
    /// Largest accepted `_limit`
    pub max_page_limit: u64,
    /// Policy for the `next` link on row listings
    pub next_link: NextLinkPolicy,
    /// Table names that cannot be created through the API
    pub reserved_tables: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 10,
            max_page_limit: 1000,
            next_link: NextLinkPolicy::Heuristic,
            reserved_tables: vec![
                "_users".to_string(),
                "_roles".to_string(),
                "_roles_permissions".to_string(),
                "_users_roles".to_string(),
            ],
        }
    }
}

impl ApiConfig {
    pub fn is_reserved(&self, table: &str) -> bool {
        self.reserved_tables.iter().any(|t| t == table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RestliteConfig::default();
        assert_eq!(config.server.port, 8000);
        assert!(config.database.is_in_memory());
        assert_eq!(config.api.default_page_limit, 10);
        assert_eq!(config.api.next_link, NextLinkPolicy::Heuristic);
    }

    #[test]
    fn test_config_serialization() {
        let config = RestliteConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: RestliteConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.api.reserved_tables, parsed.api.reserved_tables);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: RestliteConfig =
            serde_json::from_str(r#"{"api": {"next_link": "count"}}"#).unwrap();
        assert_eq!(parsed.api.next_link, NextLinkPolicy::Count);
        assert_eq!(parsed.api.default_page_limit, 10);
        assert!(parsed.api.is_reserved("_roles"));
        assert!(!parsed.api.is_reserved("books"));
    }
}
