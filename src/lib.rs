//! restlite: a schema-driven REST API over embedded SQLite
//!
//! Tables are created from declarative JSON schemas; rows are listed, filtered,
//! joined, paginated and mutated through one uniform HTTP surface.
//!
//! # Features
//!
//! - **Schema compiler** - `CREATE TABLE` with constraints, foreign keys and indices
//! - **Filter language** - `_filters=field__op:value` with array membership
//! - **Relation expansion** - `_extend` joins referenced rows as nested objects
//! - **Bulk by-key operations** - comma separated keys in one statement
//! - **Change events** - per-table callbacks after each mutation

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use restlite_common as common;
pub use restlite_engine as engine;
pub use restlite_rest as rest;

use std::sync::Arc;
use tracing::info;

use restlite_common::config::RestliteConfig;
use restlite_common::error::Result;
use restlite_engine::Engine;
use restlite_rest::RestServer;

/// Main restlite server
pub struct RestliteServer {
    config: RestliteConfig,
    engine: Arc<Engine>,
    rest_server: RestServer,
}

impl RestliteServer {
    /// Open the database and prepare the REST server
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub fn new(config: RestliteConfig) -> Result<Self> {
        info!(database = %config.database.path, "Initializing restlite");

        let engine = Arc::new(Engine::open(&config.database, config.api.next_link)?);
        let rest_server = RestServer::new(&config.server, &config.api, engine.clone());

        Ok(Self {
            config,
            engine,
            rest_server,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    #[must_use]
    pub fn rest(&self) -> &RestServer {
        &self.rest_server
    }

    #[must_use]
    pub fn config(&self) -> &RestliteConfig {
        &self.config
    }

    /// Serve HTTP until the server stops
    ///
    /// # Errors
    /// Returns an error if the listener cannot be bound.
    pub async fn run(&self) -> Result<()> {
        info!(
            "  - REST service: http://{}:{}",
            self.config.server.host, self.config.server.port
        );
        self.rest_server.run().await
    }

    /// Shutdown gracefully
    ///
    /// # Errors
    /// Returns an error if shutdown fails.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down restlite");
        Ok(())
    }
}
