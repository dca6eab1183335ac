//! restlite server
//!
//! Binary entry point for serving a SQLite database over REST.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use restlite::RestliteServer;
use restlite_common::config::RestliteConfig;

#[derive(Parser, Debug)]
#[command(name = "restlite")]
#[command(about = "Schema-driven REST API over an embedded SQLite database", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "restlite.toml")]
    config: PathBuf,

    /// Port to listen on, overrides the configuration file
    #[arg(short, long, env = "RESTLITE_PORT")]
    port: Option<u16>,

    /// Database file, or `:memory:`
    #[arg(short, long, env = "RESTLITE_DB")]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RESTLITE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log every executed statement
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut RestliteConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = &self.database {
            config.database.path.clone_from(database);
        }
        if self.verbose {
            config.database.verbose = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("restlite v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        let content = std::fs::read_to_string(&args.config)?;
        toml::from_str(&content)?
    } else {
        info!("Using default configuration");
        RestliteConfig::default()
    };
    args.apply(&mut config);

    let server = RestliteServer::new(config)?;

    // Handle shutdown signals
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        () = shutdown => {
            server.shutdown().await?;
        }
    }

    Ok(())
}
