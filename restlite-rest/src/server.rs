//! REST API server implementation

use std::sync::Arc;

use actix_web::{error, middleware, web, App, HttpResponse, HttpServer};
use tracing::info;

use restlite_common::config::{ApiConfig, ServerConfig};
use restlite_common::error::Result;
use restlite_common::types::ApiError;
use restlite_engine::Engine;

use crate::changes::ChangeListener;
use crate::handlers::{self, RestState};

/// Register every route on `cfg`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(handlers::health_handler))
        .route("/tables", web::get().to(handlers::list_tables))
        .route("/tables", web::post().to(handlers::create_table))
        .route("/tables/{name}", web::get().to(handlers::table_schema))
        .route("/tables/{name}", web::delete().to(handlers::drop_table))
        .route("/tables/{name}/rows", web::get().to(handlers::list_rows))
        .route("/tables/{name}/rows", web::post().to(handlers::insert_rows))
        .route("/tables/{name}/rows/{pks}", web::get().to(handlers::get_rows))
        .route("/tables/{name}/rows/{pks}", web::put().to(handlers::update_rows))
        .route(
            "/tables/{name}/rows/{pks}",
            web::delete().to(handlers::delete_rows),
        );
}

/// Malformed bodies answer with the standard error shape
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let body = ApiError::new("validation_error", err.to_string());
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let body = ApiError::new("invalid_param", err.to_string());
        error::InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    })
}

/// restlite REST API server
pub struct RestServer {
    config: ServerConfig,
    state: web::Data<RestState>,
}

impl RestServer {
    pub fn new(config: &ServerConfig, api: &ApiConfig, engine: Arc<Engine>) -> Self {
        Self {
            config: config.clone(),
            state: web::Data::new(RestState::new(engine, api.clone())),
        }
    }

    /// Change listener shared with the handlers
    #[must_use]
    pub fn changes(&self) -> Arc<ChangeListener> {
        self.state.changes.clone()
    }

    /// Run the REST server until it is stopped
    pub async fn run(&self) -> Result<()> {
        let state = self.state.clone();
        let host = self.config.host.clone();
        let port = self.config.port;

        info!("Starting REST API server on {}:{}", host, port);

        HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .wrap(middleware::Logger::default())
                .configure(configure)
        })
        .workers(self.config.workers.max(1))
        .bind((host.as_str(), port))?
        .run()
        .await?;

        Ok(())
    }
}
