//! HTTP handlers for table and row endpoints

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use restlite_common::config::ApiConfig;
use restlite_common::error::{Error, Result};
use restlite_common::types::ApiError;
use restlite_engine::{
    CompileOptions, CreatedTable, Engine, InsertFields, PageRequest, QueryRequest, Row, TableSpec,
};

use crate::changes::{ChangeEvent, ChangeListener};

/// Shared REST API state
pub struct RestState {
    pub engine: Arc<Engine>,
    pub api: ApiConfig,
    pub changes: Arc<ChangeListener>,
}

impl RestState {
    pub fn new(engine: Arc<Engine>, api: ApiConfig) -> Self {
        Self {
            engine,
            api,
            changes: Arc::new(ChangeListener::new()),
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Query string of `GET /tables`
#[derive(Debug, Default, Deserialize)]
pub struct TableListParams {
    #[serde(rename = "_search")]
    pub search: Option<String>,
    #[serde(rename = "_ordering")]
    pub ordering: Option<String>,
}

/// Query string of the row endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RowQueryParams {
    #[serde(rename = "_page")]
    pub page: Option<String>,
    #[serde(rename = "_limit")]
    pub limit: Option<String>,
    #[serde(rename = "_search")]
    pub search: Option<String>,
    #[serde(rename = "_ordering")]
    pub ordering: Option<String>,
    #[serde(rename = "_schema")]
    pub schema: Option<String>,
    #[serde(rename = "_extend")]
    pub extend: Option<String>,
    #[serde(rename = "_filters")]
    pub filters: Option<String>,
    #[serde(rename = "_lookup_field")]
    pub lookup_field: Option<String>,
}

impl RowQueryParams {
    pub fn into_request(self, api: &ApiConfig) -> Result<QueryRequest> {
        let page = PageRequest::parse(
            self.page.as_deref(),
            self.limit.as_deref(),
            api.default_page_limit,
            api.max_page_limit,
        )?;
        Ok(QueryRequest {
            page,
            search: self.search,
            ordering: self.ordering,
            schema: self.schema,
            extend: self.extend,
            filters: self.filters,
            lookup_field: self.lookup_field,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct InsertBody {
    pub fields: InsertFields,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub fields: Row,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct MessageResponse<T> {
    message: &'static str,
    data: T,
}

#[derive(Debug, Serialize)]
struct TableCreatedResponse {
    message: &'static str,
    #[serde(flatten)]
    table: CreatedTable,
}

// ============================================================================
// Helpers
// ============================================================================

/// Run a synchronous engine call on the blocking pool
async fn run_blocking<T, F>(state: &RestState, f: F) -> Result<T>
where
    F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = state.engine.clone();
    web::block(move || f(&engine))
        .await
        .map_err(|e| Error::InternalError(e.to_string()))?
}

/// Render an error as `{message, error}` with its mapped status
pub fn error_response(err: &Error) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(code = err.error_code(), error = %err, "Request rejected");
    }
    HttpResponse::build(status).json(ApiError::from(err))
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T>) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::build(status).json(body),
        Err(err) => error_response(&err),
    }
}

fn rows_path(table: &str) -> String {
    format!("/tables/{table}/rows")
}

// ============================================================================
// Table Handlers
// ============================================================================

/// POST /tables
pub async fn create_table(
    state: web::Data<RestState>,
    body: web::Json<TableSpec>,
) -> HttpResponse {
    let spec = body.into_inner();
    if state.api.is_reserved(&spec.name) {
        return error_response(&Error::ReservedTableName(spec.name));
    }

    let result = run_blocking(&state, move |engine| {
        engine.create_table(&spec, &CompileOptions::default())
    })
    .await
    .map(|table| TableCreatedResponse {
        message: "Table created",
        table,
    });
    respond(StatusCode::CREATED, result)
}

/// GET /tables
pub async fn list_tables(
    state: web::Data<RestState>,
    query: web::Query<TableListParams>,
) -> HttpResponse {
    let params = query.into_inner();
    let result = run_blocking(&state, move |engine| {
        engine.list_tables(params.search.as_deref(), params.ordering.as_deref())
    })
    .await
    .map(|data| DataResponse { data });
    respond(StatusCode::OK, result)
}

/// GET /tables/{name}
pub async fn table_schema(state: web::Data<RestState>, path: web::Path<String>) -> HttpResponse {
    let table = path.into_inner();
    let result = run_blocking(&state, move |engine| engine.table_schema(&table))
        .await
        .map(|data| DataResponse { data });
    respond(StatusCode::OK, result)
}

/// DELETE /tables/{name}
pub async fn drop_table(state: web::Data<RestState>, path: web::Path<String>) -> HttpResponse {
    let table = path.into_inner();
    let name = table.clone();
    let result = run_blocking(&state, move |engine| engine.drop_table(&table))
        .await
        .map(|()| MessageResponse {
            message: "Table deleted",
            data: serde_json::json!({ "name": name }),
        });
    respond(StatusCode::OK, result)
}

// ============================================================================
// Row Handlers
// ============================================================================

/// GET /tables/{name}/rows
pub async fn list_rows(
    state: web::Data<RestState>,
    path: web::Path<String>,
    query: web::Query<RowQueryParams>,
) -> HttpResponse {
    let table = path.into_inner();
    let request = match query.into_inner().into_request(&state.api) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };

    let result = run_blocking(&state, move |engine| {
        engine.list_rows(&table, &request, &rows_path(&table))
    })
    .await;
    respond(StatusCode::OK, result)
}

/// POST /tables/{name}/rows
pub async fn insert_rows(
    state: web::Data<RestState>,
    path: web::Path<String>,
    body: web::Json<InsertBody>,
) -> HttpResponse {
    let table = path.into_inner();
    let fields = body.into_inner().fields;

    let result = run_blocking(&state, move |engine| {
        let execution = engine.insert_rows(&table, &fields)?;
        Ok((table, fields, execution))
    })
    .await
    .map(|(table, fields, execution)| {
        state
            .changes
            .emit(&ChangeEvent::insert(&table, &execution, fields.rows()));
        MessageResponse {
            message: "Row inserted",
            data: execution,
        }
    });
    respond(StatusCode::CREATED, result)
}

/// GET /tables/{name}/rows/{pks}
pub async fn get_rows(
    state: web::Data<RestState>,
    path: web::Path<(String, String)>,
    query: web::Query<RowQueryParams>,
) -> HttpResponse {
    let (table, keys) = path.into_inner();
    let request = match query.into_inner().into_request(&state.api) {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };

    let result = run_blocking(&state, move |engine| engine.get_rows(&table, &keys, &request))
        .await
        .map(|data| DataResponse { data });
    respond(StatusCode::OK, result)
}

/// PUT /tables/{name}/rows/{pks}
pub async fn update_rows(
    state: web::Data<RestState>,
    path: web::Path<(String, String)>,
    query: web::Query<RowQueryParams>,
    body: web::Json<UpdateBody>,
) -> HttpResponse {
    let (table, keys) = path.into_inner();
    let lookup_field = query.into_inner().lookup_field;
    let fields = body.into_inner().fields;

    let result = run_blocking(&state, move |engine| {
        let outcome = engine.update_rows(&table, &keys, lookup_field.as_deref(), &fields)?;
        Ok((table, fields, outcome))
    })
    .await
    .map(|(table, fields, outcome)| {
        state
            .changes
            .emit(&ChangeEvent::update(&table, &outcome, &fields));
        MessageResponse {
            message: "Row updated",
            data: outcome.execution,
        }
    });
    respond(StatusCode::OK, result)
}

/// DELETE /tables/{name}/rows/{pks}
pub async fn delete_rows(
    state: web::Data<RestState>,
    path: web::Path<(String, String)>,
    query: web::Query<RowQueryParams>,
) -> HttpResponse {
    let (table, keys) = path.into_inner();
    let lookup_field = query.into_inner().lookup_field;

    let result = run_blocking(&state, move |engine| {
        let outcome = engine.delete_rows(&table, &keys, lookup_field.as_deref())?;
        Ok((table, outcome))
    })
    .await
    .map(|(table, outcome)| {
        state.changes.emit(&ChangeEvent::delete(&table, &outcome));
        MessageResponse {
            message: "Row deleted",
            data: outcome.execution,
        }
    });
    respond(StatusCode::OK, result)
}

/// Health check
pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "restlite",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
