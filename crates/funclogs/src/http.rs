use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use funclogs_core::QueryError;
use funclogs_core::executor::QueryExecutor;
use funclogs_core::model::log::LogEntry;
use funclogs_core::query::{LogLookup, StatusResponse, StoredLog};
use funclogs_store::Store;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::protocol::{ErrorBody, LogsQueryParams};

#[derive(Clone)]
pub struct AppState {
    pub executor: QueryExecutor,
    pub store: Store,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required parameters.")]
    MissingParameters,

    #[error("Invalid filter query provided.")]
    InvalidFilterQuery,

    #[error("Internal server error: {0}.")]
    Internal(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::MissingParameter(fields) => {
                tracing::debug!(?fields, "log query missing parameters");
                ApiError::MissingParameters
            }
            QueryError::InvalidFilterQuery(detail) => {
                tracing::warn!(%detail, "log query rejected");
                ApiError::InvalidFilterQuery
            }
            QueryError::Unexpected(detail) => {
                tracing::error!(%detail, "log query failed");
                ApiError::Internal(detail)
            }
        }
    }
}

fn internal_error<E: ToString>(err: E) -> ApiError {
    ApiError::Internal(err.to_string())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingParameters | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidFilterQuery => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/logs/{cloud_function_name}", get(get_logs))
        .route("/entries", post(create_entry))
        .route("/entries/{key}", get(get_entry))
        .route("/status", get(status))
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn get_logs(
    State(state): State<AppState>,
    Path(cloud_function_name): Path<String>,
    Query(params): Query<LogsQueryParams>,
) -> Result<Json<Vec<LogEntry>>, ApiError> {
    let req = params.into_request(cloud_function_name)?;
    let entries = state.executor.query(&req).await?;
    tracing::debug!(
        function = %req.target_name,
        region = %req.target_region,
        count = entries.len(),
        "log query served"
    );
    Ok(Json(entries))
}

async fn create_entry(
    State(state): State<AppState>,
    body: Result<Json<LogEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<StoredLog>), ApiError> {
    let Json(entry) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let stored = state.store.insert_log(&entry).map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StoredLog>, ApiError> {
    let lookup = key
        .parse::<LogLookup>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    match state.store.find_log(&lookup).map_err(internal_error)? {
        Some(stored) => Ok(Json(stored)),
        None => Err(ApiError::NotFound(format!("no log entry with {lookup}"))),
    }
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    state.store.status().map(Json).map_err(internal_error)
}
