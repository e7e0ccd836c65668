use crate::storage::{DateId, DateStore, StoreError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DateStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn DateStore>) -> Self {
        Self { store }
    }
}

/// `?oid=` query
#[derive(Debug, Deserialize)]
pub struct EntryQuery {
    pub oid: Option<String>,
}

impl EntryQuery {
    pub fn date_id(&self) -> Result<DateId, AppError> {
        parse_oid(self.oid.as_deref())
    }
}

/// `?oid=&uid=` query
#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub oid: Option<String>,
    pub uid: Option<String>,
}

impl ReviewQuery {
    pub fn date_id(&self) -> Result<DateId, AppError> {
        parse_oid(self.oid.as_deref())
    }

    pub fn user_id(&self) -> Result<&str, AppError> {
        match self.uid.as_deref().map(str::trim) {
            Some(uid) if !uid.is_empty() => Ok(uid),
            _ => Err(AppError::BadRequest("Missing query parameter: uid".to_string())),
        }
    }
}

fn parse_oid(oid: Option<&str>) -> Result<DateId, AppError> {
    let oid = oid.ok_or_else(|| AppError::BadRequest("Missing query parameter: oid".to_string()))?;
    oid.parse::<DateId>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub const SCHEMA_REJECTION: &str = "date entry does not conform to schema: location and activity are required";
pub const ALREADY_REVIEWED: &str = "Already Reviewed by User";

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{}", SCHEMA_REJECTION)]
    Rejected,
    #[error("{}", ALREADY_REVIEWED)]
    AlreadyReviewed,
    #[error("{0}")]
    Unavailable(String),
    #[error(transparent)]
    Internal(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::Rejected | AppError::AlreadyReviewed => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(e) => {
                error!("Internal error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
