use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::autosave::AutoSaveError;
use crate::persistence::SaveError;
use crate::versions::VersionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resume API error: {0}")]
    ResumeApi(#[from] SaveError),

    #[error("Auto-save unavailable")]
    AutoSaveStopped,
}

impl From<VersionError> for AppError {
    fn from(e: VersionError) -> Self {
        AppError::NotFound(e.to_string())
    }
}

impl From<AutoSaveError> for AppError {
    fn from(e: AutoSaveError) -> Self {
        match e {
            AutoSaveError::Save(e) => AppError::ResumeApi(e),
            AutoSaveError::Stopped => AppError::AutoSaveStopped,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::ResumeApi(e) => {
                tracing::error!("Resume API error: {e}");
                (StatusCode::BAD_GATEWAY, "RESUME_API_ERROR", e.to_string())
            }
            AppError::AutoSaveStopped => (
                StatusCode::SERVICE_UNAVAILABLE,
                "AUTOSAVE_STOPPED",
                "The auto-save scheduler for this session has stopped".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
