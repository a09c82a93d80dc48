use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::render::{BuildFailure, BuildStage};
use crate::resume::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Build error: {0}")]
    Build(#[from] BuildFailure),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Build(failure) => {
                let body = Json(json!({
                    "error": {
                        "code": build_error_code(failure.stage),
                        "message": failure.message,
                        "stage": failure.stage,
                        "raw_stderr": failure.raw_stderr,
                    }
                }));
                return (build_status(failure.stage), body).into_response();
            }
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

/// Compile failures come from the resume content, so they are the caller's to fix.
fn build_status(stage: BuildStage) -> StatusCode {
    match stage {
        BuildStage::Compile => StatusCode::UNPROCESSABLE_ENTITY,
        BuildStage::Timeout => StatusCode::GATEWAY_TIMEOUT,
        BuildStage::Admission => StatusCode::SERVICE_UNAVAILABLE,
        BuildStage::Workspace | BuildStage::Staging | BuildStage::MissingArtifact => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn build_error_code(stage: BuildStage) -> &'static str {
    match stage {
        BuildStage::Workspace => "WORKSPACE_ERROR",
        BuildStage::Staging => "STAGING_ERROR",
        BuildStage::Compile => "BUILD_FAILED",
        BuildStage::Timeout => "BUILD_TIMEOUT",
        BuildStage::MissingArtifact => "MISSING_ARTIFACT",
        BuildStage::Admission => "BUILD_UNAVAILABLE",
    }
}
