//! Axum route handlers for the resume record.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::StructuredResume;
use crate::render::stager::{from_markup, map_string_leaves, unescape_leaf};
use crate::state::AppState;

const SECTIONS: [&str; 4] = ["personal", "education", "experience", "projects"];

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SaveResumeRequest {
    pub user_id: Uuid,
    pub resume: StructuredResume,
}

/// A record exported from the previous editor: sections in compiler-bound
/// form (escaped markup), each either a JSON value or a JSON-encoded string.
#[derive(Debug, Deserialize)]
pub struct ImportResumeRequest {
    pub user_id: Uuid,
    pub resume: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub resume: StructuredResume,
}

/// GET /api/v1/resume?user_id=
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = state
        .store
        .load_resume_record(params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume for user {} not found", params.user_id)))?;

    Ok(Json(ResumeResponse { resume }))
}

/// PUT /api/v1/resume
pub async fn handle_save_resume(
    State(state): State<AppState>,
    Json(request): Json<SaveResumeRequest>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = request.resume.normalize_legacy();
    state
        .store
        .save_resume_record(request.user_id, &resume)
        .await?;

    Ok(Json(ResumeResponse { resume }))
}

/// POST /api/v1/resume/import
///
/// Converts a legacy record to display form and saves it, so the stager
/// escapes it exactly once at build time. Every leaf is unescaped; only the
/// rich-text fields are converted from markup to HTML.
pub async fn handle_import_resume(
    State(state): State<AppState>,
    Json(request): Json<ImportResumeRequest>,
) -> Result<Json<ResumeResponse>, AppError> {
    let resume = legacy_to_display(request.resume)?;
    state
        .store
        .save_resume_record(request.user_id, &resume)
        .await?;
    info!(user_id = %request.user_id, "legacy resume imported");

    Ok(Json(ResumeResponse { resume }))
}

fn legacy_to_display(mut sections: Map<String, Value>) -> Result<StructuredResume, AppError> {
    let mut decoded = Map::new();
    for name in SECTIONS {
        let Some(section) = sections.remove(name) else {
            continue;
        };
        let section = match section {
            Value::String(encoded) => serde_json::from_str(&encoded).map_err(|e| {
                AppError::Validation(format!("section '{name}' is not valid JSON: {e}"))
            })?,
            other => other,
        };
        decoded.insert(name.to_string(), map_string_leaves(section, &unescape_leaf));
    }

    let resume: StructuredResume = serde_json::from_value(Value::Object(decoded))
        .map_err(|e| AppError::Validation(format!("resume has an unexpected shape: {e}")))?;
    Ok(from_markup(resume).normalize_legacy())
}
