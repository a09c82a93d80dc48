//! Axum route handlers for the Build Pipeline.

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::render::pipeline::BuildRequest;
use crate::state::AppState;

const ATTACHMENT: &str = "attachment; filename=\"resume.pdf\"";

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: Uuid,
    #[serde(default, alias = "jobDescription")]
    pub job_description: Option<String>,
}

/// POST /api/v1/generate
///
/// Loads the user's resume and builds it. Returns the PDF, or the structured
/// build failure. The request waits for the build to finish; dropping the
/// connection cancels the build and kills the compiler.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, AppError> {
    let resume = state
        .store
        .load_resume_record(request.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume data not found".to_string()))?;

    let build = BuildRequest::new(resume, request.job_description);
    let artifact = state.pipeline.generate(build).await?;

    Ok((
        [(CONTENT_TYPE, artifact.mime_type), (CONTENT_DISPOSITION, ATTACHMENT)],
        artifact.bytes,
    )
        .into_response())
}
