pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::render::handlers as render;
use crate::resume::handlers as resume;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume record (display form)
        .route(
            "/api/v1/resume",
            get(resume::handle_get_resume).put(resume::handle_save_resume),
        )
        .route("/api/v1/resume/import", post(resume::handle_import_resume))
        // Build pipeline
        .route("/api/v1/generate", post(render::handle_generate))
        .with_state(state)
}
