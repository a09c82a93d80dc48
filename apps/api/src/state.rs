use std::sync::Arc;

use crate::render::BuildPipeline;
use crate::resume::ResumeStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Resume Store. PostgreSQL when DATABASE_URL is set, in-memory otherwise.
    pub store: Arc<dyn ResumeStore>,
    /// One pipeline per process; its executor strategy is fixed at startup.
    pub pipeline: Arc<BuildPipeline>,
}
