use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::resume::{MemoryResumeStore, PgResumeStore, ResumeStore};

/// Builds the Resume Store: PostgreSQL when a URL is configured, otherwise an
/// in-memory store whose records vanish with the process.
pub async fn connect_store(database_url: Option<&str>) -> Result<Arc<dyn ResumeStore>> {
    let Some(url) = database_url else {
        warn!("DATABASE_URL not set; resume records are kept in memory only");
        return Ok(Arc::new(MemoryResumeStore::new()));
    };

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .context("failed to connect to the resume database")?;

    info!("PostgreSQL connection pool established");
    Ok(Arc::new(PgResumeStore::new(pool)))
}
