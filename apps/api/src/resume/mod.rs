//! Resume Store: the persistence collaborator the build pipeline reads from.
//!
//! Records are kept in display form (plain text plus the editor's rich-text
//! HTML). Nothing in here escapes for the compiler; that happens once, in
//! `render::stager`.

pub mod handlers;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::resume::StructuredResume;

pub use postgres::PgResumeStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored resume could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn load_resume_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StructuredResume>, StoreError>;

    async fn save_resume_record(
        &self,
        user_id: Uuid,
        resume: &StructuredResume,
    ) -> Result<(), StoreError>;
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    records: RwLock<HashMap<Uuid, StructuredResume>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn load_resume_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StructuredResume>, StoreError> {
        Ok(self.records.read().await.get(&user_id).cloned())
    }

    async fn save_resume_record(
        &self,
        user_id: Uuid,
        resume: &StructuredResume,
    ) -> Result<(), StoreError> {
        self.records.write().await.insert(user_id, resume.clone());
        Ok(())
    }
}
