use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::models::resume::StructuredResume;
use crate::resume::{ResumeStore, StoreError};

/// PostgreSQL-backed store. One row per user:
///
/// ```sql
/// CREATE TABLE resumes (
///     user_id    UUID PRIMARY KEY,
///     personal   JSONB NOT NULL DEFAULT '{}',
///     education  JSONB NOT NULL DEFAULT '[]',
///     experience JSONB NOT NULL DEFAULT '[]',
///     projects   JSONB NOT NULL DEFAULT '[]',
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
/// );
/// ```
#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ResumeRecordRow {
    personal: Value,
    education: Value,
    experience: Value,
    projects: Value,
}

impl ResumeRecordRow {
    fn into_resume(self) -> Result<StructuredResume, serde_json::Error> {
        let resume: StructuredResume = serde_json::from_value(json!({
            "personal": self.personal,
            "education": self.education,
            "experience": self.experience,
            "projects": self.projects,
        }))?;
        Ok(resume.normalize_legacy())
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn load_resume_record(
        &self,
        user_id: Uuid,
    ) -> Result<Option<StructuredResume>, StoreError> {
        let row = sqlx::query_as::<_, ResumeRecordRow>(
            "SELECT personal, education, experience, projects FROM resumes WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.into_resume()?)),
            None => {
                debug!(%user_id, "no resume record");
                Ok(None)
            }
        }
    }

    async fn save_resume_record(
        &self,
        user_id: Uuid,
        resume: &StructuredResume,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO resumes (user_id, personal, education, experience, projects)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE
            SET personal = EXCLUDED.personal,
                education = EXCLUDED.education,
                experience = EXCLUDED.experience,
                projects = EXCLUDED.projects,
                updated_at = now()
            "#,
        )
        .bind(user_id)
        .bind(Json(&resume.personal))
        .bind(Json(&resume.education))
        .bind(Json(&resume.experience))
        .bind(Json(&resume.projects))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_decodes_legacy_shapes() {
        let row = ResumeRecordRow {
            personal: json!([{ "name": "Grace Hopper" }]),
            education: json!([{ "school": "Yale", "degree": "PhD; CGPA: 4.0" }]),
            experience: json!([]),
            projects: json!([{ "title": "COBOL" }]),
        };

        let resume = row.into_resume().unwrap();
        assert_eq!(resume.personal.name.as_deref(), Some("Grace Hopper"));
        assert_eq!(resume.education[0].degree.as_deref(), Some("PhD"));
        assert_eq!(resume.education[0].cgpa.as_deref(), Some("4.0"));
        assert_eq!(resume.projects[0].title.as_deref(), Some("COBOL"));
    }
}
