//! Data Stager: writes the resume into the workspace's `_data/` directory.
//!
//! Rich-text fields pass through the rich-text bridge first. Then every string
//! leaf, the transient context included, is escaped exactly once on its way
//! into these files. Plain fields never see the bridge. Objects and arrays are
//! walked structurally; keys and non-string leaves are untouched.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::resume::StructuredResume;
use crate::render::escape::{escape, unescape};
use crate::render::pipeline::BuildRequest;
use crate::render::rich_text::{html_to_markup, markup_to_html};
use crate::render::workspace::Workspace;

pub const PERSONAL_FILE: &str = "personal.json";
pub const EDUCATION_FILE: &str = "edu.json";
pub const EXPERIENCE_FILE: &str = "exp.json";
pub const PROJECTS_FILE: &str = "proj.json";
/// Optional. The entry document must build without it.
pub const CONTEXT_FILE: &str = "job_description.json";

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to serialize {section}: {source}")]
    Serialize {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn escape_leaf(text: &str) -> String {
    escape(text).into_owned()
}

pub fn unescape_leaf(text: &str) -> String {
    unescape(text).into_owned()
}

/// Display form → compiler-bound form, before leaf escaping.
pub fn to_markup(resume: &StructuredResume) -> StructuredResume {
    resume.clone().map_rich_text(html_to_markup)
}

/// Unescaped compiler-bound form → display form.
pub fn from_markup(resume: StructuredResume) -> StructuredResume {
    resume.map_rich_text(markup_to_html)
}

/// Rebuilds `node` with `f` applied to every string leaf.
pub fn map_string_leaves<F>(node: Value, f: &F) -> Value
where
    F: Fn(&str) -> String,
{
    match node {
        Value::String(text) => Value::String(f(&text)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| map_string_leaves(item, f))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, map_string_leaves(value, f)))
                .collect(),
        ),
        leaf @ (Value::Null | Value::Bool(_) | Value::Number(_)) => leaf,
    }
}

/// Writes one file per resume section, plus the transient context when present.
pub async fn stage(workspace: &Workspace, request: &BuildRequest) -> Result<(), StagingError> {
    let data_dir = workspace.data_dir();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .map_err(|source| StagingError::Write {
            path: data_dir.clone(),
            source,
        })?;

    let resume = to_markup(&request.resume);
    // The helper library reads `personal` as a one-element list.
    write_section(
        &data_dir,
        PERSONAL_FILE,
        "personal",
        std::slice::from_ref(&resume.personal),
    )
    .await?;
    write_section(&data_dir, EDUCATION_FILE, "education", &resume.education).await?;
    write_section(&data_dir, EXPERIENCE_FILE, "experience", &resume.experience).await?;
    write_section(&data_dir, PROJECTS_FILE, "projects", &resume.projects).await?;

    if let Some(context) = request
        .transient_context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        let document = json!({ "description": escape(context) });
        write_json(&data_dir.join(CONTEXT_FILE), "transient context", &document).await?;
    }

    debug!(build_id = %workspace.build_id(), "resume data staged");
    Ok(())
}

async fn write_section<T>(
    data_dir: &Path,
    file: &str,
    section: &'static str,
    value: &T,
) -> Result<(), StagingError>
where
    T: Serialize + ?Sized,
{
    let tree = serde_json::to_value(value)
        .map_err(|source| StagingError::Serialize { section, source })?;
    let encoded = map_string_leaves(tree, &escape_leaf);
    write_json(&data_dir.join(file), section, &encoded).await
}

async fn write_json(path: &Path, section: &'static str, value: &Value) -> Result<(), StagingError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| StagingError::Serialize { section, source })?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| StagingError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resume::{Experience, ExperienceDetail, PersonalInfo, Project, RichText};
    use crate::render::testing::{asset_bundle, sample_resume, VALID_ENTRY};
    use crate::render::workspace::{AssetBundle, WorkspaceManager};
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn read_json(workspace: &Workspace, file: &str) -> Value {
        let bytes = tokio::fs::read(workspace.data_dir().join(file)).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_map_string_leaves_walks_structure() {
        let input = json!({
            "a_b": "x_y",
            "list": ["50%", 3, true, null, { "deep": "#1" }]
        });
        let out = map_string_leaves(input, &|s: &str| escape(s).into_owned());
        assert_eq!(
            out,
            json!({
                "a_b": "x\\_y",
                "list": ["50\\%", 3, true, null, { "deep": "\\#1" }]
            })
        );
    }

    #[test]
    fn test_to_markup_only_touches_rich_fields() {
        let resume = StructuredResume {
            projects: vec![Project {
                title: Some("Vec<String> parser".to_string()),
                description: Some(RichText::from("R&amp;D <b>50%</b>")),
                ..Default::default()
            }],
            ..Default::default()
        };

        let markup = to_markup(&resume);
        assert_eq!(markup.projects[0].title.as_deref(), Some("Vec<String> parser"));
        assert_eq!(
            markup.projects[0].description.as_deref(),
            Some(r"R&D \textbf{50%}")
        );
    }

    #[test]
    fn test_from_markup_inverts_to_markup() {
        let resume = StructuredResume {
            personal: PersonalInfo {
                name: Some("A & B".to_string()),
                summary: Some(RichText::from("Cut costs <b>30%</b><br>for R&amp;D")),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(from_markup(to_markup(&resume)), resume);
    }

    #[tokio::test]
    async fn test_stage_writes_escaped_sections() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let request = BuildRequest::new(sample_resume("A & B"), None);
        stage(&workspace, &request).await.unwrap();

        let personal = read_json(&workspace, PERSONAL_FILE).await;
        assert_eq!(personal[0]["name"], r"A \& B");
        assert_eq!(personal[0]["email"], r"a\_b@example.com");

        let edu = read_json(&workspace, EDUCATION_FILE).await;
        assert_eq!(edu[0]["school"], "MIT");

        let proj = read_json(&workspace, PROJECTS_FILE).await;
        assert_eq!(proj[0]["title"], r"C\# tooling");

        assert!(!workspace.data_dir().join(CONTEXT_FILE).exists());
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_bold_detail_has_no_raw_angle_brackets() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let resume = StructuredResume {
            experience: vec![Experience {
                company: Some("Acme".to_string()),
                details: vec![ExperienceDetail {
                    title: Some("Leadership".to_string()),
                    description: Some(RichText::from("Led a <b>team</b> of 5")),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        stage(&workspace, &BuildRequest::new(resume, None)).await.unwrap();

        let exp = read_json(&workspace, EXPERIENCE_FILE).await;
        let description = exp[0]["details"][0]["description"].as_str().unwrap();
        assert_eq!(description, r"Led a \textbf{team} of 5");
        assert!(!description.contains('<') && !description.contains('>'));
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_plain_fields_only_escaped() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let mut resume = sample_resume("Jane <Doe> & Co");
        resume.projects[0].title = Some("Vec<String> parser_v2".to_string());
        resume.education[0].degree = Some("<b>BSc</b>".to_string());
        stage(&workspace, &BuildRequest::new(resume, Some("<b>Rust</b>".to_string())))
            .await
            .unwrap();

        let personal = read_json(&workspace, PERSONAL_FILE).await;
        assert_eq!(personal[0]["name"], r"Jane <Doe> \& Co");
        let proj = read_json(&workspace, PROJECTS_FILE).await;
        assert_eq!(proj[0]["title"], r"Vec<String> parser\_v2");
        assert_eq!(proj[0]["description"], r"Built \textbf{fast} analyzers");
        let edu = read_json(&workspace, EDUCATION_FILE).await;
        assert_eq!(edu[0]["degree"], "<b>BSc</b>");
        let context = read_json(&workspace, CONTEXT_FILE).await;
        assert_eq!(context["description"], "<b>Rust</b>");
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_writes_transient_context() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let request = BuildRequest::new(
            StructuredResume::default(),
            Some("Rust & Go, 100% remote".to_string()),
        );
        stage(&workspace, &request).await.unwrap();

        let context = read_json(&workspace, CONTEXT_FILE).await;
        assert_eq!(context["description"], r"Rust \& Go, 100\% remote");

        let personal = read_json(&workspace, PERSONAL_FILE).await;
        assert_eq!(personal, json!([{}]));
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_skips_blank_context() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let request = BuildRequest::new(StructuredResume::default(), Some("   ".to_string()));
        stage(&workspace, &request).await.unwrap();

        assert!(!workspace.data_dir().join(CONTEXT_FILE).exists());
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_stage_does_not_mutate_request() {
        let assets = asset_bundle(VALID_ENTRY);
        let scratch = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(scratch.path(), AssetBundle::new(assets.path()));
        let workspace = manager.acquire(Uuid::new_v4()).await.unwrap();

        let request = BuildRequest::new(sample_resume("A & B"), None);
        let before = request.resume.clone();
        stage(&workspace, &request).await.unwrap();

        assert_eq!(request.resume, before);
        workspace.release().await.unwrap();
    }
}
