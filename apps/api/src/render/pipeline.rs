//! Build Pipeline: workspace acquire → stage → compile → resolve → release.
//!
//! `generate` produces exactly one of `Artifact` or `BuildFailure` per request.
//! Staging, compilation and resolution run as one unit inside the workspace
//! guard: the workspace is released on every path, and a dropped `generate`
//! future (client went away) still kills the compiler and removes the directory.
//!
//! Concurrent builds are bounded by a semaphore sized at startup. A request
//! that cannot get a slot within the queue timeout fails at `admission`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::resume::StructuredResume;
use crate::render::executor::{BuildExecutor, ExecError, ExecutionStrategy};
use crate::render::resolver::resolve;
use crate::render::stager::{stage, StagingError};
use crate::render::workspace::{Workspace, WorkspaceError, WorkspaceManager};

pub const PDF_MIME: &str = "application/pdf";

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// One build. `build_id` names the workspace, so it is a fresh v4 UUID.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub build_id: Uuid,
    pub resume: StructuredResume,
    /// Job description or similar, written to its own optional data file.
    pub transient_context: Option<String>,
}

impl BuildRequest {
    pub fn new(resume: StructuredResume, transient_context: Option<String>) -> Self {
        Self {
            build_id: Uuid::new_v4(),
            resume,
            transient_context,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Bytes,
    pub mime_type: &'static str,
}

impl Artifact {
    pub fn pdf(bytes: Bytes) -> Self {
        Self {
            bytes,
            mime_type: PDF_MIME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildStage {
    /// Workspace setup or teardown.
    Workspace,
    Staging,
    /// Compiler exited non-zero or could not be started.
    Compile,
    Timeout,
    /// Compiler exited zero but left no output.
    MissingArtifact,
    /// No build slot became free within the queue timeout.
    Admission,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Workspace => "workspace",
            Self::Staging => "staging",
            Self::Compile => "compile",
            Self::Timeout => "timeout",
            Self::MissingArtifact => "missing-artifact",
            Self::Admission => "admission",
        };
        f.write_str(name)
    }
}

/// A terminal build failure, reported to the caller as-is.
#[derive(Debug, Clone, Serialize, Error)]
#[error("build failed at {stage}: {message}")]
pub struct BuildFailure {
    pub stage: BuildStage,
    pub message: String,
    /// Compiler stderr; empty for failures outside the compile stage.
    pub raw_stderr: String,
}

impl BuildFailure {
    pub fn new(stage: BuildStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            raw_stderr: String::new(),
        }
    }
}

impl From<WorkspaceError> for BuildFailure {
    fn from(e: WorkspaceError) -> Self {
        Self::new(BuildStage::Workspace, e.to_string())
    }
}

impl From<StagingError> for BuildFailure {
    fn from(e: StagingError) -> Self {
        Self::new(BuildStage::Staging, e.to_string())
    }
}

impl From<ExecError> for BuildFailure {
    fn from(e: ExecError) -> Self {
        Self::new(BuildStage::Compile, e.to_string())
    }
}

pub type BuildResult = Result<Artifact, BuildFailure>;

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

pub struct BuildPipeline {
    workspaces: WorkspaceManager,
    executor: Arc<dyn BuildExecutor>,
    timeout: Duration,
    queue_timeout: Duration,
    permits: Semaphore,
}

impl BuildPipeline {
    pub fn new(
        workspaces: WorkspaceManager,
        executor: Arc<dyn BuildExecutor>,
        timeout: Duration,
        max_concurrent_builds: usize,
    ) -> Self {
        Self {
            workspaces,
            executor,
            timeout,
            queue_timeout: timeout,
            permits: Semaphore::new(max_concurrent_builds.max(1)),
        }
    }

    /// How long a request may wait for a free build slot. Defaults to the
    /// compile timeout.
    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.executor.strategy()
    }

    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn generate(&self, request: BuildRequest) -> BuildResult {
        let build_id = request.build_id;
        let _permit = match tokio::time::timeout(self.queue_timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(BuildFailure::new(BuildStage::Admission, "build queue is closed"))
            }
            Err(_) => {
                warn!(%build_id, "no build slot within {}s", self.queue_timeout.as_secs_f32());
                return Err(BuildFailure::new(
                    BuildStage::Admission,
                    format!(
                        "all build slots busy for {}s, try again later",
                        self.queue_timeout.as_secs_f32()
                    ),
                ));
            }
        };

        let started = Instant::now();
        info!(%build_id, strategy = %self.strategy(), "build started");

        let workspace = self.workspaces.acquire(build_id).await.map_err(|e| {
            error!(%build_id, "workspace setup failed: {e}");
            BuildFailure::from(e)
        })?;

        let outcome = self.run(&workspace, &request).await;
        let released = workspace.release().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match (outcome, released) {
            (Ok(artifact), Ok(())) => {
                info!(%build_id, elapsed_ms, size = artifact.bytes.len(), "build succeeded");
                Ok(artifact)
            }
            (Ok(_), Err(e)) => {
                error!(%build_id, "workspace release failed: {e}");
                Err(e.into())
            }
            (Err(failure), released) => {
                if let Err(e) = released {
                    error!(%build_id, "workspace release failed: {e}");
                }
                warn!(%build_id, elapsed_ms, stage = %failure.stage, "build failed: {}", failure.message);
                Err(failure)
            }
        }
    }

    async fn run(&self, workspace: &Workspace, request: &BuildRequest) -> BuildResult {
        stage(workspace, request).await?;
        let report = self.executor.compile(workspace, self.timeout).await?;
        debug!(
            build_id = %workspace.build_id(),
            exit_code = ?report.exit_code,
            stderr_len = report.stderr.len(),
            "compile step done"
        );
        resolve(workspace).await
    }
}
