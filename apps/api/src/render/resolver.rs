//! Artifact Resolver: loads the compiler output from the workspace.
//!
//! A zero exit code is not trusted on its own: if the output file is absent
//! (or empty) the build is a `missing-artifact` failure.

use std::io;

use bytes::Bytes;
use tracing::debug;

use crate::render::pipeline::{Artifact, BuildFailure, BuildResult, BuildStage};
use crate::render::workspace::Workspace;

pub async fn resolve(workspace: &Workspace) -> BuildResult {
    let path = workspace.output_path();
    match tokio::fs::read(&path).await {
        Ok(bytes) if bytes.is_empty() => Err(BuildFailure::new(
            BuildStage::MissingArtifact,
            "compiler produced an empty output file",
        )),
        Ok(bytes) => {
            debug!(build_id = %workspace.build_id(), size = bytes.len(), "artifact resolved");
            Ok(Artifact::pdf(Bytes::from(bytes)))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BuildFailure::new(
            BuildStage::MissingArtifact,
            "compiler exited successfully but produced no output file",
        )),
        Err(e) => Err(BuildFailure::new(
            BuildStage::MissingArtifact,
            format!("failed to read output file: {e}"),
        )),
    }
}
