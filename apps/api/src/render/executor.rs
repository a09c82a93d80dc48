//! Build Executor: runs the typesetting compiler against a staged workspace.
//!
//! Two strategies share one contract: the same command line, the same exit
//! code interpretation and the same output path. The strategy is chosen once
//! at startup (`executor_for`) and never per request.
//!
//! Exit code zero is success; anything else is a terminal `compile` failure
//! carrying stderr. Stdout is logged, never inspected. There are no retries.

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::render::pipeline::{BuildFailure, BuildStage};
use crate::render::workspace::Workspace;

/// Where the workspace is mounted inside the toolchain container.
pub const CONTAINER_DATA_PATH: &str = "/data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// The compiler runs as a child process of this service.
    Direct,
    /// The compiler runs in a disposable container.
    Containerized,
}

#[derive(Debug, Error)]
#[error("unknown execution strategy '{0}' (expected 'direct' or 'containerized')")]
pub struct UnknownStrategy(String);

impl FromStr for ExecutionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "containerized" | "container" | "docker" => Ok(Self::Containerized),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Containerized => f.write_str("containerized"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect compiler output: {0}")]
    Wait(#[source] std::io::Error),
}

/// The compiler invocation, identical under both strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl CompilerCommand {
    /// `<program> -interaction=nonstopmode -shell-escape <entry>`: never prompt,
    /// and allow the helper scripts embedded in the entry document to run.
    pub fn new(program: impl Into<String>, entry_document: &str) -> Self {
        Self {
            program: program.into(),
            args: vec![
                "-interaction=nonstopmode".to_string(),
                "-shell-escape".to_string(),
                entry_document.to_string(),
            ],
        }
    }
}

/// What a finished compiler run looked like.
#[derive(Debug, Clone)]
pub struct ExecReport {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

#[async_trait]
pub trait BuildExecutor: Send + Sync {
    fn strategy(&self) -> ExecutionStrategy;

    /// Runs the compiler in `workspace`. A run longer than `timeout` is killed
    /// and reported as a `timeout` failure.
    async fn compile(
        &self,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<ExecReport, BuildFailure>;
}

/// Settings for both strategies, taken from `Config` at startup.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub compiler: String,
    pub container_runtime: String,
    pub container_image: String,
}

/// Picks the executor for the process lifetime.
pub fn executor_for(
    strategy: ExecutionStrategy,
    settings: &ExecutorSettings,
) -> Arc<dyn BuildExecutor> {
    match strategy {
        ExecutionStrategy::Direct => Arc::new(DirectExecutor::new(settings.compiler.clone())),
        ExecutionStrategy::Containerized => Arc::new(ContainerExecutor::new(
            settings.container_runtime.clone(),
            settings.container_image.clone(),
            settings.compiler.clone(),
        )),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Direct
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DirectExecutor {
    compiler: String,
    // Overrides the default command line; lets tests substitute a stand-in compiler.
    command: Option<CompilerCommand>,
}

impl DirectExecutor {
    pub fn new(compiler: impl Into<String>) -> Self {
        Self {
            compiler: compiler.into(),
            command: None,
        }
    }

    #[cfg(test)]
    pub fn with_command(command: CompilerCommand) -> Self {
        Self {
            compiler: command.program.clone(),
            command: Some(command),
        }
    }

    fn command_for(&self, workspace: &Workspace) -> Command {
        let compiler = self
            .command
            .clone()
            .unwrap_or_else(|| CompilerCommand::new(&self.compiler, workspace.entry_document()));
        let mut cmd = Command::new(&compiler.program);
        cmd.args(&compiler.args).current_dir(workspace.root());
        cmd
    }
}

#[async_trait]
impl BuildExecutor for DirectExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Direct
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<ExecReport, BuildFailure> {
        run_to_completion(self.command_for(workspace), workspace, timeout).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Containerized
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
    image: String,
    compiler: String,
}

impl ContainerExecutor {
    pub fn new(
        runtime: impl Into<String>,
        image: impl Into<String>,
        compiler: impl Into<String>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            image: image.into(),
            compiler: compiler.into(),
        }
    }

    fn container_name(workspace: &Workspace) -> String {
        format!("resume-build-{}", workspace.build_id())
    }

    fn command_for(&self, workspace: &Workspace) -> Command {
        let compiler = CompilerCommand::new(&self.compiler, workspace.entry_document());
        let mount = format!("{}:{CONTAINER_DATA_PATH}", workspace.root().display());

        let mut cmd = Command::new(&self.runtime);
        cmd.args(["run", "--rm", "--name"])
            .arg(Self::container_name(workspace))
            .args(["-v", mount.as_str(), "-w", CONTAINER_DATA_PATH])
            .arg(&self.image)
            .arg(&compiler.program)
            .args(&compiler.args);
        cmd
    }
}

#[async_trait]
impl BuildExecutor for ContainerExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Containerized
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<ExecReport, BuildFailure> {
        // Killing the runtime client does not stop the container, so a timed-out
        // or abandoned run removes it by name.
        let mut guard = ContainerGuard {
            runtime: self.runtime.clone(),
            name: Self::container_name(workspace),
            armed: true,
        };

        let result = run_to_completion(self.command_for(workspace), workspace, timeout).await;
        if !matches!(&result, Err(failure) if failure.stage == BuildStage::Timeout) {
            guard.armed = false;
        }
        result
    }
}

struct ContainerGuard {
    runtime: String,
    name: String,
    armed: bool,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(container = %self.name, "force-removing build container");
        let spawned = std::process::Command::new(&self.runtime)
            .args(["rm", "-f", self.name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            // Reap off the async runtime.
            Ok(mut child) => {
                std::thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => warn!(container = %self.name, "failed to remove container: {e}"),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared process handling
// ────────────────────────────────────────────────────────────────────────────

async fn run_to_completion(
    mut cmd: Command,
    workspace: &Workspace,
    timeout: Duration,
) -> Result<ExecReport, BuildFailure> {
    let build_id = workspace.build_id();
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    // Dropping the child (timeout, cancelled request) kills it.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let started = Instant::now();
    let child = cmd
        .spawn()
        .map_err(|source| ExecError::Spawn { program, source })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(ExecError::Wait(e).into()),
        Err(_) => {
            warn!(%build_id, "compiler exceeded {}s, killed", timeout.as_secs_f32());
            return Err(BuildFailure::new(
                BuildStage::Timeout,
                format!("compiler did not finish within {}s", timeout.as_secs_f32()),
            ));
        }
    };

    let report = ExecReport {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: started.elapsed(),
    };
    debug!(%build_id, stdout = %report.stdout, "compiler output");

    if output.status.success() {
        info!(%build_id, elapsed_ms = report.elapsed.as_millis() as u64, "compiler finished");
        Ok(report)
    } else {
        warn!(%build_id, status = %output.status, "compiler failed");
        Err(BuildFailure {
            stage: BuildStage::Compile,
            message: format!("compiler exited with {}", output.status),
            raw_stderr: report.stderr,
        })
    }
}
