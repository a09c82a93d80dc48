//! Shared fixtures for build pipeline tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::models::resume::{Education, PersonalInfo, Project, RichText, StructuredResume};
use crate::render::executor::{BuildExecutor, CompilerCommand, ExecReport, ExecutionStrategy};
use crate::render::pipeline::{BuildFailure, BuildStage};
use crate::render::workspace::Workspace;

pub const VALID_ENTRY: &str = "\\documentclass{article}\n\
\\begin{document}\n\
\\directlua{require(\"lua/resume\")}\n\
\\end{document}\n";

pub const MALFORMED_ENTRY: &str = "\\documentclass{article}\n\
\\begin{document}\n\
\\textbf{unclosed\n";

/// An asset bundle with `main.tex` and a one-file `lua/` helper library.
pub fn asset_bundle(entry: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("main.tex"), entry).unwrap();
    std::fs::create_dir(dir.path().join("lua")).unwrap();
    std::fs::write(
        dir.path().join("lua").join("resume.lua"),
        "-- reads _data/*.json\n",
    )
    .unwrap();
    dir
}

pub fn entries(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

pub fn sample_resume(name: &str) -> StructuredResume {
    StructuredResume {
        personal: PersonalInfo {
            name: Some(name.to_string()),
            email: Some("a_b@example.com".to_string()),
            ..Default::default()
        },
        education: vec![Education {
            school: Some("MIT".to_string()),
            degree: Some("BSc".to_string()),
            ..Default::default()
        }],
        experience: Vec::new(),
        projects: vec![Project {
            title: Some("C# tooling".to_string()),
            description: Some(RichText::from("Built <b>fast</b> analyzers")),
            ..Default::default()
        }],
    }
}

/// Writes an executable `#!/bin/sh` script and returns its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

/// A stand-in compiler: `sh <script> -interaction=nonstopmode -shell-escape main.tex`.
pub fn fake_compiler(dir: &Path, body: &str) -> CompilerCommand {
    let script = dir.join("compiler.sh");
    std::fs::write(&script, format!("{body}\n")).unwrap();

    let mut command = CompilerCommand::new("sh", "main.tex");
    command.args.insert(0, script.to_string_lossy().into_owned());
    command
}

#[derive(Debug, Clone, Copy)]
pub enum FakeBehavior {
    WritePdf,
    SucceedWithoutOutput,
    Fail(&'static str),
    Hang,
}

/// Executor double that records how often and how concurrently it ran.
pub struct FakeExecutor {
    behavior: FakeBehavior,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeExecutor {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for FakeExecutor {
    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Direct
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        _timeout: Duration,
    ) -> Result<ExecReport, BuildFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let started = Instant::now();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.behavior {
            FakeBehavior::WritePdf => {
                tokio::fs::write(workspace.output_path(), b"%PDF-1.4\n%%EOF\n")
                    .await
                    .unwrap();
                Ok(())
            }
            FakeBehavior::SucceedWithoutOutput => Ok(()),
            FakeBehavior::Fail(stderr) => Err(BuildFailure {
                stage: BuildStage::Compile,
                message: "compiler exited with exit status: 1".to_string(),
                raw_stderr: stderr.to_string(),
            }),
            FakeBehavior::Hang => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result.map(|()| ExecReport {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            elapsed: started.elapsed(),
        })
    }
}
