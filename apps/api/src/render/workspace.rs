//! Workspace Manager: one isolated scratch directory per build.
//!
//! Layout of a workspace root:
//!
//! ```text
//! resume-build-<build_id>/
//!   main.tex        entry document (copied from the asset bundle)
//!   lua/            helper library (copied from the asset bundle)
//!   _data/          section files written by the stager
//!   main.pdf        compiler output
//! ```
//!
//! A [`Workspace`] is a guard: [`Workspace::release`] removes it and reports
//! failures, and dropping an unreleased workspace removes it synchronously.
//! Error propagation, panics and cancelled requests therefore never leave a
//! directory behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ENTRY_DOCUMENT: &str = "main.tex";
pub const HELPER_LIBRARY: &str = "lua";
pub const DATA_DIR: &str = "_data";
const WORKSPACE_PREFIX: &str = "resume-build-";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("scratch root {path:?} is not usable: {source}")]
    ScratchRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("asset bundle is missing {0:?}")]
    MissingAsset(PathBuf),

    #[error("failed to create workspace {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {from:?} into workspace: {source}")]
    Copy {
        from: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove workspace {path:?}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("workspace setup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The read-only bundle copied into every workspace.
#[derive(Debug, Clone)]
pub struct AssetBundle {
    pub root: PathBuf,
    pub entry_document: String,
    pub helper_library: String,
}

impl AssetBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entry_document: ENTRY_DOCUMENT.to_string(),
            helper_library: HELPER_LIBRARY.to_string(),
        }
    }

    fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry_document)
    }

    fn helper_path(&self) -> PathBuf {
        self.root.join(&self.helper_library)
    }

    /// Fails fast when the bundle is incomplete.
    pub fn verify(&self) -> Result<(), WorkspaceError> {
        let entry = self.entry_path();
        if !entry.is_file() {
            return Err(WorkspaceError::MissingAsset(entry));
        }
        let helpers = self.helper_path();
        if !helpers.is_dir() {
            return Err(WorkspaceError::MissingAsset(helpers));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    scratch_root: PathBuf,
    assets: AssetBundle,
}

impl WorkspaceManager {
    pub fn new(scratch_root: impl Into<PathBuf>, assets: AssetBundle) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            assets,
        }
    }

    /// Creates `resume-build-<build_id>` under the scratch root and copies the
    /// asset bundle into it. Fails if the directory already exists.
    pub async fn acquire(&self, build_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let scratch_root = self.scratch_root.clone();
        let assets = self.assets.clone();
        let workspace =
            tokio::task::spawn_blocking(move || prepare(&scratch_root, &assets, build_id))
                .await??;
        debug!(%build_id, root = ?workspace.root, "workspace acquired");
        Ok(workspace)
    }
}

fn prepare(
    scratch_root: &Path,
    assets: &AssetBundle,
    build_id: Uuid,
) -> Result<Workspace, WorkspaceError> {
    fs::create_dir_all(scratch_root).map_err(|source| WorkspaceError::ScratchRoot {
        path: scratch_root.to_path_buf(),
        source,
    })?;
    assets.verify()?;

    let root = scratch_root.join(format!("{WORKSPACE_PREFIX}{build_id}"));
    fs::create_dir(&root).map_err(|source| WorkspaceError::Create {
        path: root.clone(),
        source,
    })?;

    // From here on the guard owns the directory; early returns clean up.
    let workspace = Workspace {
        build_id,
        root,
        entry_document: assets.entry_document.clone(),
        released: false,
    };

    let entry = assets.entry_path();
    fs::copy(&entry, workspace.root.join(&assets.entry_document))
        .map_err(|source| WorkspaceError::Copy {
            from: entry.clone(),
            source,
        })?;

    let helpers = assets.helper_path();
    copy_dir(&helpers, &workspace.root.join(&assets.helper_library)).map_err(|source| {
        WorkspaceError::Copy {
            from: helpers.clone(),
            source,
        }
    })?;

    Ok(workspace)
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// An acquired build workspace. See the module docs for the cleanup contract.
#[derive(Debug)]
pub struct Workspace {
    build_id: Uuid,
    root: PathBuf,
    entry_document: String,
    released: bool,
}

impl Workspace {
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_document(&self) -> &str {
        &self.entry_document
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// `main.tex` → `main.pdf`, next to the entry document.
    pub fn output_path(&self) -> PathBuf {
        self.root
            .join(Path::new(&self.entry_document).with_extension("pdf"))
    }

    /// Removes the workspace. Consumes the guard, so it runs at most once.
    pub async fn release(mut self) -> Result<(), WorkspaceError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WorkspaceError::Remove {
                    path: self.root.clone(),
                    source,
                })
            }
        }
        self.released = true;
        debug!(build_id = %self.build_id, "workspace released");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match fs::remove_dir_all(&self.root) {
            Ok(()) => debug!(build_id = %self.build_id, "workspace removed on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                build_id = %self.build_id,
                root = ?self.root,
                "failed to remove workspace on drop: {e}"
            ),
        }
    }
}
