use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::render::{ExecutionStrategy, ExecutorSettings};

/// Application configuration loaded from environment variables once at startup.
/// The build strategy and asset root are fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resume Store database. Without it records live in process memory.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Asset bundle root: `main.tex` and the `lua/` helper library.
    pub assets_path: PathBuf,
    /// Parent directory of per-build workspaces.
    pub scratch_root: PathBuf,
    pub build_strategy: ExecutionStrategy,
    pub compiler: String,
    pub container_runtime: String,
    pub container_image: String,
    pub build_timeout: Duration,
    /// How long a request waits for a free build slot before a 503.
    pub queue_timeout: Duration,
    pub max_concurrent_builds: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let assets_path = match optional_env("RESUME_ASSETS_PATH") {
            Some(path) => PathBuf::from(path),
            None => std::env::current_dir()
                .context("cannot determine working directory for default RESUME_ASSETS_PATH")?
                .join("..")
                .join("tex"),
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            assets_path,
            scratch_root: optional_env("BUILD_SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            build_strategy: resolve_strategy(
                optional_env("BUILD_STRATEGY").as_deref(),
                optional_env("IS_CONTAINERIZED").as_deref(),
            )?,
            compiler: optional_env("BUILD_COMPILER").unwrap_or_else(|| "lualatex".to_string()),
            container_runtime: optional_env("BUILD_CONTAINER_RUNTIME")
                .unwrap_or_else(|| "docker".to_string()),
            container_image: optional_env("BUILD_CONTAINER_IMAGE")
                .unwrap_or_else(|| "resume-builder".to_string()),
            build_timeout: Duration::from_secs(parse_env("BUILD_TIMEOUT_SECS", 60)?),
            queue_timeout: Duration::from_secs(parse_env("BUILD_QUEUE_TIMEOUT_SECS", 30)?),
            max_concurrent_builds: match optional_env("MAX_CONCURRENT_BUILDS") {
                Some(raw) => raw
                    .parse::<usize>()
                    .context("MAX_CONCURRENT_BUILDS must be a positive integer")?,
                None => std::thread::available_parallelism().map_or(2, |n| n.get()),
            },
        })
    }

    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            compiler: self.compiler.clone(),
            container_runtime: self.container_runtime.clone(),
            container_image: self.container_image.clone(),
        }
    }
}

/// `BUILD_STRATEGY` wins. Otherwise the legacy `IS_CONTAINERIZED=true` means the
/// service already runs inside the toolchain image, so the compiler runs directly.
fn resolve_strategy(
    build_strategy: Option<&str>,
    is_containerized: Option<&str>,
) -> Result<ExecutionStrategy> {
    if let Some(raw) = build_strategy {
        return raw.parse().context("invalid BUILD_STRATEGY");
    }
    Ok(match is_containerized {
        Some(flag) if flag.eq_ignore_ascii_case("true") => ExecutionStrategy::Direct,
        _ => ExecutionStrategy::Containerized,
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
