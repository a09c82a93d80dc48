// Build Pipeline: turns a StructuredResume into a PDF.
// Flow: workspace acquire → stage data files → compile → resolve artifact → release.
// The escaping codec and rich-text bridge are pure functions shared with the
// resume import path.

pub mod escape;
pub mod executor;
pub mod handlers;
pub mod pipeline;
pub mod resolver;
pub mod rich_text;
pub mod stager;
pub mod workspace;

#[cfg(test)]
pub mod testing;

// Re-export the public API consumed by main and the route table.
pub use executor::{executor_for, ExecutionStrategy, ExecutorSettings};
pub use pipeline::{BuildFailure, BuildPipeline, BuildStage};
pub use workspace::{AssetBundle, WorkspaceManager};
