//! Knowledge graph mining and analytics.
//!
//! [`GraphBuilder`] turns a history source into a [`KnowledgeGraph`] of
//! commits, files and functions. The analytics modules are pure functions
//! over a built graph:
//!
//! - [`hotspots`]: frequency and churn scores for files, modification
//!   counts for functions
//! - [`coupling`]: files that change in the same commits
//! - [`ownership`]: per-file owners, knowledge silos and bus factor
//! - [`evolution`]: month-by-month activity

use std::path::{Path, PathBuf};

use histograph_core::{HistographConfig, Result, VcsConfig};
use histograph_vcs::GitCli;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod builder;
pub mod coupling;
pub mod evolution;
pub mod hotspots;
pub mod model;
pub mod ownership;
pub mod progress;
pub mod source;

pub use builder::GraphBuilder;
pub use model::{
    AnalysisResult, AnalysisStats, AnalysisStatus, ChangeStats, CommitMetadata, EdgeKind,
    FileMetadata, FunctionMetadata, GraphEdge, GraphNode, GraphStats, KnowledgeGraph,
    NodeKind, NodeMetadata, PartialResult, SkippedItem,
};
pub use progress::{AnalysisProgress, ProgressSink, Stage};
pub use source::{FsSourceReader, SourceReader};

/// Analyze the git repository containing `root` with the git CLI and the
/// working tree on disk.
///
/// `root` may be any directory inside the working tree; queries and file
/// reads run from its top level.
///
/// # Examples
///
/// ```no_run
/// use std::path::{Path, PathBuf};
/// use histograph_core::{HistographConfig, Result, VcsConfig};
/// use histograph_graph::progress::NoopProgress;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() {
/// let config = HistographConfig::default();
/// let result = histograph_graph::analyze_repository(
///     Path::new("."),
///     &config,
///     NoopProgress,
///     &CancellationToken::new(),
/// )
/// .await;
/// assert!(result.success);
/// # }
/// ```
pub async fn analyze_repository(
    root: &Path,
    config: &HistographConfig,
    progress: impl ProgressSink + 'static,
    cancel: &CancellationToken,
) -> AnalysisResult {
    let toplevel = match repository_toplevel(root, &config.vcs).await {
        Ok(toplevel) => toplevel,
        Err(e) => return AnalysisResult::failed(e.to_string()),
    };
    debug!(root = %toplevel.display(), "resolved repository root");

    let git = GitCli::new(&toplevel, &config.vcs);
    GraphBuilder::new(git, FsSourceReader::new(&toplevel), config.mining.clone())
        .with_progress(progress)
        .analyze(cancel)
        .await
}

async fn repository_toplevel(root: &Path, vcs: &VcsConfig) -> Result<PathBuf> {
    let git = GitCli::new(root, vcs);
    git.verify().await?;
    git.toplevel().await
}
