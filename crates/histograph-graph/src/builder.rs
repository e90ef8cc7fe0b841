//! The mining pipeline: history in, knowledge graph out.
//!
//! Stages run in order: commits, files, analysis, graph, complete. Each
//! stage keeps going when a single commit, file or function fails and
//! records the failure as a [`SkippedItem`]. A failure to list the commits
//! or a crashed history task aborts the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use histograph_core::{HistographError, MiningConfig, Result};
use histograph_extract::{ExtractedFunction, FunctionExtractor, HeuristicExtractor};
use histograph_vcs::parse::{parse_commit_log, parse_line_history, parse_numstat};
use histograph_vcs::{Commit, HistorySource, NumstatEntry};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{
    file_id, function_id, AnalysisResult, ChangeStats, FileMetadata, FunctionMetadata,
    GraphEdge, GraphNode, KnowledgeGraph, PartialResult, SkippedItem,
};
use crate::progress::{AnalysisProgress, NoopProgress, ProgressSink, Stage};
use crate::source::SourceReader;

/// Files one expanded commit touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitTouches {
    /// Commit hash.
    pub hash: String,
    /// Touched paths with line counts, each path at most once.
    pub entries: Vec<NumstatEntry>,
}

/// A function found in a file together with its history count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// Path of the defining file.
    pub file_path: String,
    /// Extracted region.
    pub function: ExtractedFunction,
    /// Distinct commits in the line-range history, zero if the query failed.
    pub modify_count: u64,
}

/// Builds a [`KnowledgeGraph`] from a history source.
///
/// # Examples
///
/// ```no_run
/// use histograph_core::HistographConfig;
/// use histograph_graph::{FsSourceReader, GraphBuilder};
/// use histograph_vcs::GitCli;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() {
/// let config = HistographConfig::default();
/// let git = GitCli::new(".", &config.vcs);
/// let builder = GraphBuilder::new(git, FsSourceReader::new("."), config.mining);
/// let result = builder.analyze(&CancellationToken::new()).await;
/// println!("{} files", result.stats.total_files);
/// # }
/// ```
pub struct GraphBuilder<H, E, R> {
    source: Arc<H>,
    extractor: E,
    reader: R,
    config: MiningConfig,
    progress: Arc<dyn ProgressSink>,
}

impl<H, R> GraphBuilder<H, HeuristicExtractor, R>
where
    H: HistorySource,
    R: SourceReader,
{
    /// Builder using the heuristic extractor with the configured lookahead.
    pub fn new(source: H, reader: R, config: MiningConfig) -> Self {
        Self {
            source: Arc::new(source),
            extractor: HeuristicExtractor::new(config.lookahead_lines),
            reader,
            config,
            progress: Arc::new(NoopProgress),
        }
    }
}

impl<H, E, R> GraphBuilder<H, E, R>
where
    H: HistorySource,
    E: FunctionExtractor,
    R: SourceReader,
{
    /// Replace the function extractor.
    pub fn with_extractor<E2: FunctionExtractor>(self, extractor: E2) -> GraphBuilder<H, E2, R> {
        GraphBuilder {
            source: self.source,
            extractor,
            reader: self.reader,
            config: self.config,
            progress: self.progress,
        }
    }

    /// Send progress notifications to `sink`.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Arc::new(sink);
        self
    }

    /// Run every stage and return the graph, or an empty failed or
    /// cancelled result. Never returns an error.
    pub async fn analyze(&self, cancel: &CancellationToken) -> AnalysisResult {
        let started = Instant::now();
        match self.run(cancel).await {
            Ok((graph, skipped)) => {
                let elapsed = started.elapsed().as_millis() as u64;
                let result = AnalysisResult::completed(graph, elapsed, skipped);
                info!(
                    commits = result.stats.total_commits,
                    files = result.stats.total_files,
                    functions = result.stats.total_functions,
                    edges = result.stats.total_relationships,
                    skipped = result.skipped.len(),
                    elapsed_ms = elapsed,
                    "analysis complete"
                );
                result
            }
            Err(HistographError::Cancelled) => {
                info!("analysis cancelled");
                AnalysisResult::cancelled()
            }
            Err(e) => {
                warn!(error = %e, "analysis failed");
                AnalysisResult::failed(e.to_string())
            }
        }
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<(KnowledgeGraph, Vec<SkippedItem>)> {
        let commits = self.collect_commits(cancel).await?;
        let commit_nodes: Vec<GraphNode> = commits
            .iter()
            .cloned()
            .map(|c| GraphNode::commit(c.into()))
            .collect();

        let touches = self.expand_files(&commits, cancel).await?;
        let (file_nodes, modifies) = fold_file_touches(&touches.items);

        let code_files: Vec<String> = file_nodes
            .iter()
            .filter_map(GraphNode::as_file)
            .filter(|f| self.config.is_source_extension(&f.extension))
            .map(|f| f.path.clone())
            .collect();
        let functions = self.analyze_functions(&code_files, cancel).await?;
        let (function_nodes, contains, duplicates) = fold_functions(functions.items);

        let mut skipped = touches.skipped;
        skipped.extend(functions.skipped);
        skipped.extend(duplicates);

        self.emit(Stage::Graph, 0, 1, "Checking graph integrity...");
        let mut graph = KnowledgeGraph {
            nodes: commit_nodes,
            edges: modifies,
        };
        graph.nodes.extend(file_nodes);
        graph.nodes.extend(function_nodes);
        graph.edges.extend(contains);
        skipped.extend(drop_dangling_edges(&mut graph));
        self.emit(Stage::Graph, 1, 1, "Graph assembled");

        if cancel.is_cancelled() {
            return Err(HistographError::Cancelled);
        }
        self.emit(Stage::Complete, 100, 100, "Analysis complete!");
        Ok((graph, skipped))
    }

    /// Stage 1: every reachable commit, newest first.
    async fn collect_commits(&self, cancel: &CancellationToken) -> Result<Vec<Commit>> {
        self.emit(Stage::Commits, 0, 0, "Fetching commit history...");
        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HistographError::Cancelled),
            output = self.source.commit_log() => output?,
        };

        let log = parse_commit_log(&output, self.source.field_delimiter());
        for error in &log.malformed {
            debug!(%error, "dropped log record");
        }

        let total = log.commits.len();
        let every = self.config.progress_every.commits.max(1);
        for i in (0..total).step_by(every) {
            self.emit(Stage::Commits, i, total, format!("Processing commit {i}/{total}"));
        }
        info!(commits = total, "commits collected");
        Ok(log.commits)
    }

    /// Stage 2: touched files of the newest commits.
    async fn expand_files(
        &self,
        commits: &[Commit],
        cancel: &CancellationToken,
    ) -> Result<PartialResult<CommitTouches>> {
        let recent = &commits[..commits.len().min(self.config.file_expansion_limit)];
        let total = recent.len();
        let every = self.config.progress_every.files.max(1);
        let mut result = PartialResult::default();

        for (i, commit) in recent.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(HistographError::Cancelled);
            }

            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HistographError::Cancelled),
                output = self.source.numstat(&commit.hash) => output,
            };
            match output {
                Ok(text) => {
                    let mut seen = HashSet::new();
                    let entries = parse_numstat(&text)
                        .into_iter()
                        .filter(|e| seen.insert(e.path.clone()))
                        .collect();
                    result.items.push(CommitTouches {
                        hash: commit.hash.clone(),
                        entries,
                    });
                }
                Err(e) => {
                    warn!(commit = %commit.hash, error = %e, "skipping commit");
                    result.skipped.push(SkippedItem {
                        stage: Stage::Files,
                        item: commit.hash.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if i % every == 0 {
                self.emit(Stage::Files, i, total, format!("Analyzing commit {i}/{total}"));
            }
        }

        info!(
            expanded = result.items.len(),
            skipped = result.skipped.len(),
            "file touches collected"
        );
        Ok(result)
    }

    /// Stage 3: functions of each source file and their line history.
    async fn analyze_functions(
        &self,
        paths: &[String],
        cancel: &CancellationToken,
    ) -> Result<PartialResult<FunctionRecord>> {
        let total = paths.len();
        let every = self.config.progress_every.analysis.max(1);
        let mut result = PartialResult::default();
        self.emit(Stage::Analysis, 0, total, "Analyzing code structure...");

        for (i, path) in paths.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(HistographError::Cancelled);
            }

            let content = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HistographError::Cancelled),
                content = self.reader.read(path) => content,
            };
            match content {
                Ok(text) => {
                    let functions = self.extractor.extract(&text);
                    let file = self.function_history(path, functions, cancel).await?;
                    result.items.extend(file.items);
                    result.skipped.extend(file.skipped);
                }
                Err(e) => {
                    warn!(file = %path, error = %e, "skipping unreadable file");
                    result.skipped.push(SkippedItem {
                        stage: Stage::Analysis,
                        item: path.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            if i % every == 0 {
                self.emit(Stage::Analysis, i, total, format!("Analyzing {i}/{total} files"));
            }
        }

        info!(
            files = total,
            functions = result.items.len(),
            skipped = result.skipped.len(),
            "functions analyzed"
        );
        Ok(result)
    }

    /// Line-history counts for the functions of one file.
    ///
    /// Queries run concurrently up to the configured limit. Results come
    /// back over a channel and are put back in extraction order.
    async fn function_history(
        &self,
        path: &str,
        functions: Vec<ExtractedFunction>,
        cancel: &CancellationToken,
    ) -> Result<PartialResult<FunctionRecord>> {
        let mut result = PartialResult::default();
        if functions.is_empty() {
            return Ok(result);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_queries.max(1)));
        let (tx, mut rx) = mpsc::channel(functions.len());
        let mut tasks = JoinSet::new();

        for (index, function) in functions.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let tx = tx.clone();
            let path = path.to_string();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    outcome = source.line_history(&path, function.start_line, function.end_line) => outcome,
                };
                // Capacity covers every function, so this never waits.
                let _ = tx.send((index, function, outcome)).await;
            });
        }
        drop(tx);

        let mut collected = Vec::new();
        while let Some(message) = rx.recv().await {
            collected.push(message);
        }
        let mut crashed = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(file = %path, error = %e, "line history task failed");
                crashed.get_or_insert(e);
            }
        }
        if cancel.is_cancelled() {
            return Err(HistographError::Cancelled);
        }
        // A crashed task leaves its function without a record.
        if let Some(e) = crashed {
            return Err(HistographError::PipelineAbort(format!(
                "line history task for {path} failed: {e}"
            )));
        }

        collected.sort_by_key(|(index, _, _)| *index);
        for (_, function, outcome) in collected {
            let modify_count = match outcome {
                Ok(text) => parse_line_history(&text).len() as u64,
                Err(e) => {
                    let id = function_id(path, &function.name);
                    warn!(function = %id, error = %e, "line history unavailable");
                    result.skipped.push(SkippedItem {
                        stage: Stage::Analysis,
                        item: id,
                        reason: e.to_string(),
                    });
                    0
                }
            };
            result.items.push(FunctionRecord {
                file_path: path.to_string(),
                function,
                modify_count,
            });
        }

        Ok(result)
    }

    fn emit(&self, stage: Stage, current: usize, total: usize, message: impl Into<String>) {
        self.progress
            .report(AnalysisProgress::new(stage, current, total, message));
    }
}

/// File nodes in first-seen order and one MODIFIES edge per touch.
///
/// Counters and churn accumulate across commits; metadata comes from the
/// first commit that touched the path.
pub fn fold_file_touches(touches: &[CommitTouches]) -> (Vec<GraphNode>, Vec<GraphEdge>) {
    let mut files: Vec<FileMetadata> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut edges = Vec::new();

    for commit in touches {
        for entry in &commit.entries {
            let position = *positions.entry(entry.path.clone()).or_insert_with(|| {
                files.push(FileMetadata::for_path(&entry.path));
                files.len() - 1
            });
            let file = &mut files[position];
            file.modify_count += 1;
            file.insertions += entry.insertions;
            file.deletions += entry.deletions;

            edges.push(GraphEdge::modifies(
                &commit.hash,
                &entry.path,
                ChangeStats {
                    insertions: entry.insertions,
                    deletions: entry.deletions,
                },
            ));
        }
    }

    (files.into_iter().map(GraphNode::file).collect(), edges)
}

/// Function nodes and CONTAINS edges. A later function with an id already
/// taken is reported instead of added.
pub fn fold_functions(
    records: Vec<FunctionRecord>,
) -> (Vec<GraphNode>, Vec<GraphEdge>, Vec<SkippedItem>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut skipped = Vec::new();

    for record in records {
        let id = function_id(&record.file_path, &record.function.name);
        if let Some(first_line) = seen.get(&id) {
            skipped.push(SkippedItem {
                stage: Stage::Analysis,
                item: id,
                reason: format!(
                    "duplicate function name at line {}, first declaration at line {first_line} kept",
                    record.function.start_line
                ),
            });
            continue;
        }
        seen.insert(id.clone(), record.function.start_line);

        edges.push(GraphEdge::contains(&file_id(&record.file_path), &id));
        nodes.push(GraphNode::function(FunctionMetadata {
            name: record.function.name,
            file_path: record.file_path,
            start_line: record.function.start_line,
            end_line: record.function.end_line,
            parameters: record.function.parameters,
            modify_count: record.modify_count,
            balanced: record.function.balanced,
        }));
    }

    (nodes, edges, skipped)
}

/// Remove edges with a missing endpoint, reporting each one.
fn drop_dangling_edges(graph: &mut KnowledgeGraph) -> Vec<SkippedItem> {
    let ids: HashSet<String> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    let mut skipped = Vec::new();
    graph.edges.retain(|edge| {
        let keep = ids.contains(&edge.source) && ids.contains(&edge.target);
        if !keep {
            skipped.push(SkippedItem {
                stage: Stage::Graph,
                item: edge.id.clone(),
                reason: "edge endpoint is not a node".into(),
            });
        }
        keep
    });
    skipped
}
