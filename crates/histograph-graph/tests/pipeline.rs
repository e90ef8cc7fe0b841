use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use histograph_core::{HistographError, MiningConfig, Result, SourceReadKind};
use histograph_graph::coupling::co_change_patterns;
use histograph_graph::{
    AnalysisProgress, AnalysisStatus, EdgeKind, GraphBuilder, KnowledgeGraph, NodeKind,
    SourceReader, Stage,
};
use histograph_vcs::HistorySource;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeHistory {
    log: String,
    fail_log: bool,
    numstat: HashMap<String, String>,
    line_history: HashMap<(String, usize, usize), String>,
    failing_ranges: HashSet<(String, usize, usize)>,
    hang_line_history: bool,
    crash_at_line: Option<usize>,
}

impl FakeHistory {
    fn commit(mut self, hash: &str, email: &str, date: &str, files: &[(&str, u64, u64)]) -> Self {
        let author = email.split('@').next().unwrap_or(email);
        self.log.push_str(&format!(
            "{hash}|{short}|{author}|{email}|{date}|||change {hash}\n\n",
            short = &hash[..hash.len().min(7)],
        ));
        let numstat: String = files
            .iter()
            .map(|(path, ins, del)| format!("{ins}\t{del}\t{path}\n"))
            .collect();
        self.numstat.insert(hash.to_string(), numstat);
        self
    }

    fn history(mut self, path: &str, start: usize, end: usize, commits: &[&str]) -> Self {
        let output: String = commits.iter().map(|c| format!("COMMIT:{c}\n\ndiff\n")).collect();
        self.line_history.insert((path.to_string(), start, end), output);
        self
    }
}

impl HistorySource for FakeHistory {
    async fn commit_log(&self) -> Result<String> {
        if self.fail_log {
            return Err(HistographError::VcsCommand {
                command: "git log".into(),
                status: Some(128),
                stderr: "fatal: not a git repository".into(),
            });
        }
        Ok(self.log.clone())
    }

    async fn numstat(&self, hash: &str) -> Result<String> {
        self.numstat
            .get(hash)
            .cloned()
            .ok_or_else(|| HistographError::VcsCommand {
                command: format!("git diff-tree {hash}"),
                status: Some(128),
                stderr: "fatal: bad object".into(),
            })
    }

    async fn line_history(&self, path: &str, start: usize, end: usize) -> Result<String> {
        if self.hang_line_history {
            std::future::pending::<()>().await;
        }
        if self.crash_at_line == Some(start) {
            panic!("history backend crashed at {path}:{start}");
        }
        let key = (path.to_string(), start, end);
        if self.failing_ranges.contains(&key) {
            return Err(HistographError::VcsCommand {
                command: format!("git log -L{start},{end}:{path}"),
                status: Some(128),
                stderr: "fatal: file has only 3 lines".into(),
            });
        }
        Ok(self.line_history.get(&key).cloned().unwrap_or_default())
    }

    fn field_delimiter(&self) -> &str {
        "|"
    }
}

#[derive(Default)]
struct MemoryReader {
    files: HashMap<String, String>,
}

impl MemoryReader {
    fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }
}

impl SourceReader for MemoryReader {
    async fn read(&self, path: &str) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| HistographError::SourceRead {
                path: PathBuf::from("/repo").join(path),
                kind: SourceReadKind::NotFound,
            })
    }
}

const DATE: &str = "2024-02-01T10:00:00+00:00";

async fn analyze(history: FakeHistory, reader: MemoryReader) -> histograph_graph::AnalysisResult {
    GraphBuilder::new(history, reader, MiningConfig::default())
        .analyze(&CancellationToken::new())
        .await
}

fn assert_referential_integrity(graph: &KnowledgeGraph) {
    let ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids.len(), graph.nodes.len(), "node ids must be unique");
    for edge in &graph.edges {
        assert!(ids.contains(edge.source.as_str()), "dangling source {}", edge.source);
        assert!(ids.contains(edge.target.as_str()), "dangling target {}", edge.target);
    }
}

fn assert_modify_counts_match_edges(graph: &KnowledgeGraph) {
    for (node, file) in graph.file_nodes() {
        let edges = graph
            .edges_of(EdgeKind::Modifies)
            .filter(|e| e.target == node.id)
            .count() as u64;
        assert_eq!(file.modify_count, edges, "modify count of {}", file.path);
    }
}

fn file_count(graph: &KnowledgeGraph, path: &str) -> u64 {
    graph
        .file_nodes()
        .find(|(_, f)| f.path == path)
        .map(|(_, f)| f.modify_count)
        .unwrap_or_else(|| panic!("no file node for {path}"))
}

#[tokio::test]
async fn three_commit_history() {
    let history = FakeHistory::default()
        .commit("c3", "bob@e.com", DATE, &[("b.js", 3, 0)])
        .commit("c2", "alice@e.com", DATE, &[("a.js", 1, 1), ("b.js", 2, 0)])
        .commit("c1", "alice@e.com", DATE, &[("a.js", 1, 0)]);
    let reader = MemoryReader::default()
        .file("a.js", "const a = 1;\n")
        .file("b.js", "const b = 2;\n");

    let result = analyze(history, reader).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.status, AnalysisStatus::Completed);

    let graph = &result.graph;
    assert_eq!(file_count(graph, "a.js"), 2);
    assert_eq!(file_count(graph, "b.js"), 2);

    let pairs = co_change_patterns(graph, 20);
    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].file_a.as_str(), pairs[0].file_b.as_str()), ("a.js", "b.js"));
    assert_eq!(pairs[0].count, 1);

    assert_eq!(result.stats.total_commits, 3);
    assert_eq!(result.stats.total_files, 2);
    assert_eq!(result.stats.total_functions, 0);
    assert_eq!(result.stats.total_relationships, 4);
    assert!(result.skipped.is_empty());

    let a = graph.node("file:a.js").unwrap().as_file().unwrap();
    assert_eq!(a.language, "JavaScript");
    assert_eq!((a.insertions, a.deletions), (2, 1));

    assert_referential_integrity(graph);
    assert_modify_counts_match_edges(graph);
}

#[tokio::test]
async fn only_recent_commits_are_expanded() {
    let mut history = FakeHistory::default();
    for i in 0..500 {
        let hash = format!("{i:040x}");
        let path = format!("docs/page{i}.md");
        history = history.commit(&hash, "alice@e.com", DATE, &[(&path, 1, 0)]);
    }

    let result = analyze(history, MemoryReader::default()).await;
    assert!(result.success);
    assert_eq!(result.stats.total_commits, 500);
    assert_eq!(result.stats.total_files, 200);
    assert_eq!(result.stats.total_relationships, 200);

    let graph = &result.graph;
    assert!(graph.node("file:docs/page199.md").is_some());
    assert!(graph.node("file:docs/page200.md").is_none());
    assert_referential_integrity(graph);
}

#[tokio::test]
async fn function_modify_count_comes_from_line_history() {
    let mut source = String::new();
    for _ in 0..9 {
        source.push_str("// header\n");
    }
    source.push_str("export function helper(a: string, b?: number) {\n");
    for _ in 0..9 {
        source.push_str("  work();\n");
    }
    source.push_str("}\n");

    let history = FakeHistory::default()
        .commit("c1", "alice@e.com", DATE, &[("util.ts", 20, 0)])
        .history("util.ts", 10, 20, &["aaa", "bbb", "ccc", "aaa"]);
    let reader = MemoryReader::default().file("util.ts", &source);

    let result = analyze(history, reader).await;
    assert!(result.success);

    let graph = &result.graph;
    let (node, helper) = graph.function_nodes().next().unwrap();
    assert_eq!(node.id, "function:util.ts:helper");
    assert_eq!(helper.name, "helper");
    assert_eq!((helper.start_line, helper.end_line), (10, 20));
    assert_eq!(helper.parameters, vec!["a", "b?"]);
    assert_eq!(helper.modify_count, 3);

    let contains: Vec<_> = graph.edges_of(EdgeKind::Contains).collect();
    assert_eq!(contains.len(), 1);
    assert_eq!(contains[0].source, "file:util.ts");
    assert_eq!(contains[0].target, "function:util.ts:helper");
    assert_eq!(contains[0].id, "edge:file:util.ts-function:util.ts:helper");
    assert_eq!(graph.edges_of(EdgeKind::Calls).count(), 0);
    assert_referential_integrity(graph);
}

#[tokio::test]
async fn failing_commit_is_skipped() {
    let mut history = FakeHistory::default()
        .commit("c2", "alice@e.com", DATE, &[("a.txt", 1, 0)])
        .commit("c1", "alice@e.com", DATE, &[("b.txt", 1, 0)]);
    history.numstat.remove("c1");

    let result = analyze(history, MemoryReader::default()).await;
    assert!(result.success);
    assert_eq!(result.stats.total_commits, 2);
    assert_eq!(result.stats.total_files, 1);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].stage, Stage::Files);
    assert_eq!(result.skipped[0].item, "c1");
}

#[tokio::test]
async fn unreadable_file_is_skipped() {
    let history = FakeHistory::default().commit(
        "c1",
        "alice@e.com",
        DATE,
        &[("gone.ts", 0, 10), ("kept.ts", 3, 0)],
    );
    let reader = MemoryReader::default().file("kept.ts", "function kept() {\n}\n");

    let result = analyze(history, reader).await;
    assert!(result.success);
    assert_eq!(result.stats.total_files, 2);
    assert_eq!(result.stats.total_functions, 1);

    let skipped: Vec<_> = result
        .skipped
        .iter()
        .filter(|s| s.stage == Stage::Analysis)
        .collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].item, "gone.ts");
    assert!(skipped[0].reason.contains("not found"));
}

#[tokio::test]
async fn failed_history_query_keeps_function_with_zero_count() {
    let mut history = FakeHistory::default()
        .commit("c1", "alice@e.com", DATE, &[("a.ts", 3, 0)])
        .history("a.ts", 1, 2, &["c1"]);
    history.failing_ranges.insert(("a.ts".into(), 3, 4));
    let reader = MemoryReader::default().file("a.ts", "function ok() {\n}\nfunction bad() {\n}\n");

    let result = analyze(history, reader).await;
    assert!(result.success);

    let counts: Vec<(String, u64)> = result
        .graph
        .function_nodes()
        .map(|(_, f)| (f.name.clone(), f.modify_count))
        .collect();
    assert_eq!(counts, vec![("ok".to_string(), 1), ("bad".to_string(), 0)]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].item, "function:a.ts:bad");
}

#[tokio::test]
async fn duplicate_function_names_keep_first() {
    let history = FakeHistory::default().commit("c1", "alice@e.com", DATE, &[("dup.js", 6, 0)]);
    let reader = MemoryReader::default().file(
        "dup.js",
        "function render() {\n}\nfunction other() {\n}\nfunction render() {\n}\n",
    );

    let result = analyze(history, reader).await;
    assert!(result.success);
    assert_eq!(result.stats.total_functions, 2);
    let render = result.graph.node("function:dup.js:render").unwrap();
    assert_eq!(render.as_function().unwrap().start_line, 1);
    assert!(result
        .skipped
        .iter()
        .any(|s| s.item == "function:dup.js:render"));
    assert_referential_integrity(&result.graph);
}

#[tokio::test]
async fn many_functions_keep_extraction_order() {
    let mut source = String::new();
    for i in 0..30 {
        source.push_str(&format!("function f{i}() {{\n  return {i};\n}}\n"));
    }
    let mut history = FakeHistory::default().commit("c1", "alice@e.com", DATE, &[("many.js", 90, 0)]);
    for i in 0..30 {
        let start = i * 3 + 1;
        history = history.history("many.js", start, start + 2, &["c1"]);
    }
    let reader = MemoryReader::default().file("many.js", &source);

    let config = MiningConfig {
        max_concurrent_queries: 4,
        ..MiningConfig::default()
    };
    let result = GraphBuilder::new(history, reader, config)
        .analyze(&CancellationToken::new())
        .await;

    let names: Vec<String> = result.graph.function_nodes().map(|(_, f)| f.name.clone()).collect();
    let expected: Vec<String> = (0..30).map(|i| format!("f{i}")).collect();
    assert_eq!(names, expected);
    assert!(result.graph.function_nodes().all(|(_, f)| f.modify_count == 1));
}

#[tokio::test]
async fn crashed_history_task_aborts_the_run() {
    let mut history = FakeHistory::default()
        .commit("c1", "alice@e.com", DATE, &[("crash.ts", 5, 0)])
        .history("crash.ts", 1, 2, &["c1"]);
    history.crash_at_line = Some(4);
    let reader = MemoryReader::default().file(
        "crash.ts",
        "function one() {\n}\n\nfunction two() {\n}\n",
    );

    let result = analyze(history, reader).await;
    assert!(!result.success);
    assert_eq!(result.status, AnalysisStatus::Failed);
    assert!(result.graph.is_empty());
    let error = result.error.unwrap();
    assert!(error.starts_with("analysis aborted:"), "{error}");
    assert!(error.contains("crash.ts"), "{error}");
}

#[tokio::test]
async fn commit_log_failure_aborts_with_empty_result() {
    let history = FakeHistory {
        fail_log: true,
        ..FakeHistory::default()
    };

    let result = analyze(history, MemoryReader::default()).await;
    assert!(!result.success);
    assert_eq!(result.status, AnalysisStatus::Failed);
    assert!(result.graph.is_empty());
    assert_eq!(result.stats.total_commits, 0);
    assert_eq!(result.stats.total_relationships, 0);
    assert!(result.error.unwrap().contains("not a git repository"));
}

#[tokio::test]
async fn malformed_log_lines_are_dropped() {
    let mut history = FakeHistory::default().commit("c1", "alice@e.com", DATE, &[("a.txt", 1, 0)]);
    history.log.push_str("broken|record\n");

    let result = analyze(history, MemoryReader::default()).await;
    assert!(result.success);
    assert_eq!(result.stats.total_commits, 1);
}

#[tokio::test]
async fn cancelled_before_start() {
    let history = FakeHistory::default().commit("c1", "alice@e.com", DATE, &[("a.txt", 1, 0)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = GraphBuilder::new(history, MemoryReader::default(), MiningConfig::default())
        .analyze(&cancel)
        .await;
    assert_eq!(result.status, AnalysisStatus::Cancelled);
    assert!(!result.success);
    assert!(result.graph.is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_pending_history_queries() {
    let mut history = FakeHistory::default().commit("c1", "alice@e.com", DATE, &[("slow.ts", 3, 0)]);
    history.hang_line_history = true;
    let reader = MemoryReader::default().file("slow.ts", "function wait() {\n}\n");

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        GraphBuilder::new(history, reader, MiningConfig::default()).analyze(&cancel),
    )
    .await
    .expect("cancellation must not hang");
    assert_eq!(result.status, AnalysisStatus::Cancelled);
}

#[tokio::test]
async fn progress_follows_stage_order() {
    let history = FakeHistory::default()
        .commit("c1", "alice@e.com", DATE, &[("a.ts", 3, 0)])
        .history("a.ts", 1, 2, &["c1"]);
    let reader = MemoryReader::default().file("a.ts", "function a() {\n}\n");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let result = GraphBuilder::new(history, reader, MiningConfig::default())
        .with_progress(move |p: AnalysisProgress| sink.lock().unwrap().push(p.stage))
        .analyze(&CancellationToken::new())
        .await;
    assert!(result.success);

    let mut stages = seen.lock().unwrap().clone();
    stages.dedup();
    assert_eq!(
        stages,
        vec![Stage::Commits, Stage::Files, Stage::Analysis, Stage::Graph, Stage::Complete]
    );
}

#[tokio::test]
async fn nodes_are_grouped_by_kind() {
    let history = FakeHistory::default()
        .commit("c1", "alice@e.com", DATE, &[("a.ts", 3, 0)]);
    let reader = MemoryReader::default().file("a.ts", "function a() {\n}\n");

    let result = analyze(history, reader).await;
    let kinds: Vec<NodeKind> = result.graph.nodes.iter().map(|n| n.kind()).collect();
    assert_eq!(kinds, vec![NodeKind::Commit, NodeKind::File, NodeKind::Function]);
}
