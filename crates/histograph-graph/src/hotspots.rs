//! Change-frequency and churn hotspots.
//!
//! A file's score blends how often it changed with how many lines moved,
//! each normalized against the busiest file in the graph:
//!
//! ```text
//! score = round((0.5 * modify_count / max_modify_count
//!              + 0.5 * churn / max_churn) * 100)
//! ```
//!
//! Both maxima are floored at 1, so an all-zero graph scores 0 everywhere.

use serde::{Deserialize, Serialize};

use crate::model::{FileMetadata, KnowledgeGraph};

/// A file ranked by hotspot score.
///
/// # Examples
///
/// ```
/// use histograph_graph::hotspots::FileHotspot;
///
/// let h = FileHotspot {
///     id: "file:src/auth.ts".into(),
///     path: "src/auth.ts".into(),
///     modify_count: 12,
///     churn: 340,
///     score: 88,
/// };
/// assert!(h.score <= 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHotspot {
    /// File node id.
    pub id: String,
    /// Path relative to the repository root.
    pub path: String,
    /// Expanded commits touching the file.
    pub modify_count: u64,
    /// Inserted plus deleted lines.
    pub churn: u64,
    /// Score in `0..=100`.
    pub score: u32,
}

/// A function ranked by line-history modification count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionHotspot {
    /// Function node id.
    pub id: String,
    /// Function name.
    pub name: String,
    /// Path of the defining file.
    pub file_path: String,
    /// First line.
    pub start_line: usize,
    /// Last line.
    pub end_line: usize,
    /// Distinct commits in the line-range history.
    pub modify_count: u64,
}

/// Combine normalized frequency and churn into a `0..=100` score.
///
/// # Examples
///
/// ```
/// use histograph_graph::hotspots::hotspot_score;
///
/// assert_eq!(hotspot_score(10, 500, 10, 500), 100);
/// assert_eq!(hotspot_score(5, 0, 10, 500), 25);
/// assert_eq!(hotspot_score(0, 0, 0, 0), 0);
/// ```
pub fn hotspot_score(modify_count: u64, churn: u64, max_modify_count: u64, max_churn: u64) -> u32 {
    let frequency = modify_count as f64 / max_modify_count.max(1) as f64;
    let churn = churn as f64 / max_churn.max(1) as f64;
    let score = ((frequency * 0.5 + churn * 0.5) * 100.0).round();
    score.clamp(0.0, 100.0) as u32
}

/// Score of every file node, in node order.
pub fn file_hotspots(graph: &KnowledgeGraph) -> Vec<FileHotspot> {
    let files: Vec<(&str, &FileMetadata)> = graph
        .file_nodes()
        .map(|(node, meta)| (node.id.as_str(), meta))
        .collect();
    let max_modify = files.iter().map(|(_, f)| f.modify_count).max().unwrap_or(0);
    let max_churn = files.iter().map(|(_, f)| f.churn()).max().unwrap_or(0);

    files
        .into_iter()
        .map(|(id, f)| FileHotspot {
            id: id.to_string(),
            path: f.path.clone(),
            modify_count: f.modify_count,
            churn: f.churn(),
            score: hotspot_score(f.modify_count, f.churn(), max_modify, max_churn),
        })
        .collect()
}

/// Top `limit` files by hotspot score. Ties keep node order.
pub fn most_modified_files(graph: &KnowledgeGraph, limit: usize) -> Vec<FileHotspot> {
    let mut hotspots = file_hotspots(graph);
    hotspots.sort_by(|a, b| b.score.cmp(&a.score));
    hotspots.truncate(limit);
    hotspots
}

/// Top `limit` functions by modification count. Ties keep node order.
pub fn hotspot_functions(graph: &KnowledgeGraph, limit: usize) -> Vec<FunctionHotspot> {
    let mut functions: Vec<FunctionHotspot> = graph
        .function_nodes()
        .map(|(node, f)| FunctionHotspot {
            id: node.id.clone(),
            name: f.name.clone(),
            file_path: f.file_path.clone(),
            start_line: f.start_line,
            end_line: f.end_line,
            modify_count: f.modify_count,
        })
        .collect();
    functions.sort_by(|a, b| b.modify_count.cmp(&a.modify_count));
    functions.truncate(limit);
    functions
}

/// Score of the file matching `key` by path, label or node id; 0 if none.
///
/// # Examples
///
/// ```
/// use histograph_graph::{FileMetadata, GraphNode, KnowledgeGraph};
/// use histograph_graph::hotspots::file_hotspot_score;
///
/// let mut meta = FileMetadata::for_path("src/a.ts");
/// meta.modify_count = 3;
/// let graph = KnowledgeGraph { nodes: vec![GraphNode::file(meta)], edges: vec![] };
/// assert_eq!(file_hotspot_score(&graph, "src/a.ts"), 50);
/// assert_eq!(file_hotspot_score(&graph, "file:src/a.ts"), 50);
/// assert_eq!(file_hotspot_score(&graph, "missing.ts"), 0);
/// ```
pub fn file_hotspot_score(graph: &KnowledgeGraph, key: &str) -> u32 {
    let matches = |id: &str, label: &str, path: &str| id == key || label == key || path == key;
    let Some((_, file)) = graph
        .file_nodes()
        .find(|(node, f)| matches(&node.id, &node.label, &f.path))
    else {
        return 0;
    };

    let max_modify = graph.file_nodes().map(|(_, f)| f.modify_count).max().unwrap_or(0);
    let max_churn = graph.file_nodes().map(|(_, f)| f.churn()).max().unwrap_or(0);
    hotspot_score(file.modify_count, file.churn(), max_modify, max_churn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionMetadata, GraphNode};

    fn file(path: &str, modify_count: u64, insertions: u64, deletions: u64) -> GraphNode {
        let mut meta = FileMetadata::for_path(path);
        meta.modify_count = modify_count;
        meta.insertions = insertions;
        meta.deletions = deletions;
        GraphNode::file(meta)
    }

    fn function(name: &str, modify_count: u64) -> GraphNode {
        GraphNode::function(FunctionMetadata {
            name: name.into(),
            file_path: "a.ts".into(),
            start_line: 1,
            end_line: 2,
            parameters: vec![],
            modify_count,
            balanced: true,
        })
    }

    fn graph(nodes: Vec<GraphNode>) -> KnowledgeGraph {
        KnowledgeGraph {
            nodes,
            edges: vec![],
        }
    }

    #[test]
    fn busiest_file_scores_100() {
        let g = graph(vec![file("a.ts", 4, 80, 20), file("b.ts", 2, 10, 0), file("c.ts", 1, 0, 0)]);
        let scores: Vec<u32> = file_hotspots(&g).iter().map(|h| h.score).collect();
        // b: 0.5*0.5 + 0.5*0.1 = 0.30; c: 0.5*0.25 = 0.125
        assert_eq!(scores, vec![100, 30, 13]);
    }

    #[test]
    fn score_is_invariant_under_rescaling() {
        let small = graph(vec![file("a.ts", 3, 7, 2), file("b.ts", 7, 1, 1), file("c.ts", 5, 4, 0)]);
        let large = graph(vec![
            file("a.ts", 3 * 13, 7 * 13, 2 * 13),
            file("b.ts", 7 * 13, 13, 13),
            file("c.ts", 5 * 13, 4 * 13, 0),
        ]);
        let a: Vec<u32> = file_hotspots(&small).iter().map(|h| h.score).collect();
        let b: Vec<u32> = file_hotspots(&large).iter().map(|h| h.score).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|s| *s <= 100));
    }

    #[test]
    fn zero_graph_scores_zero() {
        let g = graph(vec![file("a.ts", 0, 0, 0), file("b.ts", 0, 0, 0)]);
        assert!(file_hotspots(&g).iter().all(|h| h.score == 0));
    }

    #[test]
    fn ranking_is_stable_for_ties() {
        let g = graph(vec![file("x.ts", 1, 0, 0), file("y.ts", 2, 0, 0), file("z.ts", 1, 0, 0)]);
        let ranked: Vec<String> = most_modified_files(&g, 10).into_iter().map(|h| h.path).collect();
        assert_eq!(ranked, vec!["y.ts", "x.ts", "z.ts"]);
        assert_eq!(most_modified_files(&g, 1).len(), 1);
    }

    #[test]
    fn functions_ranked_by_modify_count() {
        let g = graph(vec![function("a", 1), function("b", 5), function("c", 1), function("d", 3)]);
        let names: Vec<String> = hotspot_functions(&g, 3).into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["b", "d", "a"]);
    }

    #[test]
    fn file_lookup_by_label() {
        let g = graph(vec![file("src/a.ts", 2, 0, 0), file("src/b.ts", 1, 0, 0)]);
        assert_eq!(file_hotspot_score(&g, "b.ts"), 25);
    }
}
