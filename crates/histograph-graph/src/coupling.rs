//! Co-change detection.
//!
//! Files touched by the same commit are counted as a pair. Frequent pairs
//! point at hidden coupling between files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{EdgeKind, KnowledgeGraph};

/// Two files changed together.
///
/// # Examples
///
/// ```
/// use histograph_graph::coupling::CoChange;
///
/// let pair = CoChange {
///     file_a: "src/auth.ts".into(),
///     file_b: "src/session.ts".into(),
///     count: 6,
///     coupling_degree: 0.75,
/// };
/// assert!(pair.file_a < pair.file_b);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoChange {
    /// Lexicographically smaller path.
    pub file_a: String,
    /// Lexicographically larger path.
    pub file_b: String,
    /// Commits touching both files.
    pub count: u32,
    /// `count / max(changes_a, changes_b)`.
    pub coupling_degree: f64,
}

/// Order a pair so `(a, b)` and `(b, a)` share one key.
///
/// # Examples
///
/// ```
/// use histograph_graph::coupling::normalize_pair;
///
/// assert_eq!(normalize_pair("b.ts", "a.ts"), normalize_pair("a.ts", "b.ts"));
/// ```
pub fn normalize_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Top `limit` co-changing file pairs from MODIFIES edges.
///
/// Pairs are ranked by count, descending; equal counts keep the order in
/// which the pair was first seen.
pub fn co_change_patterns(graph: &KnowledgeGraph, limit: usize) -> Vec<CoChange> {
    // Touched files per commit, in edge order.
    let mut commit_order: Vec<&str> = Vec::new();
    let mut commit_files: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in graph.edges_of(EdgeKind::Modifies) {
        let files = commit_files.entry(edge.source.as_str()).or_insert_with(|| {
            commit_order.push(edge.source.as_str());
            Vec::new()
        });
        let path = file_path_of(&edge.target);
        if !files.contains(&path) {
            files.push(path);
        }
    }

    let mut changes: HashMap<&str, u32> = HashMap::new();
    let mut pair_order: Vec<(String, String)> = Vec::new();
    let mut pair_counts: HashMap<(String, String), u32> = HashMap::new();

    for commit in &commit_order {
        let files = &commit_files[commit];
        for file in files {
            *changes.entry(*file).or_default() += 1;
        }
        for i in 0..files.len() {
            for j in (i + 1)..files.len() {
                let key = normalize_pair(files[i], files[j]);
                let count = pair_counts.entry(key.clone()).or_insert_with(|| {
                    pair_order.push(key);
                    0
                });
                *count += 1;
            }
        }
    }

    let mut pairs: Vec<CoChange> = pair_order
        .into_iter()
        .map(|(file_a, file_b)| {
            let count = pair_counts[&(file_a.clone(), file_b.clone())];
            let changes_a = changes.get(file_a.as_str()).copied().unwrap_or(0);
            let changes_b = changes.get(file_b.as_str()).copied().unwrap_or(0);
            let max_changes = changes_a.max(changes_b).max(1);
            CoChange {
                coupling_degree: count as f64 / max_changes as f64,
                file_a,
                file_b,
                count,
            }
        })
        .collect();

    pairs.sort_by(|a, b| b.count.cmp(&a.count));
    pairs.truncate(limit);
    pairs
}

/// Files that changed together with `path`, strongest first.
pub fn co_changes_of(graph: &KnowledgeGraph, path: &str) -> Vec<CoChange> {
    co_change_patterns(graph, usize::MAX)
        .into_iter()
        .filter(|p| p.file_a == path || p.file_b == path)
        .collect()
}

fn file_path_of(id: &str) -> &str {
    id.strip_prefix("file:").unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeStats, GraphEdge};

    fn graph(touches: &[(&str, &[&str])]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::default();
        for (hash, files) in touches {
            for file in *files {
                g.edges.push(GraphEdge::modifies(hash, file, ChangeStats::default()));
            }
        }
        g
    }

    #[test]
    fn three_commit_scenario() {
        let g = graph(&[("c3", &["b.js"]), ("c2", &["a.js", "b.js"]), ("c1", &["a.js"])]);
        let pairs = co_change_patterns(&g, 20);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].file_a, "a.js");
        assert_eq!(pairs[0].file_b, "b.js");
        assert_eq!(pairs[0].count, 1);
        assert!((pairs[0].coupling_degree - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn pair_order_within_commit_does_not_matter() {
        let g = graph(&[("c1", &["z.ts", "a.ts"]), ("c2", &["a.ts", "z.ts"])]);
        let pairs = co_change_patterns(&g, 20);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].count, 2);
        assert_eq!((pairs[0].file_a.as_str(), pairs[0].file_b.as_str()), ("a.ts", "z.ts"));
    }

    #[test]
    fn ranked_by_count_and_limited() {
        let g = graph(&[
            ("c1", &["a", "b", "c"]),
            ("c2", &["b", "c"]),
            ("c3", &["b", "c"]),
            ("c4", &["a", "b"]),
        ]);
        let pairs = co_change_patterns(&g, 2);
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].file_a.as_str(), pairs[0].file_b.as_str(), pairs[0].count), ("b", "c", 3));
        assert_eq!((pairs[1].file_a.as_str(), pairs[1].file_b.as_str(), pairs[1].count), ("a", "b", 2));
    }

    #[test]
    fn single_file_commits_produce_no_pairs() {
        let g = graph(&[("c1", &["a"]), ("c2", &["b"])]);
        assert!(co_change_patterns(&g, 20).is_empty());
    }

    #[test]
    fn duplicate_edges_count_once_per_commit() {
        let g = graph(&[("c1", &["a", "b", "a"])]);
        let pairs = co_change_patterns(&g, 20);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].count, 1);
    }

    #[test]
    fn partners_of_one_file() {
        let g = graph(&[("c1", &["a", "b"]), ("c2", &["c", "d"])]);
        let partners = co_changes_of(&g, "d");
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].file_a, "c");
    }
}
