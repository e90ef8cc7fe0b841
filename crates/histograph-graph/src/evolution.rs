//! Month-by-month repository evolution.
//!
//! The window covers the last `months` calendar months ending with the
//! month of the newest commit in the graph. Commits are bucketed by the
//! calendar month of their author date in the author's own offset.
//! Line counts come from each commit's shortstat summary; touched files and
//! per-extension figures come from MODIFIES edges, so they only cover the
//! expanded commits.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::{CommitMetadata, EdgeKind, KnowledgeGraph};

/// Activity in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionPoint {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Commits authored in the month.
    pub commits: u32,
    /// Distinct files touched by expanded commits of the month.
    pub files: u32,
    /// Lines inserted.
    pub lines_added: u64,
    /// Lines deleted.
    pub lines_deleted: u64,
    /// Distinct author emails.
    pub contributors: u32,
}

/// One author's activity inside the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorEvolution {
    /// Author name as first seen.
    pub author: String,
    /// Author email.
    pub author_email: String,
    /// Oldest commit in the window.
    pub first_commit: DateTime<FixedOffset>,
    /// Newest commit in the window.
    pub last_commit: DateTime<FixedOffset>,
    /// Commits in the window.
    pub total_commits: u32,
    /// Lines inserted.
    pub lines_added: u64,
    /// Lines deleted.
    pub lines_deleted: u64,
}

/// Activity per file extension inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTypeEvolution {
    /// Extension without the dot, empty for none.
    pub extension: String,
    /// Distinct files touched.
    pub count: u32,
    /// Lines inserted.
    pub lines_added: u64,
    /// Lines deleted.
    pub lines_deleted: u64,
}

/// Churn in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurnPoint {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Lines inserted.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// `additions - deletions`.
    pub net_change: i64,
}

/// Timeline, authors, file types and churn over the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionData {
    /// One point per month, oldest first.
    pub timeline: Vec<EvolutionPoint>,
    /// Authors, most commits first.
    pub authors: Vec<AuthorEvolution>,
    /// Extensions, most files first.
    pub file_types: Vec<FileTypeEvolution>,
    /// One point per month, oldest first.
    pub code_churn: Vec<ChurnPoint>,
}

/// Months since year zero, so consecutive months differ by one.
fn month_index(date: &DateTime<FixedOffset>) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

fn month_label(index: i64) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

#[derive(Default)]
struct Bucket<'a> {
    commits: u32,
    files: HashSet<&'a str>,
    lines_added: u64,
    lines_deleted: u64,
    contributors: HashSet<&'a str>,
}

/// Evolution over the last `months` months of the graph's history.
///
/// The window never starts before the month of the oldest commit, so a
/// request longer than the history yields one bucket per month of history.
/// Returns empty data for a graph without commits or `months == 0`.
///
/// # Examples
///
/// ```
/// use histograph_graph::KnowledgeGraph;
/// use histograph_graph::evolution::evolution;
///
/// let data = evolution(&KnowledgeGraph::default(), 12);
/// assert!(data.timeline.is_empty());
/// ```
pub fn evolution(graph: &KnowledgeGraph, months: u32) -> EvolutionData {
    let commits: Vec<(&str, &CommitMetadata)> = graph
        .commit_nodes()
        .map(|(node, meta)| (node.id.as_str(), meta))
        .collect();
    let Some(newest) = commits.iter().map(|(_, c)| month_index(&c.date)).max() else {
        return EvolutionData::default();
    };
    if months == 0 {
        return EvolutionData::default();
    }
    let earliest = commits
        .iter()
        .map(|(_, c)| month_index(&c.date))
        .min()
        .unwrap_or(newest);
    // No buckets before the first commit.
    let span = newest - earliest + 1;
    let months = i64::from(months).min(span);
    let oldest = newest - months + 1;

    let in_window: HashMap<&str, (usize, &CommitMetadata)> = commits
        .iter()
        .filter_map(|(id, c)| {
            let index = month_index(&c.date);
            (index >= oldest).then(|| (*id, ((index - oldest) as usize, *c)))
        })
        .collect();

    let mut buckets: Vec<Bucket<'_>> = (0..months).map(|_| Bucket::default()).collect();
    let mut author_order: Vec<&str> = Vec::new();
    let mut authors: HashMap<&str, AuthorEvolution> = HashMap::new();

    for (id, commit) in &commits {
        let Some(&(slot, _)) = in_window.get(id) else {
            continue;
        };
        let bucket = &mut buckets[slot];
        bucket.commits += 1;
        bucket.lines_added += commit.insertions;
        bucket.lines_deleted += commit.deletions;
        bucket.contributors.insert(commit.email.as_str());

        let entry = authors.entry(commit.email.as_str()).or_insert_with(|| {
            author_order.push(commit.email.as_str());
            AuthorEvolution {
                author: commit.author.clone(),
                author_email: commit.email.clone(),
                first_commit: commit.date,
                last_commit: commit.date,
                total_commits: 0,
                lines_added: 0,
                lines_deleted: 0,
            }
        });
        entry.total_commits += 1;
        entry.lines_added += commit.insertions;
        entry.lines_deleted += commit.deletions;
        entry.first_commit = entry.first_commit.min(commit.date);
        entry.last_commit = entry.last_commit.max(commit.date);
    }

    let extensions: HashMap<&str, &str> = graph
        .file_nodes()
        .map(|(node, meta)| (node.id.as_str(), meta.extension.as_str()))
        .collect();
    let mut type_order: Vec<&str> = Vec::new();
    let mut types: HashMap<&str, (HashSet<&str>, u64, u64)> = HashMap::new();

    for edge in graph.edges_of(EdgeKind::Modifies) {
        let Some(&(slot, _)) = in_window.get(edge.source.as_str()) else {
            continue;
        };
        buckets[slot].files.insert(edge.target.as_str());

        let extension = extensions.get(edge.target.as_str()).copied().unwrap_or("");
        let stats = edge.stats.unwrap_or_default();
        let entry = types.entry(extension).or_insert_with(|| {
            type_order.push(extension);
            (HashSet::new(), 0, 0)
        });
        entry.0.insert(edge.target.as_str());
        entry.1 += stats.insertions;
        entry.2 += stats.deletions;
    }

    let timeline = buckets
        .iter()
        .enumerate()
        .map(|(i, b)| EvolutionPoint {
            month: month_label(oldest + i as i64),
            commits: b.commits,
            files: b.files.len() as u32,
            lines_added: b.lines_added,
            lines_deleted: b.lines_deleted,
            contributors: b.contributors.len() as u32,
        })
        .collect();

    let code_churn = buckets
        .iter()
        .enumerate()
        .map(|(i, b)| ChurnPoint {
            month: month_label(oldest + i as i64),
            additions: b.lines_added,
            deletions: b.lines_deleted,
            net_change: b.lines_added as i64 - b.lines_deleted as i64,
        })
        .collect();

    let mut author_list: Vec<AuthorEvolution> = author_order
        .into_iter()
        .filter_map(|email| authors.remove(email))
        .collect();
    author_list.sort_by(|a, b| b.total_commits.cmp(&a.total_commits));

    let mut file_types: Vec<FileTypeEvolution> = type_order
        .into_iter()
        .filter_map(|ext| {
            types.remove(ext).map(|(files, added, deleted)| FileTypeEvolution {
                extension: ext.to_string(),
                count: files.len() as u32,
                lines_added: added,
                lines_deleted: deleted,
            })
        })
        .collect();
    file_types.sort_by(|a, b| b.count.cmp(&a.count));

    EvolutionData {
        timeline,
        authors: author_list,
        file_types,
        code_churn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeStats, FileMetadata, GraphEdge, GraphNode};

    fn commit(hash: &str, email: &str, date: &str, insertions: u64, deletions: u64) -> GraphNode {
        GraphNode::commit(CommitMetadata {
            hash: hash.into(),
            short_hash: hash.into(),
            author: email.into(),
            email: email.into(),
            date: DateTime::parse_from_rfc3339(date).unwrap(),
            message: "m".into(),
            parents: vec![],
            refs: vec![],
            files_changed: 1,
            insertions,
            deletions,
        })
    }

    fn sample() -> KnowledgeGraph {
        let mut g = KnowledgeGraph::default();
        g.nodes.push(commit("c4", "bob@e.com", "2024-03-20T09:00:00+00:00", 10, 4));
        g.nodes.push(commit("c3", "alice@e.com", "2024-03-02T09:00:00+00:00", 5, 0));
        g.nodes.push(commit("c2", "alice@e.com", "2024-01-15T09:00:00+00:00", 1, 1));
        g.nodes.push(commit("c1", "alice@e.com", "2023-06-01T09:00:00+00:00", 100, 0));
        g.nodes.push(GraphNode::file(FileMetadata::for_path("a.ts")));
        g.nodes.push(GraphNode::file(FileMetadata::for_path("b.md")));
        let stats = ChangeStats {
            insertions: 2,
            deletions: 1,
        };
        g.edges.push(GraphEdge::modifies("c4", "a.ts", stats));
        g.edges.push(GraphEdge::modifies("c4", "b.md", stats));
        g.edges.push(GraphEdge::modifies("c3", "a.ts", stats));
        g.edges.push(GraphEdge::modifies("c1", "a.ts", stats));
        g
    }

    #[test]
    fn timeline_covers_window_ending_at_newest_commit() {
        let data = evolution(&sample(), 3);
        let months: Vec<&str> = data.timeline.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);

        let march = &data.timeline[2];
        assert_eq!(march.commits, 2);
        assert_eq!(march.files, 2);
        assert_eq!(march.contributors, 2);
        assert_eq!((march.lines_added, march.lines_deleted), (15, 4));
        assert_eq!(data.timeline[1].commits, 0);
    }

    #[test]
    fn churn_matches_timeline() {
        let data = evolution(&sample(), 3);
        assert_eq!(data.code_churn.len(), 3);
        assert_eq!(data.code_churn[2].net_change, 11);
        assert_eq!(data.code_churn[0].net_change, 0);
    }

    #[test]
    fn authors_and_file_types_exclude_old_commits() {
        let data = evolution(&sample(), 3);
        assert_eq!(data.authors.len(), 2);
        let alice = data.authors.iter().find(|a| a.author_email == "alice@e.com").unwrap();
        assert_eq!(alice.total_commits, 2);
        assert_eq!(alice.lines_added, 6);
        assert_eq!(alice.first_commit.to_rfc3339(), "2024-01-15T09:00:00+00:00");

        assert_eq!(data.file_types[0].extension, "ts");
        assert_eq!(data.file_types[0].count, 1);
        assert_eq!(data.file_types[0].lines_added, 4);
        assert_eq!(data.file_types.len(), 2);
    }

    #[test]
    fn window_crosses_year_boundary() {
        let data = evolution(&sample(), 10);
        assert_eq!(data.timeline.len(), 10);
        assert_eq!(data.timeline.first().unwrap().month, "2023-06");
        assert_eq!(data.timeline[0].commits, 1);
        assert_eq!(data.timeline.last().unwrap().month, "2024-03");
    }

    #[test]
    fn window_is_limited_to_history_span() {
        let data = evolution(&sample(), 12);
        assert_eq!(data.timeline.len(), 10);
        assert_eq!(data.timeline.first().unwrap().month, "2023-06");

        let data = evolution(&sample(), u32::MAX);
        assert_eq!(data.timeline.len(), 10);
        assert_eq!(data.code_churn.len(), 10);
        assert_eq!(data.authors.len(), 2);
    }

    #[test]
    fn zero_months_is_empty() {
        assert_eq!(evolution(&sample(), 0), EvolutionData::default());
    }

    #[test]
    fn month_labels() {
        assert_eq!(month_label(2024 * 12), "2024-01");
        assert_eq!(month_label(2024 * 12 + 11), "2024-12");
    }
}
