//! File ownership, knowledge silos and bus factor.
//!
//! Ownership is attributed from MODIFIES edges: every commit that touched a
//! file counts once for the commit's author, keyed by email.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::model::{CommitMetadata, EdgeKind, KnowledgeGraph};

/// Owners whose share of a file is at or below this are not significant.
const SIGNIFICANT_SHARE: f64 = 0.10;

/// One author's contribution to a file.
///
/// # Examples
///
/// ```
/// use histograph_graph::ownership::OwnerInfo;
///
/// let owner = OwnerInfo {
///     author: "alice".into(),
///     author_email: "alice@example.com".into(),
///     commits: 15,
///     percentage: 75.0,
///     lines_added: 420,
///     lines_deleted: 37,
/// };
/// assert!(owner.percentage > 50.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerInfo {
    /// Author name as first seen for this email.
    pub author: String,
    /// Author email.
    pub author_email: String,
    /// Commits by this author touching the file.
    pub commits: u32,
    /// Share of the file's commits, `0.0..=100.0`.
    pub percentage: f64,
    /// Lines this author added to the file.
    pub lines_added: u64,
    /// Lines this author deleted from the file.
    pub lines_deleted: u64,
}

/// Ownership of a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOwnership {
    /// Path relative to the repository root.
    pub file_path: String,
    /// Owners, most commits first.
    pub owners: Vec<OwnerInfo>,
    /// Commits touching the file.
    pub total_commits: u32,
    /// Date of the newest commit touching the file.
    pub last_modified: Option<DateTime<FixedOffset>>,
    /// Top owner's share, `0.0..=1.0`.
    pub dominant_share: f64,
    /// Owners holding more than 10% of the commits.
    pub bus_factor: u32,
    /// Whether the dominant share is above the silo threshold.
    pub is_knowledge_silo: bool,
}

/// Ownership across every file in the graph.
///
/// # Examples
///
/// ```
/// use histograph_graph::ownership::OwnershipSummary;
///
/// let summary = OwnershipSummary {
///     total_files: 50,
///     single_author_files: 10,
///     knowledge_silos: 15,
///     project_bus_factor: 2,
///     files: vec![],
/// };
/// assert_eq!(summary.total_files, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipSummary {
    /// Files with at least one attributed commit.
    pub total_files: usize,
    /// Files with exactly one owner.
    pub single_author_files: usize,
    /// Files whose dominant share is above the threshold.
    pub knowledge_silos: usize,
    /// Fewest top contributors whose loss leaves more than half the files
    /// without a significant owner.
    pub project_bus_factor: u32,
    /// Per-file ownership, most concentrated first.
    pub files: Vec<FileOwnership>,
}

#[derive(Default)]
struct OwnerTally<'a> {
    author: &'a str,
    commits: u32,
    lines_added: u64,
    lines_deleted: u64,
}

#[derive(Default)]
struct FileTally<'a> {
    owners: Vec<(&'a str, OwnerTally<'a>)>,
    commits: HashSet<&'a str>,
    last_modified: Option<DateTime<FixedOffset>>,
}

/// Ownership of every touched file, in first-touched order.
fn tally(graph: &KnowledgeGraph) -> Vec<(String, FileTally<'_>)> {
    let commits: HashMap<&str, &CommitMetadata> = graph
        .commit_nodes()
        .map(|(node, meta)| (node.id.as_str(), meta))
        .collect();
    let paths: HashMap<&str, &str> = graph
        .file_nodes()
        .map(|(node, meta)| (node.id.as_str(), meta.path.as_str()))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut files: HashMap<String, FileTally<'_>> = HashMap::new();

    for edge in graph.edges_of(EdgeKind::Modifies) {
        let Some(&commit) = commits.get(edge.source.as_str()) else {
            continue;
        };
        let path = paths
            .get(edge.target.as_str())
            .copied()
            .unwrap_or_else(|| edge.target.strip_prefix("file:").unwrap_or(&edge.target));

        let file = files.entry(path.to_string()).or_insert_with(|| {
            order.push(path.to_string());
            FileTally::default()
        });
        if !file.commits.insert(edge.source.as_str()) {
            continue;
        }
        if file.last_modified.map_or(true, |d| commit.date > d) {
            file.last_modified = Some(commit.date);
        }

        let stats = edge.stats.unwrap_or_default();
        let email = commit.email.as_str();
        let position = match file.owners.iter().position(|(e, _)| *e == email) {
            Some(p) => p,
            None => {
                file.owners.push((
                    email,
                    OwnerTally {
                        author: commit.author.as_str(),
                        ..OwnerTally::default()
                    },
                ));
                file.owners.len() - 1
            }
        };
        let owner = &mut file.owners[position].1;
        owner.commits += 1;
        owner.lines_added += stats.insertions;
        owner.lines_deleted += stats.deletions;
    }

    order
        .into_iter()
        .filter_map(|path| files.remove(&path).map(|t| (path, t)))
        .collect()
}

fn to_ownership(path: String, tally: FileTally<'_>, silo_threshold: f64) -> FileOwnership {
    let total_commits: u32 = tally.owners.iter().map(|(_, o)| o.commits).sum();
    let mut owners: Vec<OwnerInfo> = tally
        .owners
        .into_iter()
        .map(|(email, o)| OwnerInfo {
            author: o.author.to_string(),
            author_email: email.to_string(),
            commits: o.commits,
            percentage: share(o.commits, total_commits) * 100.0,
            lines_added: o.lines_added,
            lines_deleted: o.lines_deleted,
        })
        .collect();
    owners.sort_by(|a, b| b.commits.cmp(&a.commits));

    let dominant_share = owners
        .first()
        .map_or(0.0, |o| share(o.commits, total_commits));
    let bus_factor = owners
        .iter()
        .filter(|o| share(o.commits, total_commits) > SIGNIFICANT_SHARE)
        .count() as u32;

    FileOwnership {
        file_path: path,
        owners,
        total_commits,
        last_modified: tally.last_modified,
        dominant_share,
        bus_factor,
        is_knowledge_silo: dominant_share > silo_threshold,
    }
}

fn share(commits: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        commits as f64 / total as f64
    }
}

/// Ownership of the file at `path`, or `None` if no commit touched it.
pub fn file_ownership(graph: &KnowledgeGraph, path: &str, silo_threshold: f64) -> Option<FileOwnership> {
    let key = path.strip_prefix("file:").unwrap_or(path);
    tally(graph)
        .into_iter()
        .find(|(p, _)| p == key)
        .map(|(p, t)| to_ownership(p, t, silo_threshold))
}

/// Ownership of every file plus project-level silo and bus factor figures.
pub fn ownership_summary(graph: &KnowledgeGraph, silo_threshold: f64) -> OwnershipSummary {
    let mut files: Vec<FileOwnership> = tally(graph)
        .into_iter()
        .map(|(p, t)| to_ownership(p, t, silo_threshold))
        .collect();

    files.sort_by(|a, b| {
        b.dominant_share
            .partial_cmp(&a.dominant_share)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    OwnershipSummary {
        total_files: files.len(),
        single_author_files: files.iter().filter(|f| f.owners.len() == 1).count(),
        knowledge_silos: files.iter().filter(|f| f.is_knowledge_silo).count(),
        project_bus_factor: project_bus_factor(&files),
        files,
    }
}

/// Remove top contributors one by one until more than half the files have
/// no significant owner left.
fn project_bus_factor(files: &[FileOwnership]) -> u32 {
    if files.is_empty() {
        return 0;
    }

    let mut reach: HashMap<&str, u32> = HashMap::new();
    for file in files {
        for owner in &file.owners {
            *reach.entry(owner.author_email.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<(&str, u32)> = reach.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let threshold = files.len() / 2;
    let mut removed: HashSet<&str> = HashSet::new();
    let mut removals = 0u32;

    for (email, _) in ranked {
        removed.insert(email);
        removals += 1;

        let orphaned = files
            .iter()
            .filter(|f| {
                !f.owners.iter().any(|o| {
                    share(o.commits, f.total_commits) > SIGNIFICANT_SHARE
                        && !removed.contains(o.author_email.as_str())
                })
            })
            .count();
        if orphaned > threshold {
            return removals;
        }
    }

    removals
}
