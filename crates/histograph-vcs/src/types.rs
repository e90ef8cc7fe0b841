//! Structured records parsed from git query output.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A commit as reported by the history log.
///
/// # Examples
///
/// ```
/// use chrono::DateTime;
/// use histograph_vcs::Commit;
///
/// let commit = Commit {
///     hash: "9fceb02d0ae598e95dc970b74767f19372d61af8".into(),
///     short_hash: "9fceb02".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     date: DateTime::parse_from_rfc3339("2024-03-01T10:00:00+00:00").unwrap(),
///     subject: "fix: auth bug".into(),
///     parents: vec![],
///     refs: vec!["main".into()],
///     files_changed: 2,
///     insertions: 10,
///     deletions: 3,
/// };
/// assert!(commit.is_root());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Full commit hash.
    pub hash: String,
    /// Abbreviated commit hash.
    pub short_hash: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Author date with its original offset.
    pub date: DateTime<FixedOffset>,
    /// First line of the commit message.
    pub subject: String,
    /// Parent hashes, empty for a root commit.
    pub parents: Vec<String>,
    /// Branch and tag decorations pointing at this commit.
    pub refs: Vec<String>,
    /// Files changed according to the shortstat summary.
    pub files_changed: u32,
    /// Lines inserted according to the shortstat summary.
    pub insertions: u64,
    /// Lines deleted according to the shortstat summary.
    pub deletions: u64,
}

impl Commit {
    /// Returns `true` if the commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if the commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Aggregate counts from a `--shortstat` summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortStat {
    /// Files changed.
    pub files_changed: u32,
    /// Lines inserted.
    pub insertions: u64,
    /// Lines deleted.
    pub deletions: u64,
}

/// One line of `--numstat` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumstatEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Lines inserted; binary files count as zero.
    pub insertions: u64,
    /// Lines deleted; binary files count as zero.
    pub deletions: u64,
}

/// A single file change within a commit.
///
/// # Examples
///
/// ```
/// use histograph_vcs::{ChangeStatus, FileChange};
///
/// let change = FileChange {
///     path: "src/app.ts".into(),
///     status: ChangeStatus::Renamed { from: "src/main.ts".into() },
///     insertions: 4,
///     deletions: 1,
/// };
/// assert_eq!(change.previous_path(), Some("src/main.ts"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// File path relative to repo root.
    pub path: String,
    /// Type of change.
    pub status: ChangeStatus,
    /// Lines added in this commit.
    pub insertions: u64,
    /// Lines deleted in this commit.
    pub deletions: u64,
}

impl FileChange {
    /// The path before a rename, if this change is a rename.
    pub fn previous_path(&self) -> Option<&str> {
        match &self.status {
            ChangeStatus::Renamed { from } => Some(from),
            _ => None,
        }
    }
}

/// Status of a file change within a commit.
///
/// # Examples
///
/// ```
/// use histograph_vcs::ChangeStatus;
///
/// let status = ChangeStatus::Added;
/// assert_eq!(status.label(), "added");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// New file.
    Added,
    /// Existing file modified.
    Modified,
    /// File removed.
    Deleted,
    /// File renamed from another path.
    Renamed {
        /// Original path before rename.
        from: String,
    },
}

impl ChangeStatus {
    /// Lowercase label used in text output.
    pub fn label(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Modified => "modified",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed { .. } => "renamed",
        }
    }
}

/// A local or remote branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// Short branch name, `remotes/` prefix removed.
    pub name: String,
    /// Whether this is the checked-out branch.
    pub is_current: bool,
    /// Whether this is a remote-tracking branch.
    pub is_remote: bool,
}

/// One entry of working-tree status.
///
/// A file with both staged and unstaged changes yields two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Status label (`modified`, `added`, `untracked`, ...).
    pub status: String,
    /// Whether the change is in the index.
    pub staged: bool,
}

/// Summary information about a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    /// Directory name of the repository root.
    pub name: String,
    /// Repository root path.
    pub path: PathBuf,
    /// Checked-out branch (`HEAD` when detached).
    pub current_branch: String,
    /// Commits reachable from `HEAD`.
    pub total_commits: u64,
    /// Distinct authors reachable from `HEAD`.
    pub total_contributors: u64,
    /// Author date of the oldest commit.
    pub first_commit_date: Option<DateTime<FixedOffset>>,
    /// Author date of the newest commit.
    pub last_commit_date: Option<DateTime<FixedOffset>>,
}
