//! Parsers for git query output.
//!
//! Every parser is tolerant: lines that do not fit the expected shape are
//! dropped, and where callers need to know about it they are returned on
//! the side instead of failing the whole parse.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use histograph_core::{HistographError, Result};
use regex::Regex;

use crate::types::{Branch, ChangeStatus, Commit, FileChange, NumstatEntry, ShortStat, StatusEntry};

/// Placeholders of the commit log format, in field order.
pub const LOG_FIELDS: [&str; 8] = ["%H", "%h", "%an", "%ae", "%aI", "%P", "%D", "%s"];

/// Marker prefixed to every commit id in line-history output.
pub const LINE_HISTORY_MARKER: &str = "COMMIT:";

static FILES_CHANGED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) files? changed").expect("valid regex"));
static INSERTIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) insertions?\s*\(\+\)").expect("valid regex"));
static DELETIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) deletions?\s*\(-\)").expect("valid regex"));

/// Build the `--format=` value for the commit log with `delimiter` between fields.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::log_format;
///
/// assert_eq!(log_format("|"), "%H|%h|%an|%ae|%aI|%P|%D|%s");
/// ```
pub fn log_format(delimiter: &str) -> String {
    LOG_FIELDS.join(delimiter)
}

/// Commits parsed from a log, plus the records that could not be parsed.
#[derive(Debug, Default)]
pub struct ParsedLog {
    /// Commits in log order (newest first for a default log).
    pub commits: Vec<Commit>,
    /// One [`HistographError::MalformedRecord`] per dropped line.
    pub malformed: Vec<HistographError>,
}

/// Parse `git log --shortstat` output produced with [`log_format`].
///
/// Summary lines attach to the commit that precedes them. The subject is the
/// last field, so a delimiter inside a subject is kept as part of it.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_commit_log;
///
/// let out = "abc|ab|alice|a@x.io|2024-01-02T03:04:05+00:00||HEAD -> main|init\n\
///            \n 2 files changed, 7 insertions(+)\n";
/// let log = parse_commit_log(out, "|");
/// assert_eq!(log.commits.len(), 1);
/// assert_eq!(log.commits[0].refs, vec!["main"]);
/// assert_eq!(log.commits[0].insertions, 7);
/// ```
pub fn parse_commit_log(output: &str, delimiter: &str) -> ParsedLog {
    let mut parsed = ParsedLog::default();

    for raw in output.lines() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if !line.contains(delimiter) {
            if let Some(stat) = parse_shortstat(line) {
                if let Some(last) = parsed.commits.last_mut() {
                    last.files_changed = stat.files_changed;
                    last.insertions = stat.insertions;
                    last.deletions = stat.deletions;
                }
                continue;
            }
        }

        match parse_commit_record(line, delimiter) {
            Ok(commit) => parsed.commits.push(commit),
            Err(e) => parsed.malformed.push(e),
        }
    }

    parsed
}

/// One log record, or [`HistographError::MalformedRecord`] carrying the line.
fn parse_commit_record(line: &str, delimiter: &str) -> Result<Commit> {
    let malformed = || HistographError::MalformedRecord(line.to_string());
    let fields: Vec<&str> = line.splitn(LOG_FIELDS.len(), delimiter).collect();
    if fields.len() < LOG_FIELDS.len() {
        return Err(malformed());
    }

    let hash = fields[0].trim();
    if hash.is_empty() {
        return Err(malformed());
    }
    let date = parse_date(fields[4]).ok_or_else(malformed)?;

    Ok(Commit {
        hash: hash.to_string(),
        short_hash: fields[1].trim().to_string(),
        author: fields[2].to_string(),
        email: fields[3].to_string(),
        date,
        subject: fields[7].to_string(),
        parents: fields[5].split_whitespace().map(String::from).collect(),
        refs: parse_decorations(fields[6]),
        files_changed: 0,
        insertions: 0,
        deletions: 0,
    })
}

/// Parse a strict ISO 8601 author date (`%aI`).
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

/// Split a `%D` decoration list into ref names.
///
/// `HEAD -> main` becomes `main`; a bare `HEAD` is dropped.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_decorations;
///
/// let refs = parse_decorations("HEAD -> main, origin/main, tag: v1.0");
/// assert_eq!(refs, vec!["main", "origin/main", "tag: v1.0"]);
/// ```
pub fn parse_decorations(decorations: &str) -> Vec<String> {
    decorations
        .split(',')
        .map(str::trim)
        .map(|d| d.strip_prefix("HEAD -> ").unwrap_or(d))
        .filter(|d| !d.is_empty() && *d != "HEAD")
        .map(String::from)
        .collect()
}

/// Parse a shortstat summary such as `3 files changed, 10 insertions(+), 2 deletions(-)`.
///
/// Returns `None` when the line is not a summary line.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_shortstat;
///
/// let stat = parse_shortstat(" 1 file changed, 3 deletions(-)").unwrap();
/// assert_eq!(stat.files_changed, 1);
/// assert_eq!(stat.insertions, 0);
/// assert_eq!(stat.deletions, 3);
/// ```
pub fn parse_shortstat(line: &str) -> Option<ShortStat> {
    let files = FILES_CHANGED.captures(line)?;
    let capture_u64 = |re: &Regex| {
        re.captures(line)
            .and_then(|c| c[1].parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(ShortStat {
        files_changed: files[1].parse().unwrap_or(0),
        insertions: capture_u64(&INSERTIONS),
        deletions: capture_u64(&DELETIONS),
    })
}

/// Parse `--numstat` output. Binary files (`-` counts) read as zero.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_numstat;
///
/// let entries = parse_numstat("5\t2\tsrc/a.ts\n-\t-\tlogo.png\n");
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[0].insertions, 5);
/// assert_eq!(entries[1].deletions, 0);
/// ```
pub fn parse_numstat(output: &str) -> Vec<NumstatEntry> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let insertions = parts.next()?;
            let deletions = parts.next()?;
            let path = parts.next()?.trim_end_matches('\r');
            if path.is_empty() {
                return None;
            }
            Some(NumstatEntry {
                path: path.to_string(),
                insertions: parse_count(insertions),
                deletions: parse_count(deletions),
            })
        })
        .collect()
}

fn parse_count(value: &str) -> u64 {
    value.trim().parse().unwrap_or(0)
}

/// Parse `--name-status` output into file changes with zero line counts.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_name_status;
/// use histograph_vcs::ChangeStatus;
///
/// let changes = parse_name_status("A\tnew.ts\nR087\told.ts\tmoved.ts\n");
/// assert_eq!(changes[0].status, ChangeStatus::Added);
/// assert_eq!(changes[1].path, "moved.ts");
/// assert_eq!(changes[1].previous_path(), Some("old.ts"));
/// ```
pub fn parse_name_status(output: &str) -> Vec<FileChange> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            let mut parts = line.split('\t');
            let code = parts.next()?.trim();
            let first = parts.next()?;
            let second = parts.next();

            let (path, status) = match code.chars().next()? {
                'A' | 'C' => (second.unwrap_or(first), ChangeStatus::Added),
                'D' => (first, ChangeStatus::Deleted),
                'R' => match second {
                    Some(new_path) => (
                        new_path,
                        ChangeStatus::Renamed {
                            from: first.to_string(),
                        },
                    ),
                    None => (first, ChangeStatus::Modified),
                },
                _ => (first, ChangeStatus::Modified),
            };

            if path.is_empty() {
                return None;
            }
            Some(FileChange {
                path: path.to_string(),
                status,
                insertions: 0,
                deletions: 0,
            })
        })
        .collect()
}

/// Attach numstat line counts to name-status changes by path.
pub fn merge_file_changes(mut changes: Vec<FileChange>, numstat: &[NumstatEntry]) -> Vec<FileChange> {
    for change in &mut changes {
        if let Some(entry) = numstat.iter().find(|e| e.path == change.path) {
            change.insertions = entry.insertions;
            change.deletions = entry.deletions;
        }
    }
    changes
}

/// Distinct commit ids from line-history output, in first-seen order.
///
/// Only lines starting with [`LINE_HISTORY_MARKER`] count; diff text in
/// between is ignored.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_line_history;
///
/// let out = "COMMIT:aaa\n\ndiff --git a/x b/x\n+COMMIT:zzz\nCOMMIT:bbb\nCOMMIT:aaa\n";
/// assert_eq!(parse_line_history(out), vec!["aaa", "bbb"]);
/// ```
pub fn parse_line_history(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut commits = Vec::new();
    for line in output.lines() {
        let Some(rest) = line.strip_prefix(LINE_HISTORY_MARKER) else {
            continue;
        };
        let hash = rest.trim();
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        if seen.insert(hash.to_string()) {
            commits.push(hash.to_string());
        }
    }
    commits
}

/// Parse `branch -a --format=%(refname:short)|%(HEAD)` output.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_branches;
///
/// let branches = parse_branches("main|*\nfeature| \norigin/HEAD| \norigin/main| \n");
/// assert_eq!(branches.len(), 3);
/// assert!(branches[0].is_current);
/// assert!(branches[2].is_remote);
/// ```
pub fn parse_branches(output: &str) -> Vec<Branch> {
    let mut branches: Vec<Branch> = Vec::new();
    for line in output.lines() {
        let line = line.trim().replace('\'', "");
        if line.is_empty() {
            continue;
        }
        let (name, head) = line.split_once('|').unwrap_or((line.as_str(), ""));
        if name.is_empty() || name.contains("HEAD") {
            continue;
        }

        let is_remote = name.starts_with("remotes/") || name.starts_with("origin/");
        let clean = name.strip_prefix("remotes/").unwrap_or(name);
        if branches.iter().any(|b| b.name == clean) {
            continue;
        }
        branches.push(Branch {
            name: clean.to_string(),
            is_current: head.trim() == "*",
            is_remote,
        });
    }
    branches
}

/// Parse `status --porcelain` output. Leading spaces are significant.
///
/// # Examples
///
/// ```
/// use histograph_vcs::parse::parse_status;
///
/// let entries = parse_status("MM src/a.ts\n?? notes.md\n D gone.ts\n");
/// assert_eq!(entries.len(), 4);
/// assert!(entries[0].staged);
/// assert!(!entries[1].staged);
/// assert_eq!(entries[2].status, "untracked");
/// assert_eq!(entries[3].status, "deleted");
/// ```
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    for line in output.split('\n') {
        let line = line.trim_end_matches('\r');
        let mut chars = line.chars();
        let (Some(staged), Some(unstaged)) = (chars.next(), chars.next()) else {
            continue;
        };
        let Some(path) = line.get(3..).map(str::trim) else {
            continue;
        };
        if path.is_empty() {
            continue;
        }

        if staged == '?' && unstaged == '?' {
            entries.push(StatusEntry {
                path: path.to_string(),
                status: "untracked".into(),
                staged: false,
            });
            continue;
        }
        if staged != ' ' && staged != '?' {
            entries.push(StatusEntry {
                path: path.to_string(),
                status: status_label(staged).into(),
                staged: true,
            });
        }
        if unstaged != ' ' && unstaged != '?' {
            entries.push(StatusEntry {
                path: path.to_string(),
                status: status_label(unstaged).into(),
                staged: false,
            });
        }
    }
    entries
}

/// Label for a porcelain status code.
pub fn status_label(code: char) -> &'static str {
    match code {
        'M' => "modified",
        'A' => "added",
        'D' => "deleted",
        'R' => "renamed",
        'C' => "copied",
        'U' => "unmerged",
        '?' => "untracked",
        '!' => "ignored",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: &str = "\u{1f}";

    fn record(hash: &str, parents: &str, refs: &str, subject: &str) -> String {
        [
            hash,
            &hash[..hash.len().min(7)],
            "Alice",
            "alice@example.com",
            "2024-05-01T12:00:00+02:00",
            parents,
            refs,
            subject,
        ]
        .join(D)
    }

    #[test]
    fn commit_log_with_shortstats() {
        let output = format!(
            "{}\n\n 3 files changed, 10 insertions(+), 2 deletions(-)\n{}\n\n 1 file changed, 1 insertion(+)\n",
            record("bbbbbbbbbb", "aaaaaaaaaa", "HEAD -> main", "second"),
            record("aaaaaaaaaa", "", "", "first"),
        );
        let log = parse_commit_log(&output, D);
        assert!(log.malformed.is_empty());
        assert_eq!(log.commits.len(), 2);

        let newest = &log.commits[0];
        assert_eq!(newest.hash, "bbbbbbbbbb");
        assert_eq!(newest.short_hash, "bbbbbbb");
        assert_eq!(newest.parents, vec!["aaaaaaaaaa"]);
        assert_eq!(newest.refs, vec!["main"]);
        assert_eq!(newest.files_changed, 3);
        assert_eq!(newest.insertions, 10);
        assert_eq!(newest.deletions, 2);

        let root = &log.commits[1];
        assert!(root.is_root());
        assert_eq!(root.insertions, 1);
        assert_eq!(root.deletions, 0);
    }

    #[test]
    fn delimiter_inside_subject_is_kept() {
        let output = record("cccccccccc", "", "", &format!("a{D}b"));
        let log = parse_commit_log(&output, D);
        assert_eq!(log.commits.len(), 1);
        assert_eq!(log.commits[0].subject, format!("a{D}b"));
    }

    #[test]
    fn short_records_are_dropped_as_malformed() {
        let output = format!(
            "only{D}three{D}fields\n{}\n",
            record("dddddddddd", "", "", "ok")
        );
        let log = parse_commit_log(&output, D);
        assert_eq!(log.commits.len(), 1);
        assert_eq!(log.malformed.len(), 1);
        match &log.malformed[0] {
            HistographError::MalformedRecord(line) => {
                assert_eq!(line, &format!("only{D}three{D}fields"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_date_is_malformed() {
        let output = ["eeee", "ee", "a", "e", "yesterday", "", "", "s"].join(D);
        let log = parse_commit_log(&output, D);
        assert!(log.commits.is_empty());
        assert_eq!(log.malformed.len(), 1);
        assert!(matches!(log.malformed[0], HistographError::MalformedRecord(_)));
        assert!(log.malformed[0].to_string().starts_with("malformed record: eeee"));
    }

    #[test]
    fn merge_commit_has_two_parents() {
        let output = record("ffffffffff", "aaaa bbbb", "", "Merge branch");
        let log = parse_commit_log(&output, D);
        assert!(log.commits[0].is_merge());
    }

    #[test]
    fn shortstat_variants() {
        let both = parse_shortstat("2 files changed, 5 insertions(+), 4 deletions(-)").unwrap();
        assert_eq!((both.files_changed, both.insertions, both.deletions), (2, 5, 4));

        let ins_only = parse_shortstat("1 file changed, 1 insertion(+)").unwrap();
        assert_eq!((ins_only.insertions, ins_only.deletions), (1, 0));

        assert!(parse_shortstat("not a stat line").is_none());
    }

    #[test]
    fn numstat_skips_short_lines() {
        let entries = parse_numstat("3\t1\ta.ts\ngarbage\n\n2\t0\tdir/with space.ts\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, "dir/with space.ts");
    }

    #[test]
    fn name_status_statuses() {
        let changes = parse_name_status("M\ta.ts\nD\tb.ts\nA\tc.ts\nR100\td.ts\te.ts\nT\tf.ts\n");
        let statuses: Vec<&str> = changes.iter().map(|c| c.status.label()).collect();
        assert_eq!(
            statuses,
            vec!["modified", "deleted", "added", "renamed", "modified"]
        );
        assert_eq!(changes[3].path, "e.ts");
    }

    #[test]
    fn merge_attaches_counts_by_path() {
        let changes = parse_name_status("M\ta.ts\nA\tb.ts\n");
        let numstat = parse_numstat("7\t3\ta.ts\n");
        let merged = merge_file_changes(changes, &numstat);
        assert_eq!((merged[0].insertions, merged[0].deletions), (7, 3));
        assert_eq!((merged[1].insertions, merged[1].deletions), (0, 0));
    }

    #[test]
    fn line_history_ignores_non_hex_markers() {
        let commits = parse_line_history("COMMIT:abc123\nCOMMIT:not-a-hash\nCOMMIT:def456\n");
        assert_eq!(commits, vec!["abc123", "def456"]);
    }

    #[test]
    fn line_history_empty_output() {
        assert!(parse_line_history("").is_empty());
    }

    #[test]
    fn branches_collapse_duplicates_and_strip_remotes() {
        let branches = parse_branches("'main|*'\nremotes/origin/dev| \norigin/dev| \n");
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].name, "main");
        assert!(branches[0].is_current);
        assert_eq!(branches[1].name, "origin/dev");
        assert!(branches[1].is_remote);
    }

    #[test]
    fn status_handles_renames_and_short_lines() {
        let entries = parse_status("R  old.ts -> new.ts\nx\n A added.ts\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, "renamed");
        assert!(entries[0].staged);
        assert_eq!(entries[1].status, "added");
        assert!(!entries[1].staged);
    }
}
