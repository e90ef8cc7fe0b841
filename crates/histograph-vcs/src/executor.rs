//! Read-only git queries run through the `git` executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use histograph_core::{HistographError, Result, VcsConfig};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use crate::parse::{self, ParsedLog, LINE_HISTORY_MARKER};
use crate::types::{Branch, FileChange, NumstatEntry, RepositoryInfo, StatusEntry};
use crate::HistorySource;

/// Captured stderr is cut to this many bytes; the rest is drained and discarded.
const STDERR_CAP: usize = 64 * 1024;

/// Runs git queries against one repository.
///
/// Every query is a separate process. Stdout is buffered up to the
/// configured ceiling; a query that produces more fails with
/// [`HistographError::OutputTooLarge`] and the process is killed.
///
/// # Examples
///
/// ```no_run
/// use histograph_core::VcsConfig;
/// use histograph_vcs::GitCli;
///
/// # async fn demo() -> histograph_core::Result<()> {
/// let git = GitCli::new(".", &VcsConfig::default());
/// git.verify().await?;
/// let log = git.commits().await?;
/// println!("{} commits", log.commits.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
    git_binary: String,
    max_output_bytes: usize,
    delimiter: String,
}

impl GitCli {
    /// Create a runner for the repository at `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>, config: &VcsConfig) -> Self {
        Self {
            repo_root: repo_root.into(),
            git_binary: config.git_binary.clone(),
            max_output_bytes: config.max_output_bytes,
            delimiter: config.field_delimiter.clone(),
        }
    }

    /// Repository root every query runs in.
    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Check that git starts and the root is inside a repository.
    ///
    /// # Errors
    ///
    /// Returns [`HistographError::VcsCommand`] if git is missing or the
    /// directory is not a repository.
    pub async fn verify(&self) -> Result<()> {
        self.run(&["rev-parse", "--git-dir"]).await.map(|_| ())
    }

    /// Top-level directory of the working tree containing the root.
    ///
    /// Paths in diff output are relative to this directory, not to a
    /// subdirectory the runner was created in.
    ///
    /// # Errors
    ///
    /// Fails outside a working tree, e.g. in a bare repository.
    pub async fn toplevel(&self) -> Result<PathBuf> {
        self.run(&["rev-parse", "--show-toplevel"]).await.map(PathBuf::from)
    }

    /// Run a query and return its trimmed stdout.
    ///
    /// # Errors
    ///
    /// See [`GitCli::run_raw`].
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.run_raw(args).await?;
        Ok(output.trim().to_string())
    }

    /// Run a query and return its stdout untouched.
    ///
    /// # Errors
    ///
    /// Returns [`HistographError::VcsCommand`] when git cannot start or exits
    /// non-zero, and [`HistographError::OutputTooLarge`] when stdout passes
    /// the configured ceiling.
    pub async fn run_raw(&self, args: &[&str]) -> Result<String> {
        let command_line = describe(&self.git_binary, args);
        debug!(command = %command_line, root = %self.repo_root.display(), "running git query");

        let mut child = Command::new(&self.git_binary)
            .args(["-c", "core.quotepath=off"])
            .args(args)
            .current_dir(&self.repo_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HistographError::VcsCommand {
                command: command_line.clone(),
                status: None,
                stderr: e.to_string(),
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(HistographError::VcsCommand {
                command: command_line,
                status: None,
                stderr: "output pipes were not captured".into(),
            });
        };

        // Drained on its own task so a chatty stderr cannot block stdout.
        let stderr_task = tokio::spawn(drain_capped(stderr, STDERR_CAP));

        let limit = self.max_output_bytes;
        let mut buf = Vec::new();
        stdout
            .take(limit as u64 + 1)
            .read_to_end(&mut buf)
            .await?;

        if buf.len() > limit {
            let _ = child.kill().await;
            stderr_task.abort();
            return Err(HistographError::OutputTooLarge {
                command: command_line,
                limit,
            });
        }

        let status = child.wait().await?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(HistographError::VcsCommand {
                command: command_line,
                status: status.code(),
                stderr: stderr_text.trim().to_string(),
            });
        }

        debug!(command = %command_line, bytes = buf.len(), "git query finished");
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Resolve `rev` to a commit id, abbreviated when `short` is set.
    ///
    /// # Errors
    ///
    /// Fails if the revision does not exist.
    pub async fn rev_parse(&self, rev: &str, short: bool) -> Result<String> {
        if short {
            self.run(&["rev-parse", "--short", rev]).await
        } else {
            self.run(&["rev-parse", rev]).await
        }
    }

    /// Every reachable commit across all refs, newest first.
    ///
    /// # Errors
    ///
    /// Fails if the log query fails. Unparsable lines are returned in
    /// [`ParsedLog::malformed`] instead.
    pub async fn commits(&self) -> Result<ParsedLog> {
        let output = self.commit_log().await?;
        Ok(parse::parse_commit_log(&output, &self.delimiter))
    }

    /// Per-file line counts for one commit.
    ///
    /// # Errors
    ///
    /// Fails if the commit does not exist.
    pub async fn numstat_entries(&self, hash: &str) -> Result<Vec<NumstatEntry>> {
        let output = self.numstat(hash).await?;
        Ok(parse::parse_numstat(&output))
    }

    /// Raw `--name-status` output for one commit, with rename detection.
    ///
    /// # Errors
    ///
    /// Fails if the commit does not exist.
    pub async fn name_status(&self, hash: &str) -> Result<String> {
        self.run_raw(&[
            "diff-tree",
            "--no-commit-id",
            "--name-status",
            "-r",
            "-M",
            "--root",
            hash,
        ])
        .await
    }

    /// File changes of one commit with status and line counts.
    ///
    /// # Errors
    ///
    /// Fails if either underlying query fails.
    pub async fn file_changes(&self, hash: &str) -> Result<Vec<FileChange>> {
        let changes = parse::parse_name_status(&self.name_status(hash).await?);
        let numstat = self.numstat_entries(hash).await?;
        Ok(parse::merge_file_changes(changes, &numstat))
    }

    /// Distinct commits responsible for lines `start..=end` of `path`.
    ///
    /// # Errors
    ///
    /// Fails if the path or range is unknown to git.
    pub async fn line_commits(&self, path: &str, start: usize, end: usize) -> Result<Vec<String>> {
        let output = self.line_history(path, start, end).await?;
        Ok(parse::parse_line_history(&output))
    }

    /// Local and remote branches.
    ///
    /// # Errors
    ///
    /// Fails if the branch query fails.
    pub async fn branches(&self) -> Result<Vec<Branch>> {
        let output = self
            .run(&["branch", "-a", "--format=%(refname:short)|%(HEAD)"])
            .await?;
        Ok(parse::parse_branches(&output))
    }

    /// Working-tree status entries.
    ///
    /// # Errors
    ///
    /// Fails if the status query fails.
    pub async fn status(&self) -> Result<Vec<StatusEntry>> {
        // Untrimmed: the first column of porcelain output is significant.
        let output = self.run_raw(&["status", "--porcelain"]).await?;
        Ok(parse::parse_status(&output))
    }

    /// Name, branch, size and date range of the repository.
    ///
    /// # Errors
    ///
    /// Fails if the repository has no commits.
    pub async fn repository_info(&self) -> Result<RepositoryInfo> {
        let toplevel = self.toplevel().await?;
        let name = toplevel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| toplevel.display().to_string());

        let current_branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let total_commits = self
            .run(&["rev-list", "--count", "HEAD"])
            .await?
            .parse::<u64>()
            .unwrap_or(0);
        let total_contributors = self
            .run(&["shortlog", "-sn", "HEAD"])
            .await?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count() as u64;

        let roots = self
            .run(&["log", "--max-parents=0", "--format=%aI", "HEAD"])
            .await?;
        let first_commit_date = roots.lines().filter_map(parse::parse_date).min();
        let last_commit_date = parse::parse_date(&self.run(&["log", "-1", "--format=%aI", "HEAD"]).await?);

        Ok(RepositoryInfo {
            name,
            path: toplevel,
            current_branch,
            total_commits,
            total_contributors,
            first_commit_date,
            last_commit_date,
        })
    }
}

impl HistorySource for GitCli {
    async fn commit_log(&self) -> Result<String> {
        let format = format!("--format={}", parse::log_format(&self.delimiter));
        self.run_raw(&["log", "--all", "--shortstat", &format]).await
    }

    async fn numstat(&self, hash: &str) -> Result<String> {
        self.run_raw(&["diff-tree", "--no-commit-id", "--numstat", "-r", "--root", hash])
            .await
    }

    async fn line_history(&self, path: &str, start: usize, end: usize) -> Result<String> {
        let range = format!("-L{start},{end}:{path}");
        let format = format!("--format={LINE_HISTORY_MARKER}%H");
        self.run_raw(&["log", &range, &format]).await
    }

    fn field_delimiter(&self) -> &str {
        &self.delimiter
    }
}

fn describe(binary: &str, args: &[&str]) -> String {
    let mut line = binary.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

async fn drain_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> String {
    let mut kept = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).into_owned()
}
