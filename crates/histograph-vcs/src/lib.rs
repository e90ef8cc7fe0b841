//! Read-only access to git history.
//!
//! [`GitCli`] runs queries through the `git` executable with bounded output
//! capture. The mining pipeline only depends on the narrow
//! [`HistorySource`] trait, so tests can feed it canned query output.

use std::future::Future;

use histograph_core::Result;

pub mod executor;
pub mod parse;
pub mod types;

pub use executor::GitCli;
pub use parse::ParsedLog;
pub use types::{
    Branch, ChangeStatus, Commit, FileChange, NumstatEntry, RepositoryInfo, ShortStat,
    StatusEntry,
};

/// The history queries the mining pipeline needs.
///
/// Each method returns the raw text of one query; parsing lives in
/// [`parse`]. Implementations must be shareable across tasks because
/// line-history queries for one file run concurrently.
pub trait HistorySource: Send + Sync + 'static {
    /// Reverse-chronological log over all refs with shortstat summaries,
    /// fields formatted by [`parse::log_format`] with [`Self::field_delimiter`].
    fn commit_log(&self) -> impl Future<Output = Result<String>> + Send;

    /// `--numstat` output for the files one commit touched.
    fn numstat(&self, hash: &str) -> impl Future<Output = Result<String>> + Send;

    /// Line-range history of `path` for lines `start..=end`, one
    /// [`parse::LINE_HISTORY_MARKER`] line per responsible commit.
    fn line_history(
        &self,
        path: &str,
        start: usize,
        end: usize,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Delimiter placed between log fields.
    fn field_delimiter(&self) -> &str;
}
