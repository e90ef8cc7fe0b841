use std::fmt;
use std::path::PathBuf;

/// Errors that can occur while mining history or building the graph.
///
/// Library crates use this type directly; the binary converts to a
/// `miette` report at the boundary.
///
/// # Examples
///
/// ```
/// use histograph_core::HistographError;
///
/// let err = HistographError::Config("missing delimiter".into());
/// assert!(err.to_string().contains("missing delimiter"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HistographError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The version-control tool exited non-zero or could not be started.
    #[error("git command failed: `{command}` ({}): {stderr}", exit_label(.status))]
    #[diagnostic(help("check that the path is a git repository and that git is on PATH"))]
    VcsCommand {
        /// The command line that was run.
        command: String,
        /// Exit code, `None` when the process never ran or was killed.
        status: Option<i32>,
        /// Diagnostic output captured from the tool.
        stderr: String,
    },

    /// Buffered output exceeded the configured ceiling.
    #[error("git command output exceeded {limit} bytes: `{command}`")]
    OutputTooLarge {
        /// The command line that was run.
        command: String,
        /// Ceiling in bytes.
        limit: usize,
    },

    /// A working-tree source file could not be read as text.
    #[error("cannot read {}: {kind}", .path.display())]
    SourceRead {
        /// Absolute path that was read.
        path: PathBuf,
        /// Why the read failed.
        kind: SourceReadKind,
    },

    /// A structured query result had too few delimited fields.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// The analysis run could not continue.
    #[error("analysis aborted: {0}")]
    PipelineAbort(String),

    /// The caller cancelled the analysis run.
    #[error("analysis cancelled")]
    Cancelled,

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Reason a source file could not be read.
///
/// # Examples
///
/// ```
/// use histograph_core::SourceReadKind;
///
/// assert_eq!(SourceReadKind::NotUtf8.to_string(), "not valid UTF-8");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceReadKind {
    /// The file does not exist in the working tree.
    NotFound,
    /// The process may not read the file.
    PermissionDenied,
    /// The content is not UTF-8.
    NotUtf8,
    /// The content looks like binary data.
    Binary,
    /// Any other I/O failure.
    Other,
}

impl fmt::Display for SourceReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceReadKind::NotFound => write!(f, "not found"),
            SourceReadKind::PermissionDenied => write!(f, "permission denied"),
            SourceReadKind::NotUtf8 => write!(f, "not valid UTF-8"),
            SourceReadKind::Binary => write!(f, "binary content"),
            SourceReadKind::Other => write!(f, "unreadable"),
        }
    }
}

impl From<std::io::ErrorKind> for SourceReadKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::NotFound => SourceReadKind::NotFound,
            std::io::ErrorKind::PermissionDenied => SourceReadKind::PermissionDenied,
            std::io::ErrorKind::InvalidData => SourceReadKind::NotUtf8,
            _ => SourceReadKind::Other,
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "did not run".into(),
    }
}

impl HistographError {
    /// Returns `true` for errors raised by the version-control boundary.
    ///
    /// # Examples
    ///
    /// ```
    /// use histograph_core::HistographError;
    ///
    /// let err = HistographError::OutputTooLarge { command: "git log".into(), limit: 10 };
    /// assert!(err.is_vcs());
    /// assert!(!HistographError::Cancelled.is_vcs());
    /// ```
    pub fn is_vcs(&self) -> bool {
        matches!(
            self,
            HistographError::VcsCommand { .. } | HistographError::OutputTooLarge { .. }
        )
    }
}
