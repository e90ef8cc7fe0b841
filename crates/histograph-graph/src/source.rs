//! Working-tree source access for function extraction.

use std::future::Future;
use std::path::PathBuf;

use histograph_core::{HistographError, Result, SourceReadKind};

/// Reads the current content of repository files.
pub trait SourceReader: Send + Sync + 'static {
    /// UTF-8 text of the file at repository-relative `path`.
    ///
    /// Fails with [`HistographError::SourceRead`] when the file is missing,
    /// unreadable, binary or not UTF-8.
    fn read(&self, path: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Reads files from a checkout on disk.
#[derive(Debug, Clone)]
pub struct FsSourceReader {
    root: PathBuf,
}

impl FsSourceReader {
    /// Reader resolving paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceReader for FsSourceReader {
    async fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| HistographError::SourceRead {
                path: full.clone(),
                kind: SourceReadKind::from(e.kind()),
            })?;

        if bytes.contains(&0) {
            return Err(HistographError::SourceRead {
                path: full,
                kind: SourceReadKind::Binary,
            });
        }

        String::from_utf8(bytes).map_err(|_| HistographError::SourceRead {
            path: full,
            kind: SourceReadKind::NotUtf8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(err: HistographError) -> Option<SourceReadKind> {
        match err {
            HistographError::SourceRead { kind, .. } => Some(kind),
            _ => None,
        }
    }

    #[tokio::test]
    async fn reads_utf8_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "const a = 1;\n").unwrap();

        let reader = FsSourceReader::new(dir.path());
        assert_eq!(reader.read("src/a.ts").await.unwrap(), "const a = 1;\n");
    }

    #[tokio::test]
    async fn classifies_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.js"), b"GIF89a\0\0\x01").unwrap();
        std::fs::write(dir.path().join("latin1.js"), b"caf\xe9").unwrap();
        let reader = FsSourceReader::new(dir.path());

        let missing = reader.read("gone.js").await.unwrap_err();
        assert_eq!(kind_of(missing), Some(SourceReadKind::NotFound));

        let binary = reader.read("logo.js").await.unwrap_err();
        assert_eq!(kind_of(binary), Some(SourceReadKind::Binary));

        let latin1 = reader.read("latin1.js").await.unwrap_err();
        assert_eq!(kind_of(latin1), Some(SourceReadKind::NotUtf8));
    }
}
