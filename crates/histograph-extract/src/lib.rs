//! Best-effort function boundary detection.
//!
//! The pipeline talks to extractors through [`FunctionExtractor`] so the
//! line-oriented [`HeuristicExtractor`] can be swapped for a grammar-based
//! one without touching graph construction.

use serde::{Deserialize, Serialize};

pub mod heuristic;
pub mod language;

pub use heuristic::HeuristicExtractor;
pub use language::{extension_of, file_name_of, language_for_extension};

/// A callable region found in source text.
///
/// # Examples
///
/// ```
/// use histograph_extract::ExtractedFunction;
///
/// let f = ExtractedFunction {
///     name: "parse".into(),
///     start_line: 10,
///     end_line: 24,
///     parameters: vec!["input".into()],
///     balanced: true,
/// };
/// assert_eq!(f.line_count(), 15);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFunction {
    /// Declared name.
    pub name: String,
    /// First line, 1-based inclusive.
    pub start_line: usize,
    /// Last line, 1-based inclusive.
    pub end_line: usize,
    /// Parameter names with type annotations removed.
    pub parameters: Vec<String>,
    /// `false` when no closing brace was found and `end_line` is the end of
    /// the scan window.
    pub balanced: bool,
}

impl ExtractedFunction {
    /// Number of lines in the region.
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Turns source text into function regions.
///
/// Implementations never fail: malformed input yields an empty or partial
/// list. Output must be deterministic for identical input.
pub trait FunctionExtractor: Send + Sync {
    /// Functions in source order.
    fn extract(&self, source: &str) -> Vec<ExtractedFunction>;
}
