//! Line-oriented function detection for C-family source.
//!
//! Declarations are recognized by regular expressions, one per line, and
//! closed by counting braces. Braces inside strings and comments are
//! counted too. Line-range history queries are calibrated to these ranges,
//! so the behavior is kept as-is rather than made grammar-aware.

use std::sync::LazyLock;

use regex::Regex;

use crate::{ExtractedFunction, FunctionExtractor};

/// Captured names that are control flow, not declarations.
const RESERVED: [&str; 6] = ["if", "for", "while", "switch", "catch", "constructor"];

/// Declaration shapes in priority order. Group 1 is the name, group 2 the
/// parameter list.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // function name(params)
        r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z0-9_]+)\s*\(([^)]*)\)",
        // const name = (params) =>
        r"^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z0-9_]+)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*=>",
        // name(params) {
        r"^\s*(?:async\s+)?([A-Za-z0-9_]+)\s*\(([^)]*)\)\s*\{",
        // public name(params): Type {
        r"^\s*(?:public|private|protected|static|async)?\s*([A-Za-z0-9_]+)\s*\(([^)]*)\)\s*(?::\s*[A-Za-z0-9_]+)?\s*\{",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid declaration pattern"))
    .collect()
});

/// Regex and brace-counting extractor.
///
/// # Examples
///
/// ```
/// use histograph_extract::{FunctionExtractor, HeuristicExtractor};
///
/// let source = "export const add = (a: number, b: number) => {\n  return a + b;\n};\n";
/// let functions = HeuristicExtractor::default().extract(source);
/// assert_eq!(functions.len(), 1);
/// assert_eq!(functions[0].name, "add");
/// assert_eq!(functions[0].parameters, vec!["a", "b"]);
/// assert_eq!((functions[0].start_line, functions[0].end_line), (1, 3));
/// ```
#[derive(Debug, Clone)]
pub struct HeuristicExtractor {
    lookahead: usize,
}

impl HeuristicExtractor {
    /// Lines scanned by default, counting the declaration line.
    pub const DEFAULT_LOOKAHEAD: usize = 100;

    /// Extractor that scans at most `lookahead` lines per declaration.
    /// Zero is treated as one.
    pub fn new(lookahead: usize) -> Self {
        Self {
            lookahead: lookahead.max(1),
        }
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LOOKAHEAD)
    }
}

impl FunctionExtractor for HeuristicExtractor {
    fn extract(&self, source: &str) -> Vec<ExtractedFunction> {
        let lines: Vec<&str> = source.split('\n').collect();
        let mut functions = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some((name, params)) = match_declaration(line) else {
                continue;
            };
            let (end, balanced) = find_end(&lines, i, self.lookahead);
            functions.push(ExtractedFunction {
                name: name.to_string(),
                start_line: i + 1,
                end_line: end + 1,
                parameters: parse_parameters(params),
                balanced,
            });
        }

        functions
    }
}

/// First pattern whose captured name is not reserved.
fn match_declaration(line: &str) -> Option<(&str, &str)> {
    PATTERNS.iter().find_map(|re| {
        let caps = re.captures(line)?;
        let name = caps.get(1)?.as_str();
        if RESERVED.contains(&name) {
            return None;
        }
        let params = caps.get(2).map_or("", |m| m.as_str());
        Some((name, params))
    })
}

/// Zero-based end line and whether the braces balanced inside the window.
fn find_end(lines: &[&str], start: usize, lookahead: usize) -> (usize, bool) {
    let stop = (start + lookahead).min(lines.len());
    let mut depth: i64 = 0;
    let mut opened = false;

    for (j, line) in lines.iter().enumerate().take(stop).skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth == 0 {
            return (j, true);
        }
    }

    (stop.saturating_sub(1).max(start), false)
}

/// Bare parameter names: type annotations after `:` dropped, empties removed.
fn parse_parameters(params: &str) -> Vec<String> {
    params
        .split(',')
        .map(|p| p.trim().split(':').next().unwrap_or("").trim())
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
