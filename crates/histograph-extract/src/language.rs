use std::path::Path;

/// Display name for a file extension; unknown extensions are upper-cased.
///
/// # Examples
///
/// ```
/// use histograph_extract::language_for_extension;
///
/// assert_eq!(language_for_extension("tsx"), "TypeScript (TSX)");
/// assert_eq!(language_for_extension("RS"), "Rust");
/// assert_eq!(language_for_extension("toml"), "TOML");
/// ```
pub fn language_for_extension(extension: &str) -> String {
    let name = match extension.to_ascii_lowercase().as_str() {
        "js" => "JavaScript",
        "jsx" => "JavaScript (JSX)",
        "ts" => "TypeScript",
        "tsx" => "TypeScript (TSX)",
        "vue" => "Vue",
        "py" => "Python",
        "rb" => "Ruby",
        "java" => "Java",
        "cpp" => "C++",
        "c" => "C",
        "go" => "Go",
        "rs" => "Rust",
        "php" => "PHP",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "cs" => "C#",
        "html" => "HTML",
        "css" => "CSS",
        "scss" => "SCSS",
        "less" => "LESS",
        "json" => "JSON",
        "yaml" | "yml" => "YAML",
        "md" => "Markdown",
        "sh" => "Shell",
        "bash" => "Bash",
        _ => return extension.to_uppercase(),
    };
    name.to_string()
}

/// Extension of a repository path without the dot, empty when there is none.
///
/// Dotfiles such as `.gitignore` have no extension.
///
/// # Examples
///
/// ```
/// use histograph_extract::extension_of;
///
/// assert_eq!(extension_of("src/app.test.ts"), "ts");
/// assert_eq!(extension_of(".gitignore"), "");
/// assert_eq!(extension_of("Makefile"), "");
/// ```
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Last path component, used as a node label.
pub fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(language_for_extension("js"), "JavaScript");
        assert_eq!(language_for_extension("jsx"), "JavaScript (JSX)");
        assert_eq!(language_for_extension("yml"), "YAML");
        assert_eq!(language_for_extension("cs"), "C#");
    }

    #[test]
    fn unknown_and_empty_extensions() {
        assert_eq!(language_for_extension("lock"), "LOCK");
        assert_eq!(language_for_extension(""), "");
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name_of("src/lib/util.ts"), "util.ts");
        assert_eq!(file_name_of("README.md"), "README.md");
    }
}
