//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! across the chatv2 crates:
//! - No sleep() calls in production code
//! - No blocking I/O inside async functions
//! - No unwrap()/expect() outside tests
//!
//! The helpers below do line-based scanning. They are deliberately simple and
//! rely on one layout convention: a file's `#[cfg(test)]` module comes last.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees checked by every rule, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["chatv2/core/src", "chatv2/cli/src"];

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// All `.rs` files under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let path = workspace_root().join(dir);
    if !path.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect()
}

/// Lines of `path` up to its `#[cfg(test)]` module
pub fn production_lines(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    production_part(&content)
}

/// Lines of `content` up to its `#[cfg(test)]` module
pub fn production_part(content: &str) -> Vec<String> {
    content
        .lines()
        .take_while(|line| !line.trim().starts_with("#[cfg(test)]"))
        .map(str::to_string)
        .collect()
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether `line` opens a function, and if so whether it is async
///
/// Visibility and `const`/`unsafe` qualifiers are skipped.
pub fn fn_signature(line: &str) -> Option<bool> {
    let mut rest = line.trim();
    for prefix in ["pub(crate) ", "pub(super) ", "pub ", "const ", "unsafe "] {
        if let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
        }
    }
    if rest.starts_with("async fn ") {
        Some(true)
    } else if rest.starts_with("fn ") {
        Some(false)
    } else {
        None
    }
}

/// Check if line is inside an async function
pub fn is_in_async_function(lines: &[String], current_idx: usize) -> bool {
    for i in (0..=current_idx).rev() {
        let line = lines[i].trim();

        if let Some(is_async) = fn_signature(line) {
            return is_async;
        }

        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Format a violation the same way for every rule
pub fn violation(path: &Path, line_number: usize, kind: &str, line: &str) -> String {
    let shown = path
        .strip_prefix(workspace_root())
        .unwrap_or(path)
        .display()
        .to_string();
    format!("{}:{} - {}: {}", shown, line_number, kind, line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(code: &[&str]) -> Vec<String> {
        code.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fn_signature() {
        assert_eq!(fn_signature("    pub async fn send(&self) {"), Some(true));
        assert_eq!(fn_signature("fn load() -> Result<()> {"), Some(false));
        assert_eq!(fn_signature("pub(crate) fn helper() {"), Some(false));
        assert_eq!(fn_signature("let f = async move {"), None);
    }

    #[test]
    fn test_async_function_detection() {
        let code = lines(&[
            "impl Client {",
            "    pub async fn fetch(&self) {",
            "        let contents = std::fs::read_to_string(\"file.txt\")?;",
            "    }",
            "    fn load() {",
            "        let contents = std::fs::read_to_string(\"config.toml\")?;",
            "    }",
            "}",
        ]);

        assert!(is_in_async_function(&code, 2));
        assert!(!is_in_async_function(&code, 5));
    }

    #[test]
    fn test_production_part_stops_at_test_module() {
        let content = "fn a() {}\n\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        let part = production_part(content);
        assert_eq!(part, vec!["fn a() {}".to_string(), String::new()]);
    }

    #[test]
    fn test_code_part_drops_comments() {
        assert_eq!(code_part("//! doc with .unwrap()"), "");
        assert_eq!(code_part("let x = 1; // trailing"), "let x = 1; ");
    }
}
