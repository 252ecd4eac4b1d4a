//! Architectural Enforcement
//!
//! Source scanners shared by the integration tests in `tests/`:
//! - No thread sleeps, and async sleeps only where pacing is the point
//! - No blocking I/O inside async functions
//!
//! The scan is line based. It is meant to catch violations early, not to
//! parse Rust.

use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["stream/core/src", "stream/cli/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File the line was found in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule the line broke
    pub rule: &'static str,
    /// The trimmed source line
    pub source: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.source
        )
    }
}

/// Workspace root, derived from this package's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under the production directories
#[must_use]
pub fn production_files() -> Vec<PathBuf> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.exists())
        .flat_map(|dir| {
            walkdir::WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(walkdir::DirEntry::into_path)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Lines before the first `#[cfg(test)]`, which is where test modules start
#[must_use]
pub fn production_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .take_while(|line| line.trim() != "#[cfg(test)]")
        .collect()
}

/// Strip a trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Whether the closest enclosing `fn` above `idx` is async
#[must_use]
pub fn is_in_async_function(lines: &[&str], idx: usize) -> bool {
    for line in lines[..idx].iter().rev() {
        let line = line.trim();
        if line.contains("async fn ") {
            return true;
        }
        if line.starts_with("fn ") || line.contains(" fn ") {
            return false;
        }
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "pub async fn upload() {",
            "    let data = std::fs::read(\"audio.pcm\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));

        let code = vec![
            "pub fn load() {",
            "    let data = std::fs::read_to_string(\"config.toml\")?;",
            "}",
        ];
        assert!(!is_in_async_function(&code, 1));
    }

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() {}\n}\n";
        assert_eq!(production_lines(content), vec!["fn a() {}"]);
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // std::thread::sleep"), "let x = 1; ");
    }

    #[test]
    fn test_production_files_found() {
        let files = production_files();
        assert!(files.iter().any(|p| p.ends_with("lib.rs")));
        assert!(files.iter().any(|p| p.ends_with("main.rs")));
    }
}
