//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async functions in production code use `tokio::fs`,
//! `tokio::net` and async `reqwest`. Blocking calls are tolerated in plain
//! functions (config loading before sessions start, stdout writes).

use std::fs;

use architectural_enforcement::{
    code_part, is_in_async_function, production_files, production_lines, Violation,
};

/// Patterns forbidden everywhere in production code
const ALWAYS_FORBIDDEN: &[(&str, &str)] = &[
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::net::", "Blocking network I/O"),
];

/// Patterns forbidden inside async functions
const FORBIDDEN_IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::process::Command", "Blocking process I/O"),
];

#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();

    for path in production_files() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let lines = production_lines(&content);

        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            let mut hit = ALWAYS_FORBIDDEN
                .iter()
                .find(|(pattern, _)| code.contains(pattern));
            if hit.is_none() && is_in_async_function(&lines, idx) {
                hit = FORBIDDEN_IN_ASYNC
                    .iter()
                    .find(|(pattern, _)| code.contains(pattern));
            }
            if let Some((_, rule)) = hit {
                violations.push(Violation {
                    path: path.clone(),
                    line: idx + 1,
                    rule: *rule,
                    source: line.trim().to_string(),
                });
            }
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O: tokio::fs, tokio::net, reqwest async client");
        panic!(
            "Found {} blocking I/O violation(s) in production code",
            violations.len()
        );
    }
}
