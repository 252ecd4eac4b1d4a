//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O, channels and timers, never on a
//! blocking sleep. `tokio::time::sleep` is allowed only where pacing output is
//! the behavior itself (audio upload).

use std::fs;

use architectural_enforcement::{code_part, production_files, production_lines, Violation};

/// Files where an async sleep paces outbound traffic
const PACING_FILES: &[&str] = &["pipeline/recognition.rs"];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for path in production_files() {
        let Ok(content) = fs::read_to_string(&path) else {
            continue;
        };
        let pacing_allowed = PACING_FILES
            .iter()
            .any(|allowed| path.to_string_lossy().ends_with(allowed));

        for (idx, line) in production_lines(&content).iter().enumerate() {
            let code = code_part(line);
            let rule = if code.contains("std::thread::sleep") || code.contains("thread::sleep(") {
                "Blocking sleep"
            } else if code.contains("time::sleep(") && !pacing_allowed {
                "Async sleep outside pacing code"
            } else {
                continue;
            };
            violations.push(Violation {
                path: path.clone(),
                line: idx + 1,
                rule,
                source: line.trim().to_string(),
            });
        }
    }

    if !violations.is_empty() {
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::time::interval, timeout or a channel instead");
        panic!("Found {} sleep violation(s) in production code", violations.len());
    }
}
