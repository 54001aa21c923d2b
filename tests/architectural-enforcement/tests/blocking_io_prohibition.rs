//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async functions in the chatv2 crates MUST NOT use blocking I/O.
//! **Required**: Use `tokio::fs`, `tokio::io`, and async `reqwest`.
//!
//! Blocking calls in plain functions are acceptable (config loading happens
//! before any stream starts).

use architectural_enforcement::{
    code_part, is_in_async_function, production_lines, rust_files, violation, PRODUCTION_DIRS,
};

const FORBIDDEN: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("reqwest::blocking", "Blocking HTTP client"),
    ("std::io::stdin()", "Blocking stdin"),
    ("std::io::stdout()", "Blocking stdout"),
];

/// Test that async production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_async_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_files(dir) {
            let lines = production_lines(&path);
            for (idx, line) in lines.iter().enumerate() {
                let code = code_part(line);

                // reqwest::blocking is never acceptable, async or not
                if code.contains("reqwest::blocking") {
                    violations.push(violation(&path, idx + 1, "Blocking HTTP client", line));
                    continue;
                }

                if !is_in_async_function(&lines, idx) {
                    continue;
                }

                for (pattern, kind) in FORBIDDEN {
                    if code.contains(pattern) {
                        violations.push(violation(&path, idx + 1, kind, line));
                    }
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in async code!\n");
        for v in &violations {
            eprintln!("  ❌ {}", v);
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - tokio::fs::read().await");
        eprintln!("  - tokio::io::stdout() with AsyncWriteExt");
        eprintln!("  - reqwest::Client (async)");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
