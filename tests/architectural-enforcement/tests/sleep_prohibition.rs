//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the chatv2 crates MUST NOT call sleep methods.
//! Streams end on markers, body end, cancellation or an idle timeout, never on
//! a timer poll.

use architectural_enforcement::{code_part, production_lines, rust_files, violation, PRODUCTION_DIRS};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for dir in PRODUCTION_DIRS {
        for path in rust_files(dir) {
            let lines = production_lines(&path);
            for (idx, line) in lines.iter().enumerate() {
                let code = code_part(line);
                if code.contains("::sleep(") || code.contains(".sleep(") {
                    violations.push(violation(&path, idx + 1, "Sleep", line));
                }
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for v in &violations {
            eprintln!("  ❌ {}", v);
        }
        eprintln!("\n✅ Use instead:");
        eprintln!("  - tokio::time::timeout() around the awaited I/O");
        eprintln!("  - CancellationToken::cancelled() in a select!");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

#[test]
fn test_production_dirs_exist() {
    for dir in PRODUCTION_DIRS {
        assert!(
            !rust_files(dir).is_empty(),
            "{dir} has no Rust sources; the enforcement tests would silently pass"
        );
    }
}
