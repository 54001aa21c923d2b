//! Integration Test: Panic Prohibition
//!
//! **Policy**: Library code in chatv2-core MUST propagate errors. A panic in a
//! stream task would surface as a lost reply instead of an error callback.

use architectural_enforcement::{code_part, production_lines, rust_files, violation};

const PANICKING: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unreachable!(", "todo!("];

#[test]
fn test_no_panics_in_core_library() {
    let mut violations = Vec::new();

    for path in rust_files("chatv2/core/src") {
        let lines = production_lines(&path);
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if PANICKING.iter().any(|p| code.contains(p)) {
                violations.push(violation(&path, idx + 1, "Panicking call", line));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Panicking calls found in chatv2-core!\n");
        for v in &violations {
            eprintln!("  ❌ {}", v);
        }
        eprintln!("\n✅ Return a Result and use `?`, or a total fallback (unwrap_or, unwrap_or_default)");

        panic!(
            "\nFound {} panicking call(s) in library code.\nFix these before merging!",
            violations.len()
        );
    }
}
