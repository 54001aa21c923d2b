//! Integration Test: Crate Lint Policy
//!
//! **Policy**: chatv2-core denies undocumented public items and clippy's
//! default lints at the crate root.

use architectural_enforcement::workspace_root;

const REQUIRED: &[&str] = &["#![deny(missing_docs)]", "#![deny(clippy::all)]"];

#[test]
fn test_core_crate_denies_missing_docs() {
    let lib = workspace_root().join("chatv2/core/src/lib.rs");
    let content = std::fs::read_to_string(&lib).expect("chatv2-core lib.rs is readable");
    let attributes: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("#!["))
        .collect();

    let missing: Vec<&&str> = REQUIRED
        .iter()
        .filter(|required| !attributes.contains(required))
        .collect();

    assert!(
        missing.is_empty(),
        "chatv2-core lib.rs is missing crate attributes {missing:?} (found {attributes:?})"
    );
}
