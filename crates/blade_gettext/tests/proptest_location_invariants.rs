//! Property-based invariants for reference-comment rewriting.
//!
//! 1. Sorting location blocks is idempotent.
//! 2. Sorting only permutes lines inside blocks; the multiset of lines and
//!    every non-reference line position are preserved.
//! 3. References to paths that were never compiled are only relativized.
//! 4. Compiled references always resolve to their template, without leading
//!    or doubled separators.

use std::path::Path;

use blade_gettext::compiler::CompiledMapping;
use blade_gettext::locations::{remap_references, rewrite_document, sort_location_blocks};
use proptest::prelude::*;

const ROOT: &str = "/srv/app";

// ── Strategies ────────────────────────────────────────────────────────────

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn relative_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(segment(), 1..4), segment())
        .prop_map(|(dirs, stem)| format!("{}/{stem}.php", dirs.join("/")))
}

fn reference_line() -> impl Strategy<Value = String> {
    (relative_path(), 1u32..500).prop_map(|(path, line)| format!("#: {path}:{line}"))
}

/// One catalog entry: optional extracted comment, references, msgid.
fn entry() -> impl Strategy<Value = String> {
    (
        prop::option::of("[A-Za-z ]{1,20}"),
        prop::collection::vec(reference_line(), 0..6),
        "[A-Za-z ]{1,20}",
    )
        .prop_map(|(comment, refs, msgid)| {
            let mut lines = Vec::new();
            if let Some(comment) = comment {
                lines.push(format!("#. TRANSLATORS: {comment}"));
            }
            lines.extend(refs);
            lines.push(format!("msgid \"{msgid}\""));
            lines.push("msgstr \"\"".to_string());
            lines.join("\n")
        })
}

fn document() -> impl Strategy<Value = String> {
    (prop::collection::vec(entry(), 0..8), any::<bool>()).prop_map(|(entries, trailing)| {
        let mut document = String::from("msgid \"\"\nmsgstr \"\"\n\n");
        document.push_str(&entries.join("\n\n"));
        if trailing {
            document.push('\n');
        }
        document
    })
}

fn mapping_for(sources: &[String]) -> CompiledMapping {
    let mut mapping = CompiledMapping::new();
    for (index, source) in sources.iter().enumerate() {
        mapping.insert(
            format!("{ROOT}/storage/gettext/{index:064x}.php"),
            format!("{ROOT}/resources/views/{source}"),
        );
    }
    mapping
}

// ═══════════════════════════════════════════════════════════════════════════
// 1–2. Sorting
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sorting_twice_equals_sorting_once(document in document()) {
        let once = sort_location_blocks(&document);
        let twice = sort_location_blocks(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sorting_only_permutes_reference_lines(document in document()) {
        let sorted = sort_location_blocks(&document);
        let before = document.split('\n').collect::<Vec<_>>();
        let after = sorted.split('\n').collect::<Vec<_>>();
        prop_assert_eq!(before.len(), after.len());

        for (old, new) in before.iter().zip(&after) {
            if !old.starts_with("#:") {
                prop_assert_eq!(old, new);
            } else {
                prop_assert!(new.starts_with("#:"));
            }
        }

        let mut before_sorted = before.clone();
        let mut after_sorted = after.clone();
        before_sorted.sort_unstable();
        after_sorted.sort_unstable();
        prop_assert_eq!(before_sorted, after_sorted);
    }

    #[test]
    fn every_block_is_ordered_after_sorting(document in document()) {
        let sorted = sort_location_blocks(&document);
        let lines = sorted.split('\n').collect::<Vec<_>>();
        for pair in lines.windows(2) {
            if pair[0].starts_with("#:") && pair[1].starts_with("#:") {
                prop_assert!(pair[0] <= pair[1], "{} > {}", pair[0], pair[1]);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// 3–4. Path remapping
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unknown_paths_are_only_relativized(path in relative_path(), line in 1u32..10_000) {
        let mapping = CompiledMapping::new();
        let absolute = format!("#: {ROOT}/{path}:{line}");
        let remapped = remap_references(&absolute, &mapping, Path::new(ROOT));
        prop_assert_eq!(remapped, format!("#: {path}:{line}"));

        let outside = format!("#: /opt/{path}:{line}");
        prop_assert_eq!(remap_references(&outside, &mapping, Path::new(ROOT)), outside);
    }

    #[test]
    fn compiled_paths_resolve_to_relative_sources(
        sources in prop::collection::vec(relative_path(), 1..6),
        line in 1u32..10_000,
    ) {
        let mapping = mapping_for(&sources);
        for (index, source) in sources.iter().enumerate() {
            let compiled = format!("#: {ROOT}/storage/gettext/{index:064x}.php:{line}");
            let remapped = remap_references(&compiled, &mapping, Path::new(ROOT));
            let expected = format!("#: resources/views/{source}:{line}");
            prop_assert_eq!(&remapped, &expected);

            let path = remapped.trim_start_matches("#: ");
            prop_assert!(!path.starts_with('/'));
            prop_assert!(!path.contains("//"));
        }
    }

    #[test]
    fn rewriting_is_stable_on_its_own_output(document in document()) {
        let mapping = mapping_for(&["a.php".to_string()]);
        let once = rewrite_document(&document, &mapping, Path::new(ROOT));
        let twice = rewrite_document(&once, &mapping, Path::new(ROOT));
        prop_assert_eq!(once, twice);
    }
}
