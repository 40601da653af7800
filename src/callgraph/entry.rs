//! Entry point selection.

use std::collections::HashSet;

use super::indexer::FunctionIndex;

/// Names never treated as entry points.
const EXCLUDED_NAMES: &[&str] = &[
    "__init__",
    "__str__",
    "__repr__",
    "__call__",
    "__enter__",
    "__exit__",
    "__iter__",
    "__next__",
    "__len__",
    "__getitem__",
    "__setitem__",
    "visit",
    "generic_visit",
    "constructor",
    "setup",
    "teardown",
    "configure",
];

/// Name prefixes never treated as entry points.
const EXCLUDED_PREFIXES: &[&str] = &["_", "visit_", "test_", "on_", "handle_"];

/// Likely entry points in discovery order.
///
/// A top-level `main` wins outright. Otherwise every top-level function that
/// nothing calls (by full or last-segment name) and that does not look like
/// a hook, test, or private helper.
pub fn detect_entry_points(index: &FunctionIndex) -> Vec<String> {
    if index.get("main").is_some_and(|f| !f.is_method()) {
        return vec!["main".to_string()];
    }

    let mut called: HashSet<&str> = HashSet::new();
    for record in index.iter() {
        for call in &record.calls {
            called.insert(call.as_str());
            if let Some((_, last)) = call.rsplit_once('.') {
                called.insert(last);
            }
        }
    }

    index
        .iter()
        .filter(|f| !f.is_method())
        .filter(|f| {
            !called.contains(f.simple_name.as_str()) && !called.contains(f.qualified_name.as_str())
        })
        .filter(|f| !EXCLUDED_NAMES.contains(&f.simple_name.as_str()))
        .filter(|f| !EXCLUDED_PREFIXES.iter().any(|p| f.simple_name.starts_with(p)))
        .map(|f| f.qualified_name.clone())
        .collect()
}

/// Entry points for a user-supplied name: an exact qualified-name match,
/// else the first function whose qualified name contains `requested`.
pub fn select_entry_point(index: &FunctionIndex, requested: &str) -> Option<String> {
    if index.contains(requested) {
        return Some(requested.to_string());
    }
    index
        .iter()
        .find(|f| f.qualified_name.contains(requested))
        .map(|f| f.qualified_name.clone())
}
