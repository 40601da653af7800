//! Call resolution and reachability traversal.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::indexer::FunctionIndex;

/// Receiver prefix for calls on the current instance.
const SELF_PREFIX: &str = "self.";

/// Maps raw call names to indexed functions without type information.
pub struct CallResolver<'a> {
    index: &'a FunctionIndex,
    /// Method name to every `Class.method` defining it.
    methods: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> CallResolver<'a> {
    pub fn new(index: &'a FunctionIndex) -> Self {
        let mut methods: HashMap<&str, Vec<&str>> = HashMap::new();
        for record in index.iter() {
            let name = record.qualified_name.as_str();
            if let Some((_, method)) = name.split_once('.') {
                if !method.contains('.') {
                    methods.entry(method).or_default().push(name);
                }
            }
        }
        Self { index, methods }
    }

    /// Resolve `call` made from `caller`, whose enclosing class is `class`.
    ///
    /// Rules, first match wins:
    /// 1. the name is indexed as-is;
    /// 2. `self.m` inside a class resolves to `Class.m` or nothing;
    /// 3. a dotted name resolves by its last segment when exactly one
    ///    `Class.segment` remains after dropping the caller and, inside a
    ///    class, preferring other classes;
    /// 4. a plain name resolves to a top-level function of that name.
    pub fn resolve(&self, call: &str, class: Option<&str>, caller: &str) -> Option<&'a str> {
        if let Some(record) = self.index.get(call) {
            return Some(record.qualified_name.as_str());
        }

        if let (Some(method), Some(class)) = (call.strip_prefix(SELF_PREFIX), class) {
            let qualified = format!("{class}.{method}");
            return self
                .index
                .get(&qualified)
                .map(|r| r.qualified_name.as_str());
        }

        if let Some((_, method)) = call.rsplit_once('.') {
            let mut candidates: Vec<&'a str> = self
                .methods
                .get(method)
                .map(|names| names.iter().copied().filter(|&c| c != caller).collect())
                .unwrap_or_default();

            if let Some(class) = class {
                let own = format!("{class}.");
                let others: Vec<&'a str> = candidates
                    .iter()
                    .copied()
                    .filter(|c| !c.starts_with(&own))
                    .collect();
                if !others.is_empty() {
                    candidates = others;
                }
            }

            return match candidates.as_slice() {
                [only] => Some(*only),
                _ => None,
            };
        }

        self.index
            .get(call)
            .filter(|r| !r.is_method())
            .map(|r| r.qualified_name.as_str())
    }
}

/// Edges and unresolved calls reachable from the entry points.
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub edges: Vec<(String, String)>,
    pub unresolved: BTreeSet<String>,
}

/// Depth-first walk from each entry point. Each function is expanded at most
/// once; a function reached at depth `max_depth` is not expanded.
pub fn traverse(index: &FunctionIndex, entry_points: &[String], max_depth: usize) -> Traversal {
    let resolver = CallResolver::new(index);
    let mut walk = Walk {
        index,
        resolver: &resolver,
        max_depth,
        visited: HashSet::new(),
        out: Traversal::default(),
    };
    for entry in entry_points {
        walk.visit(entry, 0);
    }
    walk.out
}

struct Walk<'a, 'r> {
    index: &'a FunctionIndex,
    resolver: &'r CallResolver<'a>,
    max_depth: usize,
    visited: HashSet<&'a str>,
    out: Traversal,
}

impl<'a> Walk<'a, '_> {
    fn visit(&mut self, name: &str, depth: usize) {
        if depth >= self.max_depth {
            return;
        }
        let Some(record) = self.index.get(name) else {
            return;
        };
        if !self.visited.insert(record.qualified_name.as_str()) {
            return;
        }

        for call in &record.calls {
            match self
                .resolver
                .resolve(call, record.owner_class.as_deref(), &record.qualified_name)
            {
                Some(callee) => {
                    self.out
                        .edges
                        .push((record.qualified_name.clone(), callee.to_string()));
                    self.visit(callee, depth + 1);
                }
                None => {
                    self.out.unresolved.insert(call.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::indexer::FunctionRecord;
    use std::path::PathBuf;

    fn func(name: &str, calls: &[&str]) -> FunctionRecord {
        let (owner, simple) = match name.split_once('.') {
            Some((class, method)) => (Some(class.to_string()), method.to_string()),
            None => (None, name.to_string()),
        };
        FunctionRecord {
            qualified_name: name.into(),
            simple_name: simple,
            file: PathBuf::from("mod.py"),
            line: 1,
            owner_class: owner,
            calls: calls.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn index(records: Vec<FunctionRecord>) -> FunctionIndex {
        records.into_iter().collect()
    }

    fn edges(t: &Traversal) -> Vec<(&str, &str)> {
        t.edges.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect()
    }

    #[test]
    fn test_exact_and_self_resolution() {
        let idx = index(vec![
            func("Repo.save", &[]),
            func("Repo.flush", &["self.save", "self.missing"]),
            func("helper", &[]),
        ]);
        let r = CallResolver::new(&idx);

        assert_eq!(r.resolve("helper", None, "main"), Some("helper"));
        assert_eq!(r.resolve("Repo.save", None, "main"), Some("Repo.save"));
        assert_eq!(r.resolve("self.save", Some("Repo"), "Repo.flush"), Some("Repo.save"));
        assert_eq!(r.resolve("self.missing", Some("Repo"), "Repo.flush"), None);
        assert_eq!(r.resolve("print", None, "main"), None);
    }

    #[test]
    fn test_ambiguous_method_stays_unresolved() {
        let idx = index(vec![
            func("PersonRepository.create", &[]),
            func("ZoneRepository.create", &[]),
            func("Cache.evict", &[]),
        ]);
        let r = CallResolver::new(&idx);

        assert_eq!(r.resolve("obj.create", None, "main"), None);
        assert_eq!(r.resolve("cache.evict", None, "main"), Some("Cache.evict"));
    }

    #[test]
    fn test_dotted_call_prefers_other_class_and_skips_caller() {
        let idx = index(vec![
            func("Parser.parse", &["lexer.parse"]),
            func("Lexer.parse", &[]),
            func("Node.visit", &["child.visit"]),
        ]);
        let r = CallResolver::new(&idx);

        assert_eq!(
            r.resolve("lexer.parse", Some("Parser"), "Parser.parse"),
            Some("Lexer.parse")
        );
        // The only candidate is the caller itself.
        assert_eq!(r.resolve("child.visit", Some("Node"), "Node.visit"), None);
    }

    #[test]
    fn test_dotted_call_falls_back_to_own_class() {
        let idx = index(vec![
            func("Node.render", &["child.draw"]),
            func("Node.draw", &[]),
        ]);
        let r = CallResolver::new(&idx);

        assert_eq!(
            r.resolve("child.draw", Some("Node"), "Node.render"),
            Some("Node.draw")
        );
    }

    #[test]
    fn test_plain_name_never_matches_method() {
        let idx = index(vec![func("Job.run", &[])]);
        let r = CallResolver::new(&idx);
        assert_eq!(r.resolve("run", None, "main"), None);
    }

    #[test]
    fn test_depth_limit() {
        let idx = index(vec![func("f", &["g"]), func("g", &["h"]), func("h", &[])]);

        let t = traverse(&idx, &["f".to_string()], 1);
        assert_eq!(edges(&t), [("f", "g")]);

        let t = traverse(&idx, &["f".to_string()], 10);
        assert_eq!(edges(&t), [("f", "g"), ("g", "h")]);
    }

    #[test]
    fn test_recursion_and_unresolved() {
        let idx = index(vec![
            func("main", &["walk", "print", "walk"]),
            func("walk", &["walk", "os.listdir"]),
        ]);

        let t = traverse(&idx, &["main".to_string()], 10);
        assert_eq!(
            edges(&t),
            [("main", "walk"), ("walk", "walk"), ("main", "walk")]
        );
        assert_eq!(
            t.unresolved.iter().map(String::as_str).collect::<Vec<_>>(),
            ["os.listdir", "print"]
        );
    }
}
