//! Call extraction from a function body.

use std::collections::HashSet;

use smallvec::SmallVec;

use super::python::SyntaxItem;

/// Call targets of one function, in order.
pub type CallList = SmallVec<[String; 8]>;

/// Method name that constructor calls are mapped to.
pub const CONSTRUCTOR: &str = "__init__";

/// Raw call targets in `body`, followed by a `Class.__init__` entry for
/// every call whose target is exactly a name in `class_names`.
///
/// Calls inside nested function or class definitions belong to those
/// definitions and are not included.
pub fn extract_calls(body: &[SyntaxItem], class_names: &HashSet<String>) -> CallList {
    let mut calls = CallList::new();
    for item in body {
        if let SyntaxItem::Call {
            target: Some(target),
        } = item
        {
            calls.push(target.clone());
        }
    }

    let constructors: Vec<String> = calls
        .iter()
        .filter(|target| class_names.contains(target.as_str()))
        .map(|class| format!("{class}.{CONSTRUCTOR}"))
        .collect();
    calls.extend(constructors);
    calls
}

/// Names of every class defined anywhere in `items`.
pub fn class_names(items: &[SyntaxItem]) -> HashSet<String> {
    let mut names = HashSet::new();
    collect_class_names(items, &mut names);
    names
}

fn collect_class_names(items: &[SyntaxItem], names: &mut HashSet<String>) {
    for item in items {
        match item {
            SyntaxItem::Class { name, body, .. } => {
                names.insert(name.clone());
                collect_class_names(body, names);
            }
            SyntaxItem::Function { body, .. } => collect_class_names(body, names),
            SyntaxItem::Call { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(target: &str) -> SyntaxItem {
        SyntaxItem::Call {
            target: Some(target.into()),
        }
    }

    #[test]
    fn test_constructor_calls_follow_raw_calls() {
        let body = vec![call("Parser"), call("helper"), call("Parser"), call("mod.Parser")];
        let classes: HashSet<String> = ["Parser".to_string()].into();

        let calls = extract_calls(&body, &classes);
        assert_eq!(
            calls.as_slice(),
            ["Parser", "helper", "Parser", "mod.Parser", "Parser.__init__", "Parser.__init__"]
        );
    }

    #[test]
    fn test_nested_definitions_excluded() {
        let body = vec![
            call("a"),
            SyntaxItem::Function {
                name: "inner".into(),
                line: 3,
                body: vec![call("hidden")],
            },
            SyntaxItem::Call { target: None },
            call("b"),
        ];
        let calls = extract_calls(&body, &HashSet::new());
        assert_eq!(calls.as_slice(), ["a", "b"]);
    }

    #[test]
    fn test_class_names_found_at_any_depth() {
        let items = vec![
            SyntaxItem::Class {
                name: "Outer".into(),
                line: 1,
                body: vec![SyntaxItem::Class {
                    name: "Inner".into(),
                    line: 2,
                    body: vec![],
                }],
            },
            SyntaxItem::Function {
                name: "factory".into(),
                line: 5,
                body: vec![SyntaxItem::Class {
                    name: "Local".into(),
                    line: 6,
                    body: vec![],
                }],
            },
        ];
        let names = class_names(&items);
        assert_eq!(names.len(), 3);
        assert!(names.contains("Local"));
    }
}
