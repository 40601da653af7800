//! Python parsing using tree-sitter.
//!
//! The concrete syntax tree is lowered into [`SyntaxItem`]s: class and
//! function definitions with their nested items, and call expressions in
//! source order. Everything else is flattened away.

use tree_sitter::{Node, Parser};

use super::CallGraphError;

/// A definition or call expression found in Python source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxItem {
    Class {
        name: String,
        line: usize,
        body: Vec<SyntaxItem>,
    },
    Function {
        name: String,
        line: usize,
        body: Vec<SyntaxItem>,
    },
    /// `target` is `None` when the callee is not a name or attribute chain,
    /// for example `handlers[key]()` or `make()()`.
    Call { target: Option<String> },
}

/// Why a file produced no items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    NoTree,
    Syntax { line: usize },
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTree => f.write_str("parser returned no tree"),
            Self::Syntax { line } => write!(f, "syntax error near line {line}"),
        }
    }
}

/// A Python parser owned by one indexing run.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> Result<Self, CallGraphError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| CallGraphError::Parser(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Parse a module. Any syntax error rejects the whole file.
    pub fn parse(&mut self, source: &str) -> Result<Vec<SyntaxItem>, ParseFailure> {
        let tree = self.parser.parse(source, None).ok_or(ParseFailure::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            let line = first_error(root).map_or(1, |n| n.start_position().row + 1);
            return Err(ParseFailure::Syntax { line });
        }

        let mut items = Vec::new();
        lower_children(root, source, &mut items);
        Ok(items)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|c| c.has_error())
        .find_map(first_error);
    found
}

fn lower_children(node: Node, source: &str, out: &mut Vec<SyntaxItem>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        lower(child, source, out);
    }
}

fn lower(node: Node, source: &str, out: &mut Vec<SyntaxItem>) {
    match node.kind() {
        "class_definition" => {
            // Base-class expressions run in the enclosing scope.
            if let Some(bases) = node.child_by_field_name("superclasses") {
                lower(bases, source, out);
            }
            let mut body = Vec::new();
            if let Some(block) = node.child_by_field_name("body") {
                lower(block, source, &mut body);
            }
            if let Some(name) = field_text(node, "name", source) {
                out.push(SyntaxItem::Class {
                    name,
                    line: node.start_position().row + 1,
                    body,
                });
            }
        }
        "function_definition" => {
            let mut body = Vec::new();
            for field in ["parameters", "return_type", "body"] {
                if let Some(part) = node.child_by_field_name(field) {
                    lower(part, source, &mut body);
                }
            }
            if let Some(name) = field_text(node, "name", source) {
                out.push(SyntaxItem::Function {
                    name,
                    line: node.start_position().row + 1,
                    body,
                });
            }
        }
        "call" => {
            let target = node
                .child_by_field_name("function")
                .and_then(|callee| call_target(callee, source));
            out.push(SyntaxItem::Call { target });
            lower_children(node, source, out);
        }
        _ => lower_children(node, source, out),
    }
}

/// Name of a callee: `f` or a dotted attribute chain such as `a.b.c`.
/// When the chain's base is not a plain name, only the attribute part is kept.
fn call_target(callee: Node, source: &str) -> Option<String> {
    match callee.kind() {
        "identifier" => Some(node_text(callee, source).to_string()),
        "attribute" => {
            let mut parts = Vec::new();
            let mut current = callee;
            while current.kind() == "attribute" {
                parts.push(field_text(current, "attribute", source)?);
                current = current.child_by_field_name("object")?;
            }
            if current.kind() == "identifier" {
                parts.push(node_text(current, source).to_string());
            }
            parts.reverse();
            Some(parts.join("."))
        }
        _ => None,
    }
}

fn field_text(node: Node, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(n, source).to_string())
}

fn node_text<'s>(node: Node, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> Vec<SyntaxItem> {
        PythonParser::new().unwrap().parse(code).unwrap()
    }

    fn call(target: &str) -> SyntaxItem {
        SyntaxItem::Call {
            target: Some(target.to_string()),
        }
    }

    #[test]
    fn test_function_with_calls_in_order() {
        let items = parse("def run():\n    load(read(path))\n    self.save()\n");
        assert_eq!(
            items,
            [SyntaxItem::Function {
                name: "run".into(),
                line: 1,
                body: vec![call("load"), call("read"), call("self.save")],
            }]
        );
    }

    #[test]
    fn test_class_with_methods() {
        let code = r#"
class Store:
    def get(self):
        return self.db.fetch()

    async def put(self, item):
        await self.db.write(item)
"#;
        let items = parse(code);
        let SyntaxItem::Class { name, line, body } = &items[0] else {
            panic!("expected class, got {items:?}");
        };
        assert_eq!(name, "Store");
        assert_eq!(*line, 2);
        assert_eq!(body.len(), 2);
        assert!(matches!(&body[1], SyntaxItem::Function { name, line: 6, .. } if name == "put"));
    }

    #[test]
    fn test_decorated_function_keeps_def_line() {
        let items = parse("@app.route('/')\ndef index():\n    pass\n");
        assert_eq!(items[0], call("app.route"));
        assert!(matches!(&items[1], SyntaxItem::Function { name, line: 2, .. } if name == "index"));
    }

    #[test]
    fn test_nested_function_stays_nested() {
        let items = parse("def outer():\n    def inner():\n        helper()\n    inner()\n");
        let SyntaxItem::Function { body, .. } = &items[0] else {
            panic!("expected function");
        };
        assert!(matches!(&body[0], SyntaxItem::Function { name, .. } if name == "inner"));
        assert_eq!(body[1], call("inner"));
    }

    #[test]
    fn test_unnameable_callees() {
        let items = parse("handlers[key]()\nmake()()\nfoo().bar()\n");
        assert_eq!(
            items,
            [
                SyntaxItem::Call { target: None },
                SyntaxItem::Call { target: None },
                call("make"),
                call("bar"),
                call("foo"),
            ]
        );
    }

    #[test]
    fn test_receiver_chains() {
        let items = parse("def f():\n    a.b.c()\n    x.y().z()\n");
        assert_eq!(
            items,
            [SyntaxItem::Function {
                name: "f".into(),
                line: 1,
                body: vec![call("a.b.c"), call("z"), call("x.y")],
            }]
        );
    }

    #[test]
    fn test_syntax_error_rejects_file() {
        let mut parser = PythonParser::new().unwrap();
        let result = parser.parse("def broken(:\n    pass\n");
        assert!(matches!(result, Err(ParseFailure::Syntax { .. })));
    }
}
