//! Call graph output: an indented call tree, a Mermaid flowchart, and the
//! markdown document that wraps them.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::CallGraph;
use crate::tree::{BRANCH, LAST_BRANCH, SPACE, VERTICAL};

/// Entry points shown when none of them has outgoing edges.
const FALLBACK_ENTRIES: usize = 5;

/// Labels longer than this are abbreviated to `first...last`.
const MAX_LABEL: usize = 30;

/// Options for [`render_markdown`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub with_mermaid: bool,
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            with_mermaid: false,
            max_depth: 10,
            max_nodes: 50,
        }
    }
}

/// Callees per caller, deduplicated, in first-seen order.
fn adjacency(graph: &CallGraph) -> HashMap<&str, Vec<&str>> {
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    for (src, dst) in &graph.edges {
        let callees = adj.entry(src.as_str()).or_default();
        if !callees.contains(&dst.as_str()) {
            callees.push(dst.as_str());
        }
    }
    adj
}

struct TreeWriter<'g> {
    graph: &'g CallGraph,
    adj: HashMap<&'g str, Vec<&'g str>>,
    max_depth: usize,
    lines: Vec<String>,
}

impl<'g> TreeWriter<'g> {
    fn label(&self, name: &str) -> String {
        match self.graph.functions.get(name) {
            Some(record) => format!("{name} ({})", record.location()),
            None => name.to_string(),
        }
    }

    fn sorted_children(&self, name: &str) -> Vec<&'g str> {
        let mut children = self.adj.get(name).cloned().unwrap_or_default();
        children.sort_unstable();
        children
    }

    /// `path` holds the ancestors of `node`; each branch gets its own copy.
    fn node(&mut self, node: &'g str, prefix: &str, is_last: bool, path: HashSet<&'g str>, depth: usize) {
        let branch = if is_last { LAST_BRANCH } else { BRANCH };

        if path.contains(node) {
            let location = self
                .graph
                .functions
                .get(node)
                .map(|r| format!(" ({})", r.location()))
                .unwrap_or_default();
            self.lines
                .push(format!("{prefix}{branch}{node} (recursive){location}"));
            return;
        }

        let label = self.label(node);
        self.lines.push(format!("{prefix}{branch}{label}"));

        let child_prefix = format!("{prefix}{}", if is_last { SPACE } else { VERTICAL });
        let children = self.sorted_children(node);

        if depth >= self.max_depth {
            if !children.is_empty() {
                self.lines.push(format!("{child_prefix}{LAST_BRANCH}..."));
            }
            return;
        }

        let mut path = path;
        path.insert(node);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.node(child, &child_prefix, i == count - 1, path.clone(), depth + 1);
        }
    }
}

/// Indented call tree rooted at the entry points.
pub fn format_tree(graph: &CallGraph, max_depth: usize) -> String {
    let adj = adjacency(graph);

    let mut shown: Vec<&str> = graph
        .entry_points
        .iter()
        .map(String::as_str)
        .filter(|e| adj.get(e).is_some_and(|c| !c.is_empty()))
        .collect();
    if shown.is_empty() {
        shown = graph
            .entry_points
            .iter()
            .take(FALLBACK_ENTRIES)
            .map(String::as_str)
            .collect();
    }
    shown.sort_unstable();

    let mut writer = TreeWriter {
        graph,
        adj,
        max_depth,
        lines: Vec::new(),
    };

    let mut blocks = Vec::new();
    for entry in shown {
        let children = writer.sorted_children(entry);

        writer.lines.clear();
        let label = writer.label(entry);
        writer.lines.push(label);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            writer.node(child, "", i == count - 1, HashSet::from([entry]), 1);
        }
        blocks.push(writer.lines.join("\n"));
    }

    blocks.join("\n\n")
}

fn safe_id(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

fn node_label(name: &str) -> String {
    if name.chars().count() > MAX_LABEL {
        if let (Some((first, _)), Some((_, last))) = (name.split_once('.'), name.rsplit_once('.')) {
            return format!("{first}...{last}");
        }
    }
    name.to_string()
}

/// Mermaid flowchart of the call edges, capped at `max_nodes`.
///
/// Over the cap, only entry points and their direct callees are drawn.
pub fn format_mermaid(graph: &CallGraph, max_nodes: usize) -> String {
    let mut lines: Vec<String> = ["```mermaid", "---", "config:", "  layout: elk", "---", "flowchart TD"]
        .into_iter()
        .map(String::from)
        .collect();

    let mut nodes: BTreeSet<&str> = graph
        .edges
        .iter()
        .flat_map(|(src, dst)| [src.as_str(), dst.as_str()])
        .collect();

    if nodes.len() > max_nodes {
        let entries: HashSet<&str> = graph.entry_points.iter().map(String::as_str).collect();
        nodes = entries.iter().copied().collect();
        for (src, dst) in &graph.edges {
            if entries.contains(src.as_str()) {
                nodes.insert(dst.as_str());
            }
        }
    }

    let entries_shown: Vec<&str> = graph
        .entry_points
        .iter()
        .map(String::as_str)
        .filter(|e| nodes.contains(e))
        .collect();

    lines.push(String::new());
    lines.push("    %% Entry points".into());
    for entry in &entries_shown {
        lines.push(format!(
            "    {}[\"{}\"]:::entry",
            safe_id(entry),
            node_label(entry)
        ));
    }

    lines.push(String::new());
    lines.push("    %% Functions".into());
    for name in nodes.iter().filter(|n| !entries_shown.contains(*n)) {
        lines.push(format!("    {}[\"{}\"]", safe_id(name), node_label(name)));
    }

    lines.push(String::new());
    lines.push("    %% Call relationships".into());
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (src, dst) in &graph.edges {
        let edge = (src.as_str(), dst.as_str());
        if nodes.contains(edge.0) && nodes.contains(edge.1) && seen.insert(edge) {
            lines.push(format!("    {} --> {}", safe_id(src), safe_id(dst)));
        }
    }

    lines.push(String::new());
    lines.push("    %% Styling".into());
    lines.push("    classDef entry fill:#4CAF50,stroke:#2E7D32,color:#fff".into());
    lines.push("```".into());

    lines.join("\n")
}

/// The complete markdown report.
pub fn render_markdown(graph: &CallGraph, options: &RenderOptions) -> String {
    let mut lines = vec![
        "# Call Graph".to_string(),
        String::new(),
        format!("**Source:** `{}`  ", graph.root.display()),
        format!("**Functions:** {}  ", graph.functions.len()),
        format!("**Entry Points:** {}  ", graph.entry_points.len()),
        format!("**Call Edges:** {}", graph.edges.len()),
        String::new(),
        "## Call Tree".to_string(),
        String::new(),
        "```".to_string(),
        format_tree(graph, options.max_depth),
        "```".to_string(),
        String::new(),
    ];

    if options.with_mermaid {
        lines.push("## Call Graph Diagram".into());
        lines.push(String::new());
        lines.push(format_mermaid(graph, options.max_nodes));
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::indexer::{FunctionIndex, FunctionRecord};
    use std::path::PathBuf;

    fn func(name: &str, line: usize) -> FunctionRecord {
        FunctionRecord {
            qualified_name: name.into(),
            simple_name: name.rsplit('.').next().unwrap_or(name).into(),
            file: PathBuf::from("src/app.py"),
            line,
            owner_class: name.split_once('.').map(|(c, _)| c.to_string()),
            calls: Default::default(),
        }
    }

    fn graph(names: &[&str], entries: &[&str], edges: &[(&str, &str)]) -> CallGraph {
        let functions: FunctionIndex = names
            .iter()
            .enumerate()
            .map(|(i, n)| func(n, i + 1))
            .collect();
        CallGraph {
            root: PathBuf::from("/project"),
            functions,
            entry_points: entries.iter().map(|e| e.to_string()).collect(),
            edges: edges
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tree_sorted_with_locations() {
        let g = graph(
            &["main", "load", "save", "parse"],
            &["main"],
            &[("main", "save"), ("main", "load"), ("load", "parse"), ("main", "load")],
        );
        let expected = "\
main (app.py:1)
├── load (app.py:2)
│   └── parse (app.py:4)
└── save (app.py:3)";
        assert_eq!(format_tree(&g, 10), expected);
    }

    #[test]
    fn test_tree_marks_recursion() {
        let g = graph(
            &["main", "walk"],
            &["main"],
            &[("main", "walk"), ("walk", "walk"), ("walk", "main")],
        );
        let expected = "\
main (app.py:1)
└── walk (app.py:2)
    ├── main (recursive) (app.py:1)
    └── walk (recursive) (app.py:2)";
        assert_eq!(format_tree(&g, 10), expected);
    }

    #[test]
    fn test_tree_depth_marker() {
        let g = graph(
            &["main", "a", "b", "c"],
            &["main"],
            &[("main", "a"), ("a", "b"), ("b", "c")],
        );
        let expected = "\
main (app.py:1)
└── a (app.py:2)
    └── b (app.py:3)
        └── ...";
        assert_eq!(format_tree(&g, 2), expected);
    }

    #[test]
    fn test_tree_without_edges_lists_entries() {
        let g = graph(&["load", "save"], &["save", "load"], &[]);
        assert_eq!(format_tree(&g, 10), "load (app.py:1)\n\nsave (app.py:2)");
    }

    #[test]
    fn test_mermaid() {
        let g = graph(
            &["main", "Repo.save"],
            &["main"],
            &[("main", "Repo.save"), ("main", "Repo.save")],
        );
        let out = format_mermaid(&g, 50);

        assert!(out.starts_with("```mermaid\n---\nconfig:\n  layout: elk\n---\nflowchart TD\n"));
        assert!(out.contains("    main[\"main\"]:::entry\n"));
        assert!(out.contains("    Repo_save[\"Repo.save\"]\n"));
        assert_eq!(out.matches("main --> Repo_save").count(), 1);
        assert!(out.ends_with("    classDef entry fill:#4CAF50,stroke:#2E7D32,color:#fff\n```"));
    }

    #[test]
    fn test_mermaid_caps_nodes() {
        let g = graph(
            &["main", "a", "b", "c"],
            &["main"],
            &[("main", "a"), ("a", "b"), ("b", "c")],
        );
        let out = format_mermaid(&g, 3);
        assert!(out.contains("main --> a"));
        assert!(!out.contains("a --> b"));
        assert!(!out.contains("    c[\"c\"]"));
    }

    #[test]
    fn test_long_labels_abbreviated() {
        assert_eq!(
            node_label("VeryLongServiceControllerName.handle_request"),
            "VeryLongServiceControllerName...handle_request"
        );
        assert_eq!(node_label("x".repeat(40).as_str()), "x".repeat(40));
        assert_eq!(safe_id("a.b-c"), "a_b_c");
    }

    #[test]
    fn test_markdown_document() {
        let g = graph(&["main", "run"], &["main"], &[("main", "run")]);
        let options = RenderOptions {
            with_mermaid: true,
            ..Default::default()
        };
        let out = render_markdown(&g, &options);

        assert!(out.starts_with(
            "# Call Graph\n\n**Source:** `/project`  \n**Functions:** 2  \n**Entry Points:** 1  \n**Call Edges:** 1\n\n## Call Tree\n\n```\nmain (app.py:1)\n└── run (app.py:2)\n```\n"
        ));
        assert!(out.contains("## Call Graph Diagram\n\n```mermaid"));
        assert!(out.ends_with("```\n"));
    }
}
