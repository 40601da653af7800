//! Directory tree rendering and size formatting.
//!
//! The tree is built from relative file paths rather than from a fresh
//! filesystem walk, so it shows exactly the files that were selected.

use std::cmp::Ordering;
use std::path::{Component, Path};

use thiserror::Error;

/// The type of a tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// A node in the file tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// File or directory name (not full path).
    pub name: String,
    pub kind: NodeKind,
    children: Vec<FileNode>,
}

impl FileNode {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    /// Build a tree named `root_name` from paths relative to that root.
    pub fn from_relative_paths<P: AsRef<Path>>(
        root_name: impl Into<String>,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        let mut root = Self::directory(root_name);
        for path in paths {
            let parts: Vec<String> = path
                .as_ref()
                .components()
                .filter_map(|c| match c {
                    Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                    Component::ParentDir => Some("..".to_string()),
                    _ => None,
                })
                .collect();
            root.insert(&parts);
        }
        root.sort_children();
        root
    }

    fn insert(&mut self, parts: &[String]) {
        match parts {
            [] => {}
            [name] => {
                if !self
                    .children
                    .iter()
                    .any(|c| c.kind == NodeKind::File && &c.name == name)
                {
                    self.children.push(Self::file(name.as_str()));
                }
            }
            [dir, rest @ ..] => {
                let idx = match self
                    .children
                    .iter()
                    .position(|c| c.is_directory() && &c.name == dir)
                {
                    Some(idx) => idx,
                    None => {
                        self.children.push(Self::directory(dir.as_str()));
                        self.children.len() - 1
                    }
                };
                self.children[idx].insert(rest);
            }
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    /// Sort children: directories first, then by name.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| match (&a.kind, &b.kind) {
            (NodeKind::Directory, NodeKind::File) => Ordering::Less,
            (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
            _ => a.name.cmp(&b.name),
        });

        for child in &mut self.children {
            child.sort_children();
        }
    }

    /// Count total files in this tree.
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            NodeKind::Directory => self.children.iter().map(|c| c.file_count()).sum(),
        }
    }
}

/// Box-drawing characters for tree rendering.
pub const BRANCH: &str = "├── ";
pub const LAST_BRANCH: &str = "└── ";
pub const VERTICAL: &str = "│   ";
pub const SPACE: &str = "    ";

/// Render a file tree with box-drawing characters, one node per line.
///
/// # Examples
///
/// ```
/// use codesynth::tree::{render_tree, FileNode};
///
/// let root = FileNode::from_relative_paths("project", ["src/main.rs", "README.md"]);
/// let output = render_tree(&root);
/// assert_eq!(output, "project/\n├── src/\n│   └── main.rs\n└── README.md");
/// ```
pub fn render_tree(root: &FileNode) -> String {
    let mut lines = Vec::with_capacity(root.file_count() + 1);
    lines.push(format!("{}/", root.name));
    render_children(&mut lines, root, "");
    lines.join("\n")
}

fn render_children(lines: &mut Vec<String>, node: &FileNode, prefix: &str) {
    let child_count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last = i == child_count - 1;
        let branch = if is_last { LAST_BRANCH } else { BRANCH };
        let suffix = if child.is_directory() { "/" } else { "" };
        lines.push(format!("{prefix}{branch}{}{suffix}", child.name));

        if child.is_directory() {
            let continuation = if is_last { SPACE } else { VERTICAL };
            render_children(lines, child, &format!("{prefix}{continuation}"));
        }
    }
}

/// Format a byte count for display: `512 B`, `1.5 KB`, `2.0 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64 / 1024.0;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}

/// Error from [`parse_size`].
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size: {0}")]
pub struct InvalidSize(pub String);

/// Parse a human-readable size such as `500KB`, `1.5 MB` or `2048`.
pub fn parse_size(text: &str) -> Result<u64, InvalidSize> {
    const UNITS: [(&str, u64); 4] = [
        ("GB", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("KB", 1024),
        ("B", 1),
    ];

    let normalized = text.trim().to_uppercase();
    let invalid = || InvalidSize(text.trim().to_string());

    for (unit, multiplier) in UNITS {
        if let Some(number) = normalized.strip_suffix(unit) {
            let value: f64 = number.trim().parse().map_err(|_| invalid())?;
            if !value.is_finite() || value < 0.0 {
                return Err(invalid());
            }
            return Ok((value * multiplier as f64) as u64);
        }
    }

    normalized.parse().map_err(|_| invalid())
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_relative_paths_sorts_directories_first() {
        let root = FileNode::from_relative_paths("proj", ["z.rs", "a_dir/x.rs", "a.rs"]);

        assert!(root.children()[0].is_directory());
        assert_eq!(root.children()[0].name, "a_dir");
        assert_eq!(root.children()[1].name, "a.rs");
        assert_eq!(root.children()[2].name, "z.rs");
        assert_eq!(root.file_count(), 3);
    }

    #[test]
    fn test_duplicate_paths_collapse() {
        let root = FileNode::from_relative_paths("proj", ["a.rs", "a.rs", "src/b.rs", "src/c.rs"]);
        assert_eq!(root.file_count(), 3);
        assert_eq!(root.children().len(), 2);
    }

    #[test]
    fn test_render_nested() {
        let root = FileNode::from_relative_paths(
            "project",
            ["src/lib.rs", "src/util/io.rs", "Cargo.toml", "tests/cli.rs"],
        );

        let expected = "\
project/
├── src/
│   ├── util/
│   │   └── io.rs
│   └── lib.rs
├── tests/
│   └── cli.rs
└── Cargo.toml";
        assert_eq!(render_tree(&root), expected);
    }

    #[test]
    fn test_render_empty() {
        let root = FileNode::from_relative_paths("empty", Vec::<&str>::new());
        assert_eq!(render_tree(&root), "empty/");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024 * 1024), "2.0 TB");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512"), Ok(512));
        assert_eq!(parse_size("100B"), Ok(100));
        assert_eq!(parse_size("1.5KB"), Ok(1536));
        assert_eq!(parse_size("2 MB"), Ok(2 * 1024 * 1024));
        assert_eq!(parse_size(" 1gb "), Ok(1024 * 1024 * 1024));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert_eq!(parse_size("lots"), Err(InvalidSize("lots".into())));
        assert!(parse_size("12XB").is_err());
        assert!(parse_size("-1KB").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
