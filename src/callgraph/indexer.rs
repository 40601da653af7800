//! Source discovery and function indexing.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use tracing::debug;

use super::calls::{class_names, extract_calls, CallList};
use super::python::{PythonParser, SyntaxItem};
use super::CallGraphError;

/// Directory names never descended into. Hidden entries are skipped as well.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "__pycache__",
    ".venv",
    "venv",
    ".env",
    "env",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "dist",
    "build",
];

/// A function or method definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    /// `Class.method` for methods, the bare name otherwise.
    pub qualified_name: String,
    pub simple_name: String,
    pub file: PathBuf,
    pub line: usize,
    pub owner_class: Option<String>,
    pub calls: CallList,
}

impl FunctionRecord {
    pub fn is_method(&self) -> bool {
        self.owner_class.is_some()
    }

    /// `file.py:line`, used in rendered trees.
    pub fn location(&self) -> String {
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{name}:{}", self.line)
    }
}

/// Functions keyed by qualified name, iterated in discovery order.
///
/// Re-inserting a name replaces the record but keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct FunctionIndex {
    records: Vec<FunctionRecord>,
    positions: HashMap<String, usize>,
}

impl FunctionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: FunctionRecord) {
        match self.positions.get(&record.qualified_name) {
            Some(&idx) => self.records[idx] = record,
            None => {
                self.positions
                    .insert(record.qualified_name.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, qualified_name: &str) -> Option<&FunctionRecord> {
        self.positions
            .get(qualified_name)
            .map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.positions.contains_key(qualified_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<FunctionRecord> for FunctionIndex {
    fn from_iter<I: IntoIterator<Item = FunctionRecord>>(iter: I) -> Self {
        let mut index = Self::new();
        for record in iter {
            index.insert(record);
        }
        index
    }
}

fn is_python(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("py"))
}

/// Python files under `root` (or `root` itself when it is a `.py` file), sorted.
pub fn collect_sources(root: &Path) -> Result<Vec<PathBuf>, CallGraphError> {
    if !root.exists() {
        return Err(CallGraphError::NotFound {
            path: root.to_path_buf(),
        });
    }
    if root.is_file() {
        return Ok(if is_python(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(true)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            entry.depth() == 0
                || !EXCLUDED_DIRS
                    .iter()
                    .any(|name| entry.file_name() == *name)
        });

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_python(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Where a definition sits while walking a module.
#[derive(Clone, Copy)]
struct Scope<'a> {
    /// Set only for items directly inside a class body.
    class: Option<&'a str>,
}

/// Parse every file and index the functions it defines. Files that cannot
/// be read, are not UTF-8, or fail to parse are skipped.
pub fn index_sources(files: &[PathBuf], parser: &mut PythonParser) -> (FunctionIndex, Vec<PathBuf>) {
    let mut index = FunctionIndex::new();
    let mut skipped = Vec::new();

    for path in files {
        let source = match fs::read(path).map(String::from_utf8) {
            Ok(Ok(source)) => source,
            Ok(Err(_)) => {
                debug!(path = %path.display(), "skipping non-UTF-8 file");
                skipped.push(path.clone());
                continue;
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping unreadable file");
                skipped.push(path.clone());
                continue;
            }
        };

        match parser.parse(&source) {
            Ok(items) => index_module(&items, path, &mut index),
            Err(failure) => {
                debug!(path = %path.display(), %failure, "skipping unparsable file");
                skipped.push(path.clone());
            }
        }
    }

    debug!(
        functions = index.len(),
        files = files.len(),
        skipped = skipped.len(),
        "indexed sources"
    );
    (index, skipped)
}

/// Index the definitions of one parsed module.
pub fn index_module(items: &[SyntaxItem], path: &Path, index: &mut FunctionIndex) {
    let classes = class_names(items);
    index_items(items, Scope { class: None }, path, &classes, index);
}

fn index_items(
    items: &[SyntaxItem],
    scope: Scope<'_>,
    path: &Path,
    classes: &HashSet<String>,
    index: &mut FunctionIndex,
) {
    for item in items {
        match item {
            SyntaxItem::Class { name, body, .. } => {
                index_items(body, Scope { class: Some(name) }, path, classes, index);
            }
            SyntaxItem::Function { name, line, body } => {
                let qualified_name = match scope.class {
                    Some(class) => format!("{class}.{name}"),
                    None => name.clone(),
                };
                index.insert(FunctionRecord {
                    qualified_name,
                    simple_name: name.clone(),
                    file: path.to_path_buf(),
                    line: *line,
                    owner_class: scope.class.map(str::to_string),
                    calls: extract_calls(body, classes),
                });
                index_items(body, Scope { class: None }, path, classes, index);
            }
            SyntaxItem::Call { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn index_code(code: &str) -> FunctionIndex {
        let items = PythonParser::new().unwrap().parse(code).unwrap();
        let mut index = FunctionIndex::new();
        index_module(&items, Path::new("app.py"), &mut index);
        index
    }

    #[test]
    fn test_methods_are_qualified() {
        let index = index_code(
            r#"
class Service:
    def __init__(self):
        self.repo = Repo()

    def run(self):
        self.step()

def main():
    Service().run()
"#,
        );

        let names: Vec<_> = index.iter().map(|r| r.qualified_name.as_str()).collect();
        assert_eq!(names, ["Service.__init__", "Service.run", "main"]);

        let init = index.get("Service.__init__").unwrap();
        assert!(init.is_method());
        assert_eq!(init.owner_class.as_deref(), Some("Service"));
        assert_eq!(init.calls.as_slice(), ["Repo"]);

        let main = index.get("main").unwrap();
        assert!(!main.is_method());
        assert_eq!(main.line, 9);
        assert_eq!(main.location(), "app.py:9");
        assert_eq!(main.calls.as_slice(), ["run", "Service", "Service.__init__"]);
    }

    #[test]
    fn test_nested_functions_use_simple_name() {
        let index = index_code(
            r#"
class Job:
    def execute(self):
        def retry():
            backoff()
        retry()

def outer():
    def retry():
        pass
"#,
        );

        let names: Vec<_> = index.iter().map(|r| r.qualified_name.as_str()).collect();
        assert_eq!(names, ["Job.execute", "retry", "outer"]);

        // The later definition replaces the earlier one in place.
        let retry = index.get("retry").unwrap();
        assert_eq!(retry.line, 9);
        assert!(retry.calls.is_empty());
        assert!(!retry.is_method());

        assert_eq!(index.get("Job.execute").unwrap().calls.as_slice(), ["retry"]);
    }

    #[test]
    fn test_collect_sources_skips_hidden_and_excluded() {
        let dir = TempDir::new().unwrap();
        for rel in [
            "pkg/b.py",
            "pkg/a.py",
            "main.py",
            "notes.txt",
            ".hidden/x.py",
            "venv/lib/site.py",
            "build/gen.py",
            "pkg/__pycache__/a.py",
        ] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }

        let files = collect_sources(dir.path()).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, ["main.py", "pkg/a.py", "pkg/b.py"]);
    }

    #[test]
    fn test_collect_sources_single_file() {
        let dir = TempDir::new().unwrap();
        let py = dir.path().join("tool.py");
        let txt = dir.path().join("tool.txt");
        fs::write(&py, "").unwrap();
        fs::write(&txt, "").unwrap();

        assert_eq!(collect_sources(&py).unwrap(), [py.clone()]);
        assert!(collect_sources(&txt).unwrap().is_empty());
        assert!(matches!(
            collect_sources(&dir.path().join("missing")),
            Err(CallGraphError::NotFound { .. })
        ));
    }

    #[test]
    fn test_index_sources_skips_broken_files() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.py");
        let bad = dir.path().join("bad.py");
        let latin = dir.path().join("latin.py");
        fs::write(&good, "def ok():\n    pass\n").unwrap();
        fs::write(&bad, "def broken(:\n").unwrap();
        fs::write(&latin, b"# caf\xe9\ndef f():\n    pass\n").unwrap();

        let mut parser = PythonParser::new().unwrap();
        let (index, skipped) = index_sources(&[bad.clone(), good, latin.clone()], &mut parser);

        assert_eq!(index.len(), 1);
        assert!(index.contains("ok"));
        assert_eq!(skipped, [bad, latin]);
    }
}
