//! Static call graphs for Python projects.
//!
//! A run indexes every function and method under a root, picks entry points,
//! and walks resolved calls depth-first from them:
//!
//! ```no_run
//! use codesynth::callgraph::{build_call_graph, BuildOptions};
//!
//! let graph = build_call_graph("./project".as_ref(), &BuildOptions::default()).unwrap();
//! println!("{} edges", graph.edges.len());
//! ```

pub mod calls;
pub mod entry;
pub mod indexer;
pub mod python;
pub mod render;
pub mod resolver;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

pub use indexer::{FunctionIndex, FunctionRecord};
pub use render::{render_markdown, RenderOptions};

use python::PythonParser;

/// Errors that stop a call graph from being built at all.
#[derive(Debug, thiserror::Error)]
pub enum CallGraphError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to load Python grammar: {0}")]
    Parser(String),
}

/// Traversal settings.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// User-chosen entry point, matched exactly or by substring.
    pub entry: Option<String>,
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entry: None,
            max_depth: 10,
        }
    }
}

impl BuildOptions {
    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Result of one indexing and traversal run. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    pub root: PathBuf,
    pub functions: FunctionIndex,
    pub entry_points: Vec<String>,
    /// `(caller, callee)` in traversal order, duplicates kept.
    pub edges: Vec<(String, String)>,
    pub unresolved: BTreeSet<String>,
    /// Files excluded because they could not be read or parsed.
    pub skipped_files: Vec<PathBuf>,
    pub source_files: usize,
}

/// Counts reported after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub root: String,
    pub source_files: usize,
    pub skipped_files: usize,
    pub functions: usize,
    pub entry_points: Vec<String>,
    pub edges: usize,
    pub unresolved_calls: usize,
}

impl CallGraph {
    pub fn summary(&self) -> GraphSummary {
        GraphSummary {
            root: self.root.display().to_string(),
            source_files: self.source_files,
            skipped_files: self.skipped_files.len(),
            functions: self.functions.len(),
            entry_points: self.entry_points.clone(),
            edges: self.edges.len(),
            unresolved_calls: self.unresolved.len(),
        }
    }

    pub fn has_entry_points(&self) -> bool {
        !self.entry_points.is_empty()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Index `root` (a directory or a single `.py` file) and traverse from the
/// selected entry points.
///
/// An empty `entry_points` in the result means nothing qualified; callers
/// report that instead of guessing.
pub fn build_call_graph(root: &Path, options: &BuildOptions) -> Result<CallGraph, CallGraphError> {
    let root = absolute(root);
    let sources = indexer::collect_sources(&root)?;
    debug!(root = %root.display(), files = sources.len(), "collected Python sources");

    let mut parser = PythonParser::new()?;
    let (functions, skipped_files) = indexer::index_sources(&sources, &mut parser);

    let entry_points = match &options.entry {
        Some(requested) => entry::select_entry_point(&functions, requested)
            .into_iter()
            .collect(),
        None => entry::detect_entry_points(&functions),
    };

    let traversal = resolver::traverse(&functions, &entry_points, options.max_depth);
    info!(
        functions = functions.len(),
        entry_points = entry_points.len(),
        edges = traversal.edges.len(),
        unresolved = traversal.unresolved.len(),
        "built call graph"
    );

    Ok(CallGraph {
        root,
        functions,
        entry_points,
        edges: traversal.edges,
        unresolved: traversal.unresolved,
        skipped_files,
        source_files: sources.len(),
    })
}
