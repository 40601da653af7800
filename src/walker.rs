//! File collection.
//!
//! Uses the `ignore` crate's walker with its own ignore handling switched
//! off; exclusion is decided by an [`IgnoreMatcher`] so the rules behave
//! the same whether or not the tree is a git checkout. Ignored directories
//! are pruned before descent.

use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::extension_of;
use crate::matcher::IgnoreMatcher;

/// Directory names probed, in priority order, when no input directory is given.
pub const COMMON_SOURCE_DIRS: &[&str] = &[
    "src",
    "lib",
    "app",
    "source",
    "code",
    "pkg",
    "packages",
    "modules",
    "core",
    "internal",
    "cmd",
    "backend",
    "frontend",
    "server",
    "client",
    "api",
    "services",
    "components",
];

/// Errors that can occur during collection.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A file selected for inclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub absolute_path: PathBuf,
    /// Path relative to the collection root.
    pub relative_path: PathBuf,
    pub size_bytes: u64,
}

impl FileRecord {
    /// Build a record for `path`, stat-ing it for its size (0 if unavailable).
    pub fn new(path: &Path, root: &Path) -> Self {
        let absolute_path = absolute(path);
        let relative_path = absolute_path
            .strip_prefix(absolute(root))
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or(path.as_os_str())));
        let size_bytes = std::fs::metadata(&absolute_path)
            .map(|m| m.len())
            .unwrap_or(0);
        Self {
            absolute_path,
            relative_path,
            size_bytes,
        }
    }
}

/// Options for [`collect`].
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Allowed extensions, lowercase without the dot. Empty allows all.
    pub extensions: Vec<String>,
    /// Glob patterns tested against both the relative path and the file name.
    pub exclude: Vec<String>,
    /// Maximum depth; files directly in the root are at depth 1.
    pub max_depth: Option<usize>,
}

impl CollectOptions {
    /// Restrict to these extensions. Leading dots and case are normalized.
    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Collect every non-ignored file under `root`, sorted by absolute path.
///
/// # Examples
///
/// ```no_run
/// use codesynth::matcher::IgnoreMatcher;
/// use codesynth::walker::{collect, CollectOptions};
/// use std::path::Path;
///
/// let matcher = IgnoreMatcher::discover(Path::new("."), ".gitignore").unwrap();
/// let options = CollectOptions::default().extensions(["rs", "toml"]);
/// for file in collect(Path::new("."), &matcher, &options).unwrap() {
///     println!("{}", file.relative_path.display());
/// }
/// ```
pub fn collect(
    root: &Path,
    matcher: &IgnoreMatcher,
    options: &CollectOptions,
) -> Result<Vec<FileRecord>, WalkError> {
    if !root.exists() {
        return Err(WalkError::NotFound {
            path: root.to_path_buf(),
        });
    }
    if !root.is_dir() {
        return Err(WalkError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let excludes = options
        .exclude
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| WalkError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let root = absolute(root);
    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .max_depth(options.max_depth)
        .sort_by_file_name(|a, b| a.cmp(b));

    let prune_root = root.clone();
    let prune_matcher = matcher.clone();
    builder.filter_entry(move |entry| {
        if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
            return true;
        }
        match entry.path().strip_prefix(&prune_root) {
            Ok(rel) => !prune_matcher.should_ignore(rel, true),
            Err(_) => true,
        }
    });

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(&root) else {
            continue;
        };
        if matcher.should_ignore(rel, false) {
            continue;
        }

        if !options.extensions.is_empty() {
            let ext = extension_of(rel).unwrap_or_default();
            if !options.extensions.contains(&ext) {
                continue;
            }
        }

        if is_excluded(rel, &excludes) {
            debug!(path = %rel.display(), "excluded by pattern");
            continue;
        }

        files.push(FileRecord {
            absolute_path: entry.path().to_path_buf(),
            relative_path: rel.to_path_buf(),
            size_bytes: entry.metadata().map(|m| m.len()).unwrap_or(0),
        });
    }

    files.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
    files.dedup_by(|a, b| a.absolute_path == b.absolute_path);
    debug!(root = %root.display(), count = files.len(), "collected files");
    Ok(files)
}

fn is_excluded(rel: &Path, excludes: &[Pattern]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let rel_text = rel.to_string_lossy();
    let name = rel
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    excludes
        .iter()
        .any(|p| p.matches(&rel_text) || p.matches(&name))
}

/// Common source directories that exist directly under `base`.
pub fn detect_source_directories(base: &Path) -> Vec<PathBuf> {
    COMMON_SOURCE_DIRS
        .iter()
        .map(|name| base.join(name))
        .filter(|dir| dir.is_dir())
        .collect()
}

/// Resolve explicitly named files against `root`.
///
/// Returns the records for names that exist as files and, separately,
/// the names that could not be found.
pub fn resolve_files(root: &Path, names: &[String]) -> (Vec<FileRecord>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for name in names {
        let candidate = Path::new(name);
        let path = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            root.join(candidate)
        };
        if path.is_file() {
            found.push(FileRecord::new(&path, root));
        } else {
            missing.push(name.clone());
        }
    }

    found.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
    found.dedup_by(|a, b| a.absolute_path == b.absolute_path);
    (found, missing)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
