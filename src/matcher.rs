//! Gitignore-compatible path filtering.
//!
//! An [`IgnoreMatcher`] is built once per scan root. It locates the nearest
//! ignore file by searching upward from the root, prepends the built-in
//! directory exclusions, and then answers [`IgnoreMatcher::should_ignore`]
//! for candidate paths relative to the scan root. Rules are evaluated in
//! order and the last matching rule decides, so a negated user rule can
//! re-include something a default excluded.

use std::fs;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use thiserror::Error;
use tracing::debug;

/// Directories excluded before any user rule is consulted.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".bzr",
    "__pycache__",
    "node_modules",
    ".venv",
    "venv",
    ".env",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
];

/// Default ignore file name.
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// `*` and `?` may cross `/` (fnmatch behaviour), used for single segments.
const SEGMENT_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// `*` and `?` stop at `/`, used when matching a whole relative path.
const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Errors raised while building a matcher.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to read ignore file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single parsed ignore rule.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    /// Glob text with the `!`, leading `/` and trailing `/` markers removed.
    pub pattern: String,
    /// Rule ended with `/`: only directories match it.
    pub dir_only: bool,
    /// Rule started with `!`: a match re-includes the path.
    pub negated: bool,
    /// Rule started with `/`: matches only relative to the ignore file's directory.
    pub anchored: bool,
    glob: Pattern,
}

impl IgnorePattern {
    /// Parse one line of an ignore file. Blank lines and comments yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut entry = line.trim();
        if entry.is_empty() || entry.starts_with('#') {
            return None;
        }

        if let Some(rest) = entry.strip_prefix("\\!") {
            return Self::build(&format!("!{rest}"), false);
        }

        let mut negated = false;
        if let Some(rest) = entry.strip_prefix('!') {
            negated = true;
            entry = rest;
        }

        Self::build(entry, negated)
    }

    fn build(entry: &str, negated: bool) -> Option<Self> {
        let anchored = entry.starts_with('/');
        let entry = entry.trim_start_matches('/');

        let dir_only = entry.ends_with('/');
        let entry = entry.trim_end_matches('/');

        if entry.is_empty() {
            return None;
        }

        Some(Self {
            pattern: entry.to_string(),
            dir_only,
            negated,
            anchored,
            glob: compile(entry),
        })
    }

    /// A built-in unanchored directory exclusion.
    pub fn directory(name: &str) -> Self {
        Self {
            pattern: name.to_string(),
            dir_only: true,
            negated: false,
            anchored: false,
            glob: compile(name),
        }
    }

    /// Whether this rule matches `segments` (the path relative to the scan
    /// root). `anchor` holds the scan root's segments relative to the
    /// directory the rule was defined in.
    fn matches(&self, segments: &[&str], anchor: &[String], is_dir: bool) -> bool {
        let Some(name) = segments.last() else {
            return false;
        };

        if self.anchored {
            let full = join_anchored(anchor, segments);
            if self.dir_only {
                // The directory itself, or any file or directory beneath it.
                let upto = if is_dir { full.len() } else { full.len() - 1 };
                return (1..=upto).any(|n| self.glob.matches_with(&full[..n].join("/"), PATH_MATCH));
            }
            return self.glob.matches_with(&full.join("/"), PATH_MATCH);
        }

        if self.dir_only {
            let dirs = if is_dir {
                segments
            } else {
                &segments[..segments.len() - 1]
            };
            return dirs.iter().any(|s| self.glob.matches_with(s, SEGMENT_MATCH));
        }

        if self.glob.matches_with(name, SEGMENT_MATCH) {
            return true;
        }
        if self.pattern.contains('/') {
            let full = join_anchored(anchor, segments).join("/");
            if self.glob.matches_with(&full, PATH_MATCH) {
                return true;
            }
        }
        segments.iter().any(|s| self.glob.matches_with(s, SEGMENT_MATCH))
    }
}

/// Patterns that fail to compile as globs are matched literally.
fn compile(text: &str) -> Pattern {
    Pattern::new(text)
        .or_else(|_| Pattern::new(&Pattern::escape(text)))
        .unwrap_or_default()
}

fn join_anchored<'a>(anchor: &'a [String], segments: &[&'a str]) -> Vec<&'a str> {
    anchor
        .iter()
        .map(String::as_str)
        .chain(segments.iter().copied())
        .collect()
}

/// Ordered ignore rules for one scan root.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    patterns: Vec<IgnorePattern>,
    default_count: usize,
    ignore_file: Option<PathBuf>,
    anchor: Vec<String>,
}

impl IgnoreMatcher {
    /// Matcher holding only the built-in directory exclusions.
    pub fn defaults_only() -> Self {
        let patterns: Vec<IgnorePattern> = DEFAULT_IGNORE_DIRS
            .iter()
            .map(|d| IgnorePattern::directory(d))
            .collect();
        Self {
            default_count: patterns.len(),
            patterns,
            ignore_file: None,
            anchor: Vec::new(),
        }
    }

    /// Build a matcher from in-memory ignore-file lines, anchored at the scan root.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut matcher = Self::defaults_only();
        matcher
            .patterns
            .extend(lines.into_iter().filter_map(IgnorePattern::parse));
        matcher
    }

    /// Search `scan_root` and its ancestors for `file_name` and build a matcher
    /// from the first one found. Without one, only the defaults apply.
    pub fn discover(scan_root: &Path, file_name: &str) -> Result<Self, MatcherError> {
        let root = absolute(scan_root);

        let Some(path) = root
            .ancestors()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
        else {
            debug!(root = %root.display(), "no ignore file found, using defaults");
            return Ok(Self::defaults_only());
        };

        let bytes = fs::read(&path).map_err(|source| MatcherError::Read {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);

        let mut matcher = Self::from_lines(text.lines());
        matcher.anchor = path
            .parent()
            .and_then(|dir| root.strip_prefix(dir).ok())
            .map(normal_segments)
            .unwrap_or_default();

        debug!(
            file = %path.display(),
            rules = matcher.user_pattern_count(),
            "loaded ignore file"
        );
        matcher.ignore_file = Some(path);
        Ok(matcher)
    }

    /// Decide whether `path` (relative to the scan root) is excluded.
    pub fn should_ignore(&self, path: &Path, is_dir: bool) -> bool {
        let owned = normal_segments(path);
        let segments: Vec<&str> = owned.iter().map(String::as_str).collect();
        if segments.is_empty() {
            return false;
        }

        let mut ignored = false;
        for (i, pattern) in self.patterns.iter().enumerate() {
            // Built-in rules are not subject to anchoring.
            let anchor: &[String] = if i < self.default_count {
                &[]
            } else {
                &self.anchor
            };
            if pattern.matches(&segments, anchor, is_dir) {
                ignored = !pattern.negated;
            }
        }
        ignored
    }

    /// The ignore file in use, if one was found.
    pub fn ignore_file(&self) -> Option<&Path> {
        self.ignore_file.as_deref()
    }

    /// Number of rules that came from the ignore file.
    pub fn user_pattern_count(&self) -> usize {
        self.patterns.len() - self.default_count
    }
}

impl Default for IgnoreMatcher {
    fn default() -> Self {
        Self::defaults_only()
    }
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
