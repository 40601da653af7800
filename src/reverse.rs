//! Rebuild a source tree from a generated markdown document.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::document::NO_EOL_MARKER;

const FILE_HEADER: &str = "## File: ";
const SKIPPED_STATUS: &str = "**Status:** Skipped";

/// Errors from reconstruction. Problems inside the document are warnings,
/// not errors.
#[derive(Debug, Error)]
pub enum ReverseError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One file section recovered from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub path: String,
    pub content: String,
    /// The section carried a skipped status; its content is not recoverable.
    pub skipped: bool,
    /// The closing fence was never found; content runs to end of input.
    pub unterminated: bool,
}

/// Result of [`parse`].
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    pub files: Vec<ParsedFile>,
    pub warnings: Vec<String>,
}

/// Counters reported after [`reconstruct`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReverseStats {
    pub total_files: usize,
    pub written_files: usize,
    pub skipped_files: usize,
    pub warnings: Vec<String>,
}

/// Path named by a `## File:` heading, with any trailing size annotation removed.
fn header_path(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(FILE_HEADER)?;
    let path = match rest.rfind(" (") {
        Some(idx) if rest.ends_with(')') && !rest[idx + 2..rest.len() - 1].contains(')') => {
            &rest[..idx]
        }
        _ => rest,
    };
    (!path.is_empty()).then_some(path)
}

/// Opening fence: the run of backticks and whether the content lacks a final newline.
enum Fence<'a> {
    Open { marker: &'a str, no_eol: bool },
    /// Starts with backticks, but too few of them.
    Short,
    None,
}

fn parse_fence(line: &str) -> Fence<'_> {
    let ticks = line.len() - line.trim_start_matches('`').len();
    if ticks == 0 {
        return Fence::None;
    }
    if ticks < 3 {
        return Fence::Short;
    }
    let info = &line[ticks..];
    Fence::Open {
        marker: &line[..ticks],
        no_eol: info.split_whitespace().any(|w| w == NO_EOL_MARKER),
    }
}

/// Extract file sections from a generated document.
pub fn parse(text: &str) -> ParsedDocument {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut doc = ParsedDocument::default();
    let mut i = 0;

    let skip_blank = |i: &mut usize| {
        while *i < lines.len() && lines[*i].trim().is_empty() {
            *i += 1;
        }
    };

    while i < lines.len() {
        let Some(path) = header_path(lines[i].trim()) else {
            i += 1;
            continue;
        };
        i += 1;
        skip_blank(&mut i);

        let mut skipped = false;
        if i < lines.len() && lines[i].trim().starts_with(SKIPPED_STATUS) {
            skipped = true;
            i += 1;
            skip_blank(&mut i);
        }

        if i >= lines.len() {
            doc.warnings.push(format!("Missing code fence for {path}"));
            break;
        }

        let (marker, no_eol) = match parse_fence(lines[i].trim()) {
            Fence::Open { marker, no_eol } => (marker, no_eol),
            Fence::Short => {
                doc.warnings.push(format!("Invalid code fence for {path}"));
                i += 1;
                continue;
            }
            // Leave the line in place; it may be the next heading.
            Fence::None => {
                doc.warnings.push(format!("Missing code fence for {path}"));
                continue;
            }
        };
        i += 1;

        let mut content = String::new();
        let mut unterminated = true;
        while i < lines.len() {
            let line = lines[i];
            i += 1;
            if line.trim() == marker {
                unterminated = false;
                break;
            }
            content.push_str(line);
        }

        if unterminated {
            doc.warnings.push(format!("Unterminated code fence for {path}"));
        } else if no_eol && content.ends_with('\n') {
            content.pop();
        }

        if skipped {
            content.clear();
        }

        doc.files.push(ParsedFile {
            path: path.to_string(),
            content,
            skipped,
            unterminated,
        });
    }

    debug!(
        files = doc.files.len(),
        warnings = doc.warnings.len(),
        "parsed document"
    );
    doc
}

/// Join `rel` onto `base`, refusing anything that would resolve to `base`
/// itself or escape it. Resolution is lexical.
pub fn safe_join(base: &Path, rel: &str) -> Option<PathBuf> {
    let base = std::path::absolute(base).ok()?;
    let mut target = base.clone();

    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !target.pop() || !target.starts_with(&base) {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    (target != base && target.starts_with(&base)).then_some(target)
}

/// Write every non-skipped file in `doc` beneath `output_dir`.
pub fn reconstruct(doc: &ParsedDocument, output_dir: &Path) -> Result<ReverseStats, ReverseError> {
    let mut stats = ReverseStats {
        total_files: doc.files.len(),
        warnings: doc.warnings.clone(),
        ..Default::default()
    };

    fs::create_dir_all(output_dir).map_err(|source| ReverseError::Write {
        path: output_dir.to_path_buf(),
        source,
    })?;

    for entry in &doc.files {
        if entry.skipped {
            stats.skipped_files += 1;
            continue;
        }

        let Some(target) = safe_join(output_dir, &entry.path) else {
            stats.skipped_files += 1;
            stats.warnings.push(format!("Unsafe path skipped: {}", entry.path));
            continue;
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ReverseError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, &entry.content).map_err(|source| ReverseError::Write {
            path: target.clone(),
            source,
        })?;
        debug!(path = %target.display(), "wrote file");
        stats.written_files += 1;
    }

    info!(
        written = stats.written_files,
        skipped = stats.skipped_files,
        "reconstruction finished"
    );
    Ok(stats)
}

/// Read the document at `input` and reconstruct it into `output_dir`.
pub fn reverse_file(input: &Path, output_dir: &Path) -> Result<ReverseStats, ReverseError> {
    let text = fs::read_to_string(input).map_err(|source| ReverseError::Read {
        path: input.to_path_buf(),
        source,
    })?;
    reconstruct(&parse(&text), output_dir)
}
