//! Markdown document generation.
//!
//! The layout is line-oriented so [`crate::reverse`] can parse it back:
//!
//! ````text
//! # Source Code Documentation
//! **Root Directory:** `...`
//! **Total Files:** N
//! ## Directory Structure        (optional)
//! ---
//! ## File: rel/path (size)      (size optional)
//! **Status:** Skipped (reason)  (skipped files only)
//! ```lang
//! ...content...
//! ```
//! ---
//! ````
//!
//! Fences are always longer than the longest backtick run in the text they
//! wrap. When a file does not end with a newline, the opening fence carries
//! a `noeol` marker after the language so the newline added before the
//! closing fence can be removed again.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::classify::{classify, language_for_path, BinaryReason, Classification};
use crate::tree::{format_size, render_tree, FileNode};
use crate::walker::FileRecord;

/// Info-string marker for content without a trailing newline.
pub const NO_EOL_MARKER: &str = "noeol";

/// Shortest fence ever emitted.
const MIN_FENCE: usize = 3;

/// Options for [`generate`].
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Files larger than this are replaced by a placeholder.
    pub max_file_size: Option<u64>,
    /// Embed files even when they look binary.
    pub include_binary: bool,
    pub show_tree: bool,
    /// Append the human-readable size to each file heading.
    pub show_size: bool,
    /// Files to draw in the tree instead of the embedded set.
    pub tree_files: Option<Vec<PathBuf>>,
    /// Directory the tree is drawn relative to instead of the document root.
    pub tree_root: Option<PathBuf>,
}

/// Why a file's content was not embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Oversized { size: u64, limit: u64 },
    Binary(BinaryReason),
    Unreadable(String),
    UnsupportedEncoding,
}

impl SkipReason {
    /// Text placed inside the fence in place of the content.
    pub fn placeholder(&self) -> String {
        match self {
            Self::Oversized { size, limit } => format!(
                "[File skipped: size {} exceeds limit {}]",
                format_size(*size),
                format_size(*limit)
            ),
            Self::Binary(reason) => format!("[Binary file: {reason}]"),
            Self::Unreadable(err) => format!("[Error reading file: {err}]"),
            Self::UnsupportedEncoding => "[Binary file or unsupported encoding]".to_string(),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oversized { limit, .. } => write!(f, "size exceeds {}", format_size(*limit)),
            Self::Binary(reason) => write!(f, "binary ({reason})"),
            Self::Unreadable(err) => write!(f, "read error: {err}"),
            Self::UnsupportedEncoding => f.write_str("unsupported encoding"),
        }
    }
}

/// Body of one file section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Content(String),
    Skipped(SkipReason),
}

/// One file in the generated document.
#[derive(Debug, Clone)]
pub struct FileSection {
    pub relative_path: String,
    pub size_bytes: u64,
    pub language: String,
    pub body: SectionBody,
}

impl FileSection {
    fn fenced_text(&self) -> String {
        match &self.body {
            SectionBody::Content(text) => text.clone(),
            SectionBody::Skipped(reason) => reason.placeholder(),
        }
    }
}

/// A document ready to render.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub root: PathBuf,
    pub tree: Option<String>,
    pub sections: Vec<FileSection>,
    pub show_size: bool,
}

impl GeneratedDocument {
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.sections.iter().map(|s| s.size_bytes as usize + 64).sum::<usize>() + 256,
        );

        out.push_str("# Source Code Documentation\n\n");
        out.push_str(&format!("**Root Directory:** `{}`\n\n", self.root.display()));
        out.push_str(&format!("**Total Files:** {}\n\n", self.sections.len()));

        if let Some(tree) = &self.tree {
            let fence = fence_for(tree);
            out.push_str("## Directory Structure\n\n");
            out.push_str(&format!("{fence}\n{tree}\n{fence}\n\n"));
        }

        out.push_str("---\n\n");

        for section in &self.sections {
            if self.show_size {
                out.push_str(&format!(
                    "## File: {} ({})\n\n",
                    section.relative_path,
                    format_size(section.size_bytes)
                ));
            } else {
                out.push_str(&format!("## File: {}\n\n", section.relative_path));
            }

            if let SectionBody::Skipped(reason) = &section.body {
                out.push_str(&format!("**Status:** Skipped ({reason})  \n\n"));
            }

            let text = section.fenced_text();
            let fence = fence_for(&text);
            out.push_str(&fence);
            out.push_str(&section.language);
            if !text.ends_with('\n') {
                out.push(' ');
                out.push_str(NO_EOL_MARKER);
                out.push('\n');
                out.push_str(&text);
                out.push('\n');
            } else {
                out.push('\n');
                out.push_str(&text);
            }
            out.push_str(&fence);
            out.push_str("\n\n---\n\n");
        }

        out
    }
}

/// Counters reported after generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub binary_files: usize,
    pub oversized_files: usize,
    pub total_size: u64,
    pub processed_size: u64,
    /// `(relative path, reason)` for every skipped file.
    pub skipped: Vec<(String, String)>,
}

/// Output of [`generate`].
#[derive(Debug, Clone)]
pub struct Generation {
    pub document: GeneratedDocument,
    pub text: String,
    pub stats: GenerationStats,
}

/// Build the markdown document for `files`, with headings relative to `root`.
pub fn generate(files: &[FileRecord], root: &Path, options: &GenerateOptions) -> Generation {
    let root = absolute(root);
    let mut stats = GenerationStats::default();

    let mut ordered: Vec<&FileRecord> = files.iter().collect();
    ordered.sort_by_cached_key(|f| relative_to(&f.absolute_path, &root));
    ordered.dedup_by(|a, b| a.absolute_path == b.absolute_path);

    let mut sections = Vec::with_capacity(ordered.len());
    for file in ordered {
        let relative_path = relative_to(&file.absolute_path, &root);
        stats.total_files += 1;
        stats.total_size += file.size_bytes;

        let body = match read_content(file, options) {
            Ok(text) => {
                stats.processed_files += 1;
                stats.processed_size += file.size_bytes;
                SectionBody::Content(text)
            }
            Err(reason) => {
                stats.skipped_files += 1;
                match &reason {
                    SkipReason::Binary(_) => stats.binary_files += 1,
                    SkipReason::Oversized { .. } => stats.oversized_files += 1,
                    SkipReason::Unreadable(_) => {
                        warn!(path = %relative_path, %reason, "could not read file")
                    }
                    SkipReason::UnsupportedEncoding => {}
                }
                debug!(path = %relative_path, %reason, "skipped");
                stats.skipped.push((relative_path.clone(), reason.to_string()));
                SectionBody::Skipped(reason)
            }
        };

        sections.push(FileSection {
            language: language_for_path(&file.absolute_path),
            relative_path,
            size_bytes: file.size_bytes,
            body,
        });
    }

    let tree = options.show_tree.then(|| {
        let base = options.tree_root.as_deref().map(absolute).unwrap_or_else(|| root.clone());
        let paths: Vec<String> = match &options.tree_files {
            Some(list) => list.iter().map(|p| relative_to(&absolute(p), &base)).collect(),
            None => files
                .iter()
                .map(|f| relative_to(&f.absolute_path, &base))
                .collect(),
        };
        render_tree(&FileNode::from_relative_paths(display_name(&base), paths))
    });

    let document = GeneratedDocument {
        root,
        tree,
        sections,
        show_size: options.show_size,
    };
    let text = document.render();
    Generation {
        document,
        text,
        stats,
    }
}

/// Read a file for embedding, or say why it was not embedded.
fn read_content(file: &FileRecord, options: &GenerateOptions) -> Result<String, SkipReason> {
    if let Some(limit) = options.max_file_size {
        if file.size_bytes > limit {
            return Err(SkipReason::Oversized {
                size: file.size_bytes,
                limit,
            });
        }
    }

    if !options.include_binary {
        match classify(&file.absolute_path) {
            Classification::Binary(reason) => return Err(SkipReason::Binary(reason)),
            unchecked @ Classification::Unreadable(_) => {
                debug!(
                    path = %file.absolute_path.display(),
                    reason = %unchecked.reason(),
                    "reading as text"
                );
            }
            Classification::Text => {}
        }
    }

    let bytes = fs::read(&file.absolute_path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    decode(bytes).ok_or(SkipReason::UnsupportedEncoding)
}

/// Legacy decoders tried in order after UTF-8.
const LEGACY_DECODERS: &[fn(&[u8]) -> Option<String>] = &[decode_windows_1252, decode_latin1];

/// Decode file bytes as UTF-8, then Windows-1252, then Latin-1.
///
/// Windows-1252 goes first so smart quotes and dashes come out as such;
/// bytes it leaves undefined fall through to Latin-1.
pub fn decode(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            let bytes = err.as_bytes();
            LEGACY_DECODERS.iter().find_map(|decoder| decoder(bytes))
        }
    }
}

/// Code points for 0x80..=0x9F in Windows-1252; `None` marks undefined bytes.
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[(b - 0x80) as usize],
            _ => Some(char::from(b)),
        })
        .collect()
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// Longest run of consecutive backticks in `text`.
pub fn max_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// A backtick fence that cannot collide with `text`.
pub fn fence_for(text: &str) -> String {
    "`".repeat(MIN_FENCE.max(max_backtick_run(text) + 1))
}

/// `path` relative to `base` with `/` separators, falling back to the
/// file name when `path` lies outside `base`.
fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path
        .strip_prefix(base)
        .ok()
        .filter(|r| !r.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(path.file_name().unwrap_or(path.as_os_str())));
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn display_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".".to_string())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::FileRecord;
    use tempfile::TempDir;

    fn record(dir: &TempDir, rel: &str, content: &[u8]) -> FileRecord {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        FileRecord::new(&path, dir.path())
    }

    #[test]
    fn test_fence_for() {
        assert_eq!(fence_for("plain"), "```");
        assert_eq!(fence_for("a ``` b"), "````");
        assert_eq!(fence_for("x ```` y"), "`````");
        assert_eq!(max_backtick_run("`a`` ```"), 3);
    }

    #[test]
    fn test_document_layout() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            record(&dir, "src/main.py", b"print('hi')\n"),
            record(&dir, "README.md", b"# hello\n"),
        ];

        let options = GenerateOptions {
            show_tree: true,
            ..Default::default()
        };
        let result = generate(&files, dir.path(), &options);
        let text = &result.text;

        assert!(text.starts_with("# Source Code Documentation\n\n**Root Directory:** `"));
        assert!(text.contains("**Total Files:** 2\n\n"));
        assert!(text.contains("## Directory Structure\n\n```\n"));
        assert!(text.contains("├── src/\n│   └── main.py\n└── README.md\n```"));
        assert!(text.contains("## File: README.md\n\n```markdown\n# hello\n```\n\n---\n\n"));
        assert!(text.contains("## File: src/main.py\n\n```python\nprint('hi')\n```\n"));

        // Sections are ordered by relative path.
        let readme = text.find("## File: README.md").unwrap();
        let main = text.find("## File: src/main.py").unwrap();
        assert!(readme < main);

        assert_eq!(result.stats.total_files, 2);
        assert_eq!(result.stats.processed_files, 2);
        assert_eq!(result.stats.processed_size, 20);
    }

    #[test]
    fn test_long_backtick_run_gets_longer_fence() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "notes.md", b"before\n````\nafter\n")];

        let text = generate(&files, dir.path(), &GenerateOptions::default()).text;
        assert!(text.contains("`````markdown\nbefore\n````\nafter\n`````\n"));
    }

    #[test]
    fn test_missing_trailing_newline_is_marked() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "a.txt", b"no newline")];

        let text = generate(&files, dir.path(), &GenerateOptions::default()).text;
        assert!(text.contains("```txt noeol\nno newline\n```\n"));
    }

    #[test]
    fn test_binary_and_oversized_are_skipped() {
        let dir = TempDir::new().unwrap();
        let files = vec![
            record(&dir, "logo.png", b"\x89PNG\r\n"),
            record(&dir, "big.txt", &[b'x'; 2048]),
            record(&dir, "ok.txt", b"fine\n"),
        ];
        let options = GenerateOptions {
            max_file_size: Some(1024),
            show_size: true,
            ..Default::default()
        };
        let result = generate(&files, dir.path(), &options);

        assert_eq!(result.stats.skipped_files, 2);
        assert_eq!(result.stats.binary_files, 1);
        assert_eq!(result.stats.oversized_files, 1);
        assert_eq!(result.stats.processed_files, 1);
        assert!(result
            .text
            .contains("## File: big.txt (2.0 KB)\n\n**Status:** Skipped (size exceeds 1.0 KB)  \n\n"));
        assert!(result
            .text
            .contains("[File skipped: size 2.0 KB exceeds limit 1.0 KB]"));
        assert!(result
            .text
            .contains("**Status:** Skipped (binary (binary extension (.png)))"));
        assert!(result.text.contains("[Binary file: binary extension (.png)]"));
    }

    #[test]
    fn test_include_binary_embeds_decoded_bytes() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "data.txt", b"caf\xe9\n")];
        let options = GenerateOptions {
            include_binary: true,
            ..Default::default()
        };
        let result = generate(&files, dir.path(), &options);
        assert!(result.text.contains("café\n"));
        assert_eq!(result.stats.processed_files, 1);
    }

    #[test]
    fn test_decode_fallbacks() {
        assert_eq!(decode(b"plain".to_vec()).as_deref(), Some("plain"));
        assert_eq!(decode(b"\x93quoted\x94".to_vec()).as_deref(), Some("\u{201C}quoted\u{201D}"));
        assert_eq!(decode(b"caf\xe9".to_vec()).as_deref(), Some("café"));
        // Undefined in Windows-1252, so Latin-1 takes over.
        assert_eq!(decode(b"\x81\x8d".to_vec()).as_deref(), Some("\u{81}\u{8d}"));
    }

    #[test]
    fn test_legacy_bytes_are_embedded() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "legacy.txt", b"caf\xe9 \x81 ok\n")];

        let result = generate(&files, dir.path(), &GenerateOptions::default());
        assert_eq!(result.stats.processed_files, 1);
        assert!(result.stats.skipped.is_empty());
        assert!(result.text.contains("caf\u{e9} \u{81} ok\n"));
    }

    #[test]
    fn test_unreadable_file_gets_placeholder() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "gone.txt", b"soon deleted\n")];
        fs::remove_file(dir.path().join("gone.txt")).unwrap();

        let result = generate(&files, dir.path(), &GenerateOptions::default());
        assert_eq!(result.stats.skipped_files, 1);
        assert_eq!(result.stats.processed_files, 0);
        let (path, reason) = &result.stats.skipped[0];
        assert_eq!(path, "gone.txt");
        assert!(reason.starts_with("read error: "));
        assert!(result.text.contains("**Status:** Skipped (read error: "));
        assert!(result.text.contains("[Error reading file: "));
    }

    #[test]
    fn test_tree_uses_alternate_root() {
        let dir = TempDir::new().unwrap();
        let files = vec![record(&dir, "src/lib.rs", b"\n")];
        let options = GenerateOptions {
            show_tree: true,
            tree_root: Some(dir.path().join("src")),
            ..Default::default()
        };
        let result = generate(&files, dir.path(), &options);
        assert!(result.text.contains("src/\n└── lib.rs\n"));
        assert_eq!(result.document.sections[0].relative_path, "src/lib.rs");
    }
}
