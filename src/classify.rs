//! File classification: binary detection and language tags.
//!
//! Binary detection runs cheapest check first: the extension, then magic
//! signatures in the first 32 bytes, then null bytes and the ratio of
//! control characters in the first 8 KiB.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Bytes inspected for magic signatures.
const HEADER_LEN: usize = 32;

/// Bytes inspected for null bytes and control characters.
const SAMPLE_LEN: u64 = 8192;

/// Control-character share above which a sample counts as binary.
const NON_PRINTABLE_RATIO: f64 = 0.1;

/// Magic byte prefixes of common binary formats.
const BINARY_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG", "PNG"),
    (b"\xff\xd8\xff", "JPEG"),
    (b"GIF87a", "GIF"),
    (b"GIF89a", "GIF"),
    (b"PK\x03\x04", "ZIP"),
    (b"PK\x05\x06", "ZIP"),
    (b"PK\x07\x08", "ZIP"),
    (b"%PDF", "PDF"),
    (b"\x7fELF", "ELF"),
    (b"MZ", "PE"),
    (b"\xca\xfe\xba\xbe", "Mach-O fat/class"),
    (b"\xfe\xed\xfa\xce", "Mach-O"),
    (b"\xfe\xed\xfa\xcf", "Mach-O"),
    (b"\xcf\xfa\xed\xfe", "Mach-O"),
    (b"\x1f\x8b", "gzip"),
    (b"BZ", "bzip2"),
    (b"\xfd7zXZ", "xz"),
    (b"Rar!\x1a\x07", "RAR"),
    (b"\x00\x00\x00\x1cftyp", "MP4"),
    (b"\x00\x00\x00\x20ftyp", "MP4"),
    (b"ID3", "MP3"),
    (b"\xff\xfb", "MP3"),
    (b"\xff\xfa", "MP3"),
    (b"OggS", "Ogg"),
    (b"RIFF", "RIFF"),
    (b"fLaC", "FLAC"),
    (b"\x00\x00\x01\x00", "ICO"),
    (b"OTTO", "OpenType"),
    (b"\x00\x01\x00\x00", "TrueType"),
    (b"wOFF", "WOFF"),
    (b"wOF2", "WOFF2"),
    (b"\x1a\x45\xdf\xa3", "Matroska"),
    (b"SQLite format 3", "SQLite"),
    (b"\x00asm", "WebAssembly"),
];

/// Extensions (lowercase, no dot) that are always treated as binary.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "svg", "tiff", "tif", "psd", "raw", "heic",
    "heif", "avif",
    // audio
    "mp3", "wav", "flac", "aac", "ogg", "wma", "m4a", "opus",
    // video
    "mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg",
    // archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", "iso", "dmg",
    // executables and libraries
    "exe", "dll", "so", "dylib", "bin", "out", "app", "msi",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // databases
    "db", "sqlite", "sqlite3", "mdb",
    // compiled artifacts
    "pyc", "pyo", "class", "jar", "war", "ear", "apk", "ipa", "o", "a", "lib", "obj", "wasm",
];

/// Why a file was judged binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryReason {
    Extension(String),
    Signature(&'static str),
    NullBytes,
    NonPrintable,
}

impl fmt::Display for BinaryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extension(ext) => write!(f, "binary extension (.{ext})"),
            Self::Signature(kind) => write!(f, "binary signature detected ({kind})"),
            Self::NullBytes => f.write_str("null bytes detected"),
            Self::NonPrintable => f.write_str("high non-printable character ratio"),
        }
    }
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Text,
    Binary(BinaryReason),
    /// The file could not be inspected. It is treated as text so the
    /// reader can report the real failure.
    Unreadable(String),
}

impl Classification {
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Human-readable reason, empty for plain text.
    pub fn reason(&self) -> String {
        match self {
            Self::Text => String::new(),
            Self::Binary(reason) => reason.to_string(),
            Self::Unreadable(err) => format!("error checking: {err}"),
        }
    }
}

/// Lowercased extension without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

pub fn is_binary_extension(ext: &str) -> bool {
    BINARY_EXTENSIONS.contains(&ext)
}

/// Decide whether `path` holds binary data.
pub fn classify(path: &Path) -> Classification {
    if let Some(ext) = extension_of(path) {
        if is_binary_extension(&ext) {
            return Classification::Binary(BinaryReason::Extension(ext));
        }
    }

    let mut sample = Vec::with_capacity(SAMPLE_LEN as usize);
    let read = File::open(path).and_then(|f| f.take(SAMPLE_LEN).read_to_end(&mut sample));
    if let Err(err) = read {
        return Classification::Unreadable(err.to_string());
    }

    match inspect_bytes(&sample) {
        Some(reason) => Classification::Binary(reason),
        None => Classification::Text,
    }
}

/// Content checks on a leading sample of a file.
pub fn inspect_bytes(sample: &[u8]) -> Option<BinaryReason> {
    if sample.is_empty() {
        return None;
    }

    let header = &sample[..sample.len().min(HEADER_LEN)];
    if let Some((_, kind)) = BINARY_SIGNATURES
        .iter()
        .find(|(sig, _)| header.starts_with(sig))
    {
        return Some(BinaryReason::Signature(kind));
    }

    if sample.contains(&0) {
        return Some(BinaryReason::NullBytes);
    }

    let control = sample
        .iter()
        .filter(|&&b| b < 32 && !matches!(b, b'\t' | b'\n' | b'\r'))
        .count();
    if control as f64 / sample.len() as f64 > NON_PRINTABLE_RATIO {
        return Some(BinaryReason::NonPrintable);
    }

    None
}

/// Fence language tag for a file.
pub fn language_for_path(path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match basename.as_str() {
        "dockerfile" | "containerfile" => return "dockerfile".into(),
        "makefile" | "gnumakefile" => return "makefile".into(),
        "cmakelists.txt" => return "cmake".into(),
        "gemfile" | "rakefile" => return "ruby".into(),
        name if name.starts_with(".env") => return "bash".into(),
        _ => {}
    }

    let Some(ext) = extension_of(path) else {
        return "text".into();
    };
    language_for_extension(&ext)
        .map(str::to_string)
        .unwrap_or(ext)
}

fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext {
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "jsx" => "jsx",
        "tsx" => "tsx",
        "rb" => "ruby",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "swift" => "swift",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "php" => "php",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "fish" => "fish",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "sass" => "sass",
        "less" => "less",
        "json" => "json",
        "xml" => "xml",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "ini" | "cfg" | "conf" => "ini",
        "md" | "markdown" => "markdown",
        "rst" => "rst",
        "tex" => "latex",
        "r" => "r",
        "m" => "matlab",
        "lua" => "lua",
        "pl" | "pm" => "perl",
        "ex" | "exs" => "elixir",
        "erl" | "hrl" => "erlang",
        "clj" | "cljs" => "clojure",
        "scala" => "scala",
        "hs" => "haskell",
        "ml" => "ocaml",
        "fs" => "fsharp",
        "vim" => "vim",
        "dockerfile" => "dockerfile",
        "makefile" => "makefile",
        "cmake" => "cmake",
        "groovy" | "gradle" => "groovy",
        "tf" | "hcl" => "hcl",
        "proto" => "protobuf",
        "graphql" | "gql" => "graphql",
        "vue" => "vue",
        "svelte" => "svelte",
        _ => return None,
    };
    Some(lang)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_binary_extension_wins_without_reading() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.png");
        fs::write(&path, "not actually an image").unwrap();

        let result = classify(&path);
        assert!(result.is_binary());
        assert_eq!(result.reason(), "binary extension (.png)");
    }

    #[test]
    fn test_null_byte_is_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"hello\x00world").unwrap();

        assert_eq!(classify(&path), Classification::Binary(BinaryReason::NullBytes));
    }

    #[test]
    fn test_plain_text_is_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "line one\n\tline two\r\n").unwrap();

        let result = classify(&path);
        assert_eq!(result, Classification::Text);
        assert!(result.reason().is_empty());
    }

    #[test]
    fn test_empty_file_is_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.py");
        fs::write(&path, "").unwrap();
        assert_eq!(classify(&path), Classification::Text);
    }

    #[test]
    fn test_signature_detection() {
        assert_eq!(
            inspect_bytes(b"\x89PNG\r\n\x1a\n"),
            Some(BinaryReason::Signature("PNG"))
        );
        assert_eq!(
            inspect_bytes(b"SQLite format 3\x00"),
            Some(BinaryReason::Signature("SQLite"))
        );
    }

    #[test]
    fn test_control_character_ratio() {
        let mut noisy = vec![b'a'; 80];
        noisy.extend(std::iter::repeat(0x01).take(20));
        assert_eq!(inspect_bytes(&noisy), Some(BinaryReason::NonPrintable));

        let mut mild = vec![b'a'; 95];
        mild.extend(std::iter::repeat(0x1b).take(5));
        assert_eq!(inspect_bytes(&mild), None);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = classify(Path::new("/nonexistent/file.txt"));
        assert!(!result.is_binary());
        assert!(result.reason().starts_with("error checking:"));
    }

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path(Path::new("src/app.py")), "python");
        assert_eq!(language_for_path(Path::new("lib.RS")), "rust");
        assert_eq!(language_for_path(Path::new("Dockerfile")), "dockerfile");
        assert_eq!(language_for_path(Path::new("GNUmakefile")), "makefile");
        assert_eq!(language_for_path(Path::new("CMakeLists.txt")), "cmake");
        assert_eq!(language_for_path(Path::new(".env.production")), "bash");
        assert_eq!(language_for_path(Path::new("data.csv")), "csv");
        assert_eq!(language_for_path(Path::new("LICENSE")), "text");
    }
}
