//! Error types for codesynth and cflow.

use std::path::PathBuf;

use crate::callgraph::CallGraphError;
use crate::matcher::MatcherError;
use crate::reverse::ReverseError;
use crate::walker::WalkError;

/// Top-level error type shared by both binaries.
#[derive(Debug, thiserror::Error)]
pub enum CodesynthError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("no files found in {0}")]
    NoFilesFound(PathBuf),

    #[error("none of the requested files exist")]
    NoRequestedFiles,

    #[error("no entry point found in {0}")]
    NoEntryPoint(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("ignore file error: {0}")]
    Matcher(#[from] MatcherError),

    #[error("reverse error: {0}")]
    Reverse(#[from] ReverseError),

    #[error("call graph error: {0}")]
    CallGraph(#[from] CallGraphError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodesynthError {
    /// Classify an IO failure on `path` the way the exit codes expect.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &CodesynthError) -> i32 {
    match error {
        CodesynthError::PathNotFound(_) => 3,
        CodesynthError::NotADirectory(_) => 3,
        CodesynthError::PermissionDenied(_) => 4,
        CodesynthError::NoFilesFound(_) => 5,
        CodesynthError::NoEntryPoint(_) => 5,
        CodesynthError::NoRequestedFiles => 1,
        CodesynthError::Io(_) => 1,
        CodesynthError::Walk(WalkError::NotFound { .. }) => 3,
        CodesynthError::Walk(WalkError::NotADirectory { .. }) => 3,
        CodesynthError::Walk(_) => 2,
        CodesynthError::Matcher(_) => 1,
        CodesynthError::Reverse(ReverseError::Read { source, .. })
            if source.kind() == std::io::ErrorKind::NotFound =>
        {
            3
        }
        CodesynthError::Reverse(_) => 1,
        CodesynthError::CallGraph(CallGraphError::NotFound { .. }) => 3,
        CodesynthError::CallGraph(_) => 1,
        CodesynthError::Json(_) => 1,
    }
}
