//! Codesynth - pack a source tree into one markdown document, unpack it
//! again, and map the call structure of Python projects.
//!
//! # Quick Start
//!
//! ```no_run
//! use codesynth::document::{generate, GenerateOptions};
//! use codesynth::matcher::IgnoreMatcher;
//! use codesynth::walker::{collect, CollectOptions};
//! use std::path::Path;
//!
//! let root = Path::new("./my-project");
//! let matcher = IgnoreMatcher::discover(root, ".gitignore").unwrap();
//! let files = collect(root, &matcher, &CollectOptions::default()).unwrap();
//!
//! let output = generate(&files, root, &GenerateOptions::default());
//! println!("{} of {} files embedded", output.stats.processed_files, output.stats.total_files);
//! ```
//!
//! # Modules
//!
//! - [`matcher`] - gitignore-style exclusion rules
//! - [`classify`] - binary detection and language tags
//! - [`walker`] - file collection
//! - [`tree`] - directory tree rendering and size formatting
//! - [`document`] - markdown document generation
//! - [`reverse`] - rebuilding files from a generated document
//! - [`callgraph`] - Python call graph extraction and rendering
//! - [`tokens`] - token estimates for generated output
//! - [`report`] - terminal status output used by the binaries

pub mod callgraph;
pub mod classify;
pub mod document;
pub mod errors;
pub mod matcher;
pub mod report;
pub mod reverse;
pub mod tokens;
pub mod tree;
pub mod walker;

// Re-export key types at crate root for convenience
pub use callgraph::{build_call_graph, BuildOptions, CallGraph, CallGraphError};
pub use document::{generate, GenerateOptions, Generation, GenerationStats};
pub use errors::CodesynthError;
pub use matcher::{IgnoreMatcher, MatcherError};
pub use reverse::{reverse_file, ReverseError, ReverseStats};
pub use tokens::{count_tokens, Encoding};
pub use tree::{format_size, parse_size, FileNode};
pub use walker::{collect, CollectOptions, FileRecord, WalkError};
