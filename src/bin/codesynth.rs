//! Codesynth CLI - synthesize a codebase into one markdown document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use codesynth::classify::classify;
use codesynth::document::{self, GenerateOptions, GenerationStats};
use codesynth::errors::{exit_code, CodesynthError};
use codesynth::matcher::{IgnoreMatcher, DEFAULT_IGNORE_FILE};
use codesynth::report::{self, Reporter};
use codesynth::reverse::reverse_file;
use codesynth::tokens::{count_tokens_with_encoding, Encoding};
use codesynth::tree::{format_number, format_size, parse_size};
use codesynth::walker::{collect, detect_source_directories, resolve_files, CollectOptions, FileRecord};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codesynth")]
#[command(about = "Synthesize a codebase into LLM-friendly markdown")]
#[command(version)]
struct Cli {
    /// Directory to scan
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Output file name
    #[arg(short, long, default_value = "codesynth.md")]
    output: PathBuf,

    /// Write the document to stdout
    #[arg(long)]
    stdout: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,

    /// Include a directory tree
    #[arg(short, long)]
    tree: bool,

    /// Show file sizes in headings
    #[arg(short, long)]
    size: bool,

    /// Include only these files (relative to the directory, or absolute)
    #[arg(short, long, num_args = 1.., value_name = "FILE")]
    files: Vec<String>,

    /// Only include these extensions
    #[arg(long, num_args = 1.., value_name = "EXT")]
    extensions: Vec<String>,

    /// Glob patterns to exclude, matched against path and file name
    #[arg(short, long, num_args = 1.., value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Maximum directory depth
    #[arg(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Ignore file to read rules from
    #[arg(short, long, default_value = DEFAULT_IGNORE_FILE)]
    ignore_file: String,

    /// Skip the ignore file, keeping only built-in exclusions
    #[arg(long)]
    no_gitignore: bool,

    /// Scan the given directory even when it is `.`
    #[arg(long)]
    no_detect: bool,

    /// Maximum file size to embed (e.g. 100KB, 1.5MB)
    #[arg(long, value_name = "SIZE", value_parser = size_arg)]
    max_size: Option<u64>,

    /// Embed files even when they look binary
    #[arg(long)]
    include_binary: bool,

    /// Show counts and sizes only
    #[arg(long)]
    stats_only: bool,

    /// List the selected files only
    #[arg(long)]
    list_files: bool,

    /// Rebuild source files from a generated document
    #[arg(long, value_name = "FILE", requires = "output_dir")]
    reverse: Option<PathBuf>,

    /// Output directory for --reverse
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Tokenizer for the summary estimate (cl100k, o200k)
    #[arg(long, default_value = "cl100k")]
    encoding: Encoding,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Log progress details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn size_arg(text: &str) -> Result<u64, String> {
    parse_size(text).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "codesynth", &mut std::io::stdout());
        return;
    }

    init_tracing(cli.verbose);
    let reporter = report::select(cli.quiet || cli.stdout);

    if let Err(e) = run(&cli, reporter.as_ref()) {
        if cli.json {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };
            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: &Cli, reporter: &dyn Reporter) -> Result<(), CodesynthError> {
    if let (Some(input), Some(output_dir)) = (&cli.reverse, &cli.output_dir) {
        return run_reverse(input, output_dir, cli.json, reporter);
    }

    if !cli.directory.exists() {
        return Err(CodesynthError::PathNotFound(cli.directory.clone()));
    }
    if !cli.directory.is_dir() {
        return Err(CodesynthError::NotADirectory(cli.directory.clone()));
    }

    let selection = if cli.files.is_empty() {
        select_by_scan(cli, reporter)?
    } else {
        select_explicit(cli, reporter)?
    };

    if cli.list_files {
        return print_file_list(&selection.files, cli.json);
    }
    if cli.stats_only {
        return print_codebase_stats(&selection.files, cli.json);
    }

    let options = GenerateOptions {
        max_file_size: cli.max_size,
        include_binary: cli.include_binary,
        show_tree: cli.tree,
        show_size: cli.size,
        tree_files: selection.tree_files,
        tree_root: selection.tree_root,
    };

    reporter.status(&format!("Writing {} file(s)", selection.files.len()));
    let output = document::generate(&selection.files, &cli.directory, &options);
    let tokens = count_tokens_with_encoding(&output.text, cli.encoding);

    if cli.stdout {
        let mut out = std::io::stdout().lock();
        out.write_all(output.text.as_bytes())?;
        out.flush()?;
    } else {
        fs::write(&cli.output, &output.text)
            .map_err(|e| CodesynthError::from_io(&cli.output, e))?;
        reporter.success(&format!("Generated {}", cli.output.display()));
    }

    if cli.json && !cli.stdout {
        #[derive(Serialize)]
        struct Output<'a> {
            output: String,
            encoding: String,
            tokens: usize,
            stats: &'a GenerationStats,
        }
        let payload = Output {
            output: cli.output.display().to_string(),
            encoding: cli.encoding.to_string(),
            tokens,
            stats: &output.stats,
        };
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_stats(&output.stats, tokens, reporter);
    }

    Ok(())
}

/// Files chosen for the document plus how the tree should be drawn.
struct Selection {
    files: Vec<FileRecord>,
    tree_files: Option<Vec<PathBuf>>,
    tree_root: Option<PathBuf>,
}

fn matcher_for(cli: &Cli, dir: &Path, reporter: &dyn Reporter) -> Result<IgnoreMatcher, CodesynthError> {
    if cli.no_gitignore {
        return Ok(IgnoreMatcher::defaults_only());
    }
    let matcher = IgnoreMatcher::discover(dir, &cli.ignore_file)?;
    if let Some(path) = matcher.ignore_file() {
        reporter.status(&format!(
            "Using {} ({} rules)",
            path.display(),
            matcher.user_pattern_count()
        ));
    }
    Ok(matcher)
}

fn collect_options(cli: &Cli) -> CollectOptions {
    let mut options = CollectOptions::default()
        .extensions(&cli.extensions)
        .exclude(cli.exclude.iter().cloned());
    if let Some(depth) = cli.max_depth {
        options = options.max_depth(depth);
    }
    options
}

fn select_by_scan(cli: &Cli, reporter: &dyn Reporter) -> Result<Selection, CodesynthError> {
    let detected = if cli.no_detect || cli.directory != Path::new(".") {
        Vec::new()
    } else {
        detect_source_directories(&cli.directory)
    };

    let (scan_dirs, tree_root) = match detected.as_slice() {
        [] => (vec![cli.directory.clone()], None),
        [only] => (detected.clone(), Some(only.clone())),
        _ => (detected.clone(), None),
    };
    if !detected.is_empty() {
        let names: Vec<String> = detected.iter().map(|d| d.display().to_string()).collect();
        reporter.status(&format!("Detected {}", names.join(", ")));
    }
    if !cli.extensions.is_empty() {
        reporter.status(&format!("Extensions: {}", cli.extensions.join(", ")));
    }

    let options = collect_options(cli);
    let mut files = Vec::new();
    for dir in &scan_dirs {
        reporter.status(&format!("Scanning {}", dir.display()));
        let matcher = matcher_for(cli, dir, reporter)?;
        files.extend(collect(dir, &matcher, &options)?);
    }
    files.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
    files.dedup_by(|a, b| a.absolute_path == b.absolute_path);

    if files.is_empty() {
        return Err(CodesynthError::NoFilesFound(cli.directory.clone()));
    }

    Ok(Selection {
        files,
        tree_files: None,
        tree_root,
    })
}

fn select_explicit(cli: &Cli, reporter: &dyn Reporter) -> Result<Selection, CodesynthError> {
    let (files, missing) = resolve_files(&cli.directory, &cli.files);
    for name in &missing {
        reporter.warning(&format!("File not found: {name}"));
    }
    if files.is_empty() {
        return Err(CodesynthError::NoRequestedFiles);
    }
    reporter.status(&format!("{} file(s) selected", files.len()));

    let tree_files = if cli.tree {
        let matcher = matcher_for(cli, &cli.directory, reporter)?;
        let all = collect(&cli.directory, &matcher, &CollectOptions::default())?;
        Some(all.into_iter().map(|f| f.absolute_path).collect())
    } else {
        None
    };

    Ok(Selection {
        files,
        tree_files,
        tree_root: None,
    })
}

fn print_file_list(files: &[FileRecord], json: bool) -> Result<(), CodesynthError> {
    if json {
        println!("{}", serde_json::to_string_pretty(files)?);
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for file in files {
        writeln!(
            out,
            "{} ({})",
            file.relative_path.display(),
            format_size(file.size_bytes)
        )?;
    }
    writeln!(out, "\n{} file(s)", files.len())?;
    Ok(())
}

#[derive(Serialize)]
struct CodebaseStats {
    total_files: usize,
    text_files: usize,
    binary_files: usize,
    total_size: u64,
}

fn print_codebase_stats(files: &[FileRecord], json: bool) -> Result<(), CodesynthError> {
    let binary_files = files
        .iter()
        .filter(|f| classify(&f.absolute_path).is_binary())
        .count();
    let stats = CodebaseStats {
        total_files: files.len(),
        text_files: files.len() - binary_files,
        binary_files,
        total_size: files.iter().map(|f| f.size_bytes).sum(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{} file(s) total", format_number(stats.total_files));
        println!("{} text, {} binary", stats.text_files, stats.binary_files);
        println!("{} total", format_size(stats.total_size));
    }
    Ok(())
}

fn print_stats(stats: &GenerationStats, tokens: usize, reporter: &dyn Reporter) {
    let mut rows = vec![(
        "Processed".to_string(),
        format!("{} file(s)", stats.processed_files),
    )];
    if stats.skipped_files > 0 {
        let mut parts = Vec::new();
        if stats.binary_files > 0 {
            parts.push(format!("{} binary", stats.binary_files));
        }
        if stats.oversized_files > 0 {
            parts.push(format!("{} oversized", stats.oversized_files));
        }
        let detail = if parts.is_empty() {
            "filtered".to_string()
        } else {
            parts.join(", ")
        };
        rows.push((
            "Skipped".to_string(),
            format!("{} ({detail})", stats.skipped_files),
        ));
    }
    rows.push(("Size".to_string(), format_size(stats.processed_size)));
    rows.push(("Tokens".to_string(), format!("~{}", format_number(tokens))));
    reporter.table("Summary", &rows);
}

fn run_reverse(
    input: &Path,
    output_dir: &Path,
    json: bool,
    reporter: &dyn Reporter,
) -> Result<(), CodesynthError> {
    reporter.status(&format!("Reversing {}", input.display()));
    let stats = reverse_file(input, output_dir)?;

    for warning in &stats.warnings {
        reporter.warning(warning);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        reporter.success(&format!(
            "Wrote {} of {} file(s) to {}",
            stats.written_files,
            stats.total_files,
            output_dir.display()
        ));
        if stats.skipped_files > 0 {
            reporter.status(&format!("{} skipped", stats.skipped_files));
        }
    }
    Ok(())
}
