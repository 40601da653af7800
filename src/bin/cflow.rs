//! Cflow CLI - function call graphs for Python projects.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};
use codesynth::callgraph::{build_call_graph, render_markdown, BuildOptions, CallGraph, RenderOptions};
use codesynth::errors::{exit_code, CodesynthError};
use codesynth::report::{self, Reporter};
use codesynth::tree::format_number;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cflow")]
#[command(about = "Generate function call graphs for Python code")]
#[command(version)]
#[command(after_help = "\
Examples:
  cflow ./src                  Analyze and write cflow.md
  cflow ./src/main.py          Analyze a single file
  cflow ./src --entry main     Start from 'main'
  cflow ./src --with-mermaid   Include a Mermaid diagram
  cflow ./src --stdout         Print the report")]
struct Cli {
    /// Directory or .py file to analyze
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Entry point function (default: auto-detect)
    #[arg(short, long, value_name = "FUNC")]
    entry: Option<String>,

    /// Output file
    #[arg(short, long, value_name = "FILE", default_value = "cflow.md")]
    output: PathBuf,

    /// Print the report to stdout instead of a file
    #[arg(long)]
    stdout: bool,

    /// Include a Mermaid diagram
    #[arg(long)]
    with_mermaid: bool,

    /// Maximum call depth to traverse
    #[arg(long, value_name = "N", default_value_t = 10)]
    max_depth: usize,

    /// Node limit before the diagram is narrowed to entry points
    #[arg(long, value_name = "N", default_value_t = 50)]
    max_nodes: usize,

    /// Print the graph summary as JSON
    #[arg(long)]
    json: bool,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,

    /// Log progress details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
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
        generate(shell, &mut Cli::command(), "cflow", &mut std::io::stdout());
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
    reporter.status(&format!("Scanning {}", cli.path.display()));
    if let Some(entry) = &cli.entry {
        reporter.status(&format!("Entry point: {entry}"));
    }

    let mut options = BuildOptions::default().max_depth(cli.max_depth);
    if let Some(entry) = &cli.entry {
        options = options.entry(entry.clone());
    }
    let graph = build_call_graph(&cli.path, &options)?;

    for path in &graph.skipped_files {
        reporter.warning(&format!("Skipped {}", path.display()));
    }
    if graph.functions.is_empty() {
        return Err(CodesynthError::NoFilesFound(graph.root));
    }
    if !graph.has_entry_points() {
        if let Some(entry) = &cli.entry {
            reporter.warning(&format!("Function '{entry}' not found"));
        }
        return Err(CodesynthError::NoEntryPoint(graph.root));
    }

    print_summary(&graph, reporter);

    let text = render_markdown(
        &graph,
        &RenderOptions {
            with_mermaid: cli.with_mermaid,
            max_depth: cli.max_depth,
            max_nodes: cli.max_nodes,
        },
    );

    if cli.stdout {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
    } else {
        fs::write(&cli.output, &text).map_err(|e| CodesynthError::from_io(&cli.output, e))?;
        reporter.success(&format!("Generated {}", cli.output.display()));
    }

    if cli.json && !cli.stdout {
        println!("{}", serde_json::to_string_pretty(&graph.summary())?);
    }
    Ok(())
}

fn print_summary(graph: &CallGraph, reporter: &dyn Reporter) {
    let rows = [
        ("Functions", graph.functions.len()),
        ("Entry points", graph.entry_points.len()),
        ("Call edges", graph.edges.len()),
        ("Unresolved calls", graph.unresolved.len()),
    ]
    .into_iter()
    .map(|(label, n)| (label.to_string(), format_number(n)))
    .collect::<Vec<_>>();
    reporter.table("Call graph", &rows);
}
