//! Terminal status output for the binaries.
//!
//! Everything goes to stderr so documents written with `--stdout` stay clean.
//! Library code never takes a reporter; the binaries own one.

use std::io::IsTerminal;

use colored::Colorize;

/// Progress and summary sink.
pub trait Reporter {
    fn status(&self, message: &str);
    fn warning(&self, message: &str);
    fn success(&self, message: &str);
    /// A titled two-column table.
    fn table(&self, title: &str, rows: &[(String, String)]);
}

/// Lay out `rows` with the label column padded to its widest entry.
pub fn format_rows(rows: &[(String, String)]) -> Vec<String> {
    let width = rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(label, value)| format!("  {label:<width$}  {value}"))
        .collect()
}

/// Colored output for interactive terminals.
pub struct StyledReporter;

impl Reporter for StyledReporter {
    fn status(&self, message: &str) {
        eprintln!("{} {message}", "→".cyan());
    }

    fn warning(&self, message: &str) {
        eprintln!("{} {message}", "!".yellow().bold());
    }

    fn success(&self, message: &str) {
        eprintln!("{} {message}", "✓".green().bold());
    }

    fn table(&self, title: &str, rows: &[(String, String)]) {
        eprintln!("{}", title.bold());
        for line in format_rows(rows) {
            eprintln!("{line}");
        }
    }
}

/// Uncolored output for pipes, CI logs, and `NO_COLOR`.
pub struct PlainReporter;

impl Reporter for PlainReporter {
    fn status(&self, message: &str) {
        eprintln!("{message}");
    }

    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn success(&self, message: &str) {
        eprintln!("{message}");
    }

    fn table(&self, title: &str, rows: &[(String, String)]) {
        eprintln!("{title}");
        for line in format_rows(rows) {
            eprintln!("{line}");
        }
    }
}

/// Drops everything except warnings.
pub struct QuietReporter;

impl Reporter for QuietReporter {
    fn status(&self, _: &str) {}

    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn success(&self, _: &str) {}

    fn table(&self, _: &str, _: &[(String, String)]) {}
}

fn color_disabled() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
}

/// Pick a reporter for the current stderr.
pub fn select(quiet: bool) -> Box<dyn Reporter> {
    if quiet {
        Box::new(QuietReporter)
    } else if std::io::stderr().is_terminal() && !color_disabled() {
        Box::new(StyledReporter)
    } else {
        Box::new(PlainReporter)
    }
}
