//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ordo",
    version,
    about = "Ordo: run the build steps embedded in your documents",
    long_about = "Ordo reads directives written in comments (e.g. `% ordo: pdflatex`), resolves each one against a YAML rule, and runs the resulting commands in document order.\n\nConfiguration precedence: CLI > ordo.toml > defaults.",
    after_help = "Examples:\n  ordo run thesis.tex\n  ordo run --halt-on-errors --max-loops 5 chapters/*.tex\n  ordo run --dry-run --preamble twice paper\n  ordo check --output json docs/*.md",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands for running and checking directives.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current ordo version.")]
    Version,
    /// Execute the directives of each file
    #[command(
        about = "Run directives",
        long_about = "Extract directives from each file and execute them in order. Files may be glob patterns or names without an extension.",
        after_help = "Examples:\n  ordo run doc.tex\n  ordo run --verbose --timeout 60000 doc"
    )]
    Run {
        #[arg(required = true, help = "Files (or glob patterns) to process")]
        files: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Show commands without executing them")]
        dry_run: bool,
        #[arg(short, long, action = clap::ArgAction::SetTrue, help = "Stream tool output and log progress")]
        verbose: bool,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Stop at the first failing step (exit 1)")]
        halt_on_errors: bool,
        #[arg(long, help = "Loop bound for while/until directives (default: 10)")]
        max_loops: Option<u32>,
        #[arg(long, help = "Per-process timeout in milliseconds")]
        timeout: Option<u64>,
        #[arg(long, help = "Named preamble from the configuration to inject")]
        preamble: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Validate directives and rules without running anything
    #[command(
        about = "Check directives",
        long_about = "Extract directives and resolve their rules, reporting unknown rules, bad parameters and malformed expressions. Exits 1 when issues are found.",
        after_help = "Examples:\n  ordo check doc.tex\n  ordo check --output json 'docs/**/*.md'"
    )]
    Check {
        #[arg(required = true, help = "Files (or glob patterns) to check")]
        files: Vec<String>,
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Named preamble from the configuration to inject")]
        preamble: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}
