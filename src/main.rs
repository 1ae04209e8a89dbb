//! Ordo CLI binary entry point.
//! Delegates to the library for run/check and prints results.

use clap::Parser;
use ordo::cli::{Cli, Commands};
use ordo::config::{self, CliOverrides, Effective};
use ordo::utils::{error_prefix, expand_inputs, note_prefix};
use ordo::{check, interpreter::Interpreter, output};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_or_exit(overrides: &CliOverrides) -> Effective {
    match config::resolve_effective(overrides) {
        Ok(eff) => {
            if !eff.config_found && eff.output != "json" {
                eprintln!("{} No ordo.toml found; using defaults.", note_prefix());
            }
            eff
        }
        Err(e) => {
            eprintln!("{} {}", error_prefix(), e);
            std::process::exit(2);
        }
    }
}

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Run {
            files,
            repo_root,
            dry_run,
            verbose,
            halt_on_errors,
            max_loops,
            timeout,
            preamble,
            output,
        } => {
            let eff = resolve_or_exit(&CliOverrides {
                repo_root,
                verbose: verbose.then_some(true),
                dry_run: dry_run.then_some(true),
                halt_on_errors: halt_on_errors.then_some(true),
                max_loops,
                timeout,
                preamble,
                output,
            });
            init_tracing(eff.options.verbose);
            let dry_run = eff.options.dry_run;
            let inputs = expand_inputs(&files);
            let report = Interpreter::new(eff.options).run(&inputs);
            output::print_run(&report, &eff.output, dry_run);
            if let Some(err) = &report.error {
                if eff.output != "json" {
                    eprintln!("{} {}", error_prefix(), err);
                }
            }
            std::process::exit(report.status.code());
        }
        Commands::Check {
            files,
            repo_root,
            preamble,
            output,
        } => {
            let eff = resolve_or_exit(&CliOverrides {
                repo_root,
                preamble,
                output,
                ..Default::default()
            });
            init_tracing(false);
            let inputs = expand_inputs(&files);
            let report = check::run_check(&inputs, &eff.options);
            output::print_check(&report, &eff.output);
            if !report.issues.is_empty() {
                std::process::exit(1);
            }
        }
    }
}
