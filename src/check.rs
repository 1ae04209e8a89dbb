//! Static validation: extract directives and resolve their rules without
//! evaluating anything or running commands.
//!
//! Files are checked in parallel; issues come back sorted by file, then line.

use crate::config::ExecutionOptions;
use crate::expr;
use crate::extract;
use crate::models::{CheckReport, Directive, Issue, Rule};
use crate::rules;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Check every input and summarize the problems found.
pub fn run_check(inputs: &[PathBuf], options: &ExecutionOptions) -> CheckReport {
    let mut per_file: Vec<(Vec<Issue>, usize)> = inputs
        .par_iter()
        .map(|input| check_file(input, options))
        .collect();
    let directives = per_file.iter().map(|(_, n)| *n).sum();
    let mut issues: Vec<Issue> = per_file.iter_mut().flat_map(|(v, _)| v.drain(..)).collect();
    issues.sort_by(|a, b| a.file.cmp(&b.file).then(a.lines.cmp(&b.lines)));
    CheckReport {
        issues,
        files: inputs.len(),
        directives,
    }
}

fn check_file(input: &Path, options: &ExecutionOptions) -> (Vec<Issue>, usize) {
    let file = input.display().to_string();
    let issue = |lines: Vec<usize>, message: String| Issue {
        file: file.clone(),
        lines,
        message,
    };

    let (path, file_type) = match extract::locate(input, &options.file_types) {
        Ok(found) => found,
        Err(e) => return (vec![issue(vec![], e.to_string())], 0),
    };
    let directives = match extract::extract(&path, &file_type, &options.preamble) {
        Ok(ds) => ds,
        Err(e) => return (vec![issue(e.lines().to_vec(), e.to_string())], 0),
    };
    if directives.is_empty() {
        return (vec![issue(vec![], "no directives found".to_string())], 0);
    }

    let base = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let search = options.rule_search_paths(&base);
    let mut issues = Vec::new();
    for d in &directives {
        match rules::resolve(&d.identifier, &search) {
            Ok(rule) => {
                for message in directive_problems(&rule, d) {
                    issues.push(issue(d.line_numbers.clone(), message));
                }
            }
            Err(e) => issues.push(issue(d.line_numbers.clone(), e.to_string())),
        }
    }
    (issues, directives.len())
}

/// Problems detectable without evaluation: parameter/argument mismatches and
/// expressions that do not parse.
fn directive_problems(rule: &Rule, directive: &Directive) -> Vec<String> {
    let header = rule.header();
    let mut out = Vec::new();
    let unknown: Vec<&str> = directive
        .supplied_keys()
        .filter(|k| !rule.declares(k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        out.push(format!("{} unknown keys: {}", header, unknown.join(", ")));
    }
    for arg in &rule.arguments {
        if arg.required && !directive.parameters.contains_key(&arg.identifier) {
            out.push(format!(
                "{} missing required argument '{}'",
                header, arg.identifier
            ));
        }
    }
    let sources = rule
        .arguments
        .iter()
        .flat_map(|a| a.default.iter().chain(a.flag.iter()))
        .chain(
            rule.commands
                .iter()
                .flat_map(|c| std::iter::once(&c.command).chain(c.exit.iter())),
        );
    for src in sources {
        if let Err(e) = expr::check_syntax(src) {
            out.push(format!("{} {}", header, e));
        }
    }
    out
}
