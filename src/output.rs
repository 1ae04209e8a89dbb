//! Output rendering for run and check commands.
//!
//! Supports `human` (default) and `json` outputs. The JSON form includes
//! per-item fields and a top-level summary.

use crate::models::{CheckReport, RunReport};
use crate::utils::rel_to_wd;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn step_icon(success: bool, dry_run: bool, color: bool) -> String {
    match (dry_run, success, color) {
        (true, _, _) => "◇".to_string(),
        (false, true, true) => "✔".green().to_string(),
        (false, true, false) => "✔".to_string(),
        (false, false, true) => "✖".red().to_string(),
        (false, false, false) => "✖".to_string(),
    }
}

fn lines_label(lines: &[usize]) -> String {
    match lines {
        [] => String::new(),
        [0] => " (preamble)".to_string(),
        _ => format!(
            " (line {})",
            lines
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Print the steps of a run, skipped directives and a summary line.
pub fn print_run(report: &RunReport, output: &str, dry_run: bool) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&compose_run_json(report)).unwrap_or_default()
        ),
        _ => {
            let color = use_colors(output);
            for s in &report.steps {
                let icon = step_icon(s.success, dry_run, color);
                let verdict = if dry_run {
                    "planned"
                } else if s.success {
                    "ok"
                } else {
                    "failed"
                };
                let verdict = match (color, s.success || dry_run) {
                    (true, true) => verdict.green().bold().to_string(),
                    (true, false) => verdict.red().bold().to_string(),
                    (false, _) => verdict.to_string(),
                };
                let file = rel_to_wd(&s.file);
                let file = if color { file.bold().to_string() } else { file };
                println!(
                    "{} {} {} ❲{}❳ {}{}",
                    icon,
                    verdict,
                    file,
                    s.rule,
                    s.step,
                    lines_label(&s.lines)
                );
                if let Some(cmd) = &s.command {
                    match s.exit_code {
                        Some(code) if !dry_run => println!("    $ {} → exit {}", cmd, code),
                        _ => println!("    $ {}", cmd),
                    }
                }
            }
            for s in &report.skipped {
                let line = format!(
                    "skipped: {} ❲{}❳{}",
                    rel_to_wd(&s.file),
                    s.rule,
                    lines_label(&s.lines)
                );
                if color {
                    println!("{}", line.bright_black());
                } else {
                    println!("{}", line);
                }
            }
            let summary = format!(
                "— Summary — steps={} failed={} skipped={} status={}{}",
                report.steps.len(),
                report.failures(),
                report.skipped.len(),
                report.status.code(),
                if report.halted { " (halted)" } else { "" }
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Print static check issues and a summary line.
pub fn print_check(report: &CheckReport, output: &str) {
    match output {
        "json" => println!(
            "{}",
            serde_json::to_string_pretty(&compose_check_json(report)).unwrap_or_default()
        ),
        _ => {
            let color = use_colors(output);
            for is in &report.issues {
                let file = rel_to_wd(&is.file);
                if color {
                    println!(
                        "{} {} {}{} — {}",
                        "✖".red(),
                        "⟦error⟧".red().bold(),
                        file.bold(),
                        lines_label(&is.lines),
                        is.message
                    );
                } else {
                    println!("⟦error⟧ {}{} — {}", file, lines_label(&is.lines), is.message);
                }
            }
            let summary = format!(
                "— Summary — issues={} files={} directives={}",
                report.issues.len(),
                report.files,
                report.directives
            );
            if color {
                println!("{}", summary.bold());
            } else {
                println!("{}", summary);
            }
        }
    }
}

/// Compose run JSON object (pure) for testing/snapshot purposes.
pub fn compose_run_json(report: &RunReport) -> JsonVal {
    let summary = json!({
        "steps": report.steps.len(),
        "failed": report.failures(),
        "skipped": report.skipped.len(),
        "status": report.status.code(),
        "halted": report.halted,
    });
    let mut out = json!({
        "steps": report.steps,
        "skipped": report.skipped,
        "summary": summary,
    });
    if let Some(err) = &report.error {
        out["error"] = json!(err);
    }
    out
}

/// Compose check JSON object (pure) for testing/snapshot purposes.
pub fn compose_check_json(report: &CheckReport) -> JsonVal {
    json!({
        "issues": report.issues,
        "summary": {
            "issues": report.issues.len(),
            "files": report.files,
            "directives": report.directives,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExitStatus, Issue, SkipReport, StepReport};

    #[test]
    fn test_step_icons_are_plain_without_color() {
        assert_eq!(step_icon(true, false, false), "✔");
        assert_eq!(step_icon(false, false, false), "✖");
        assert_eq!(step_icon(false, true, true), "◇");
        assert!(step_icon(true, false, true).contains('\u{1b}'));
    }

    #[test]
    fn test_compose_run_json_shape() {
        let report = RunReport {
            steps: vec![StepReport {
                file: "doc.tex".into(),
                rule: "pdflatex".into(),
                step: "PDFLaTeX engine".into(),
                lines: vec![1],
                success: false,
                command: Some("pdflatex doc.tex".into()),
                exit_code: Some(1),
            }],
            skipped: vec![SkipReport {
                file: "doc.tex".into(),
                rule: "bibtex".into(),
                lines: vec![2],
            }],
            status: ExitStatus::FAILURE,
            halted: true,
            error: None,
        };
        let out = compose_run_json(&report);
        assert_eq!(out["summary"]["failed"], 1);
        assert_eq!(out["summary"]["status"], 1);
        assert_eq!(out["summary"]["halted"], true);
        assert_eq!(out["steps"][0]["exit_code"], 1);
        assert_eq!(out["skipped"][0]["rule"], "bibtex");
        assert!(out.get("error").is_none());
        // Field order follows the struct definition.
        let keys: Vec<_> = out["steps"][0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[..3], ["file", "rule", "step"]);
    }

    #[test]
    fn test_compose_run_json_carries_error() {
        let report = RunReport {
            status: ExitStatus::EXCEPTION,
            error: Some("rule 'x' not found; searched: ".into()),
            ..Default::default()
        };
        let out = compose_run_json(&report);
        assert_eq!(out["summary"]["status"], 2);
        assert!(out["error"].as_str().unwrap().contains("not found"));
    }

    #[test]
    fn test_compose_check_json_shape() {
        let report = CheckReport {
            issues: vec![Issue {
                file: "a.sh".into(),
                lines: vec![3],
                message: "unknown keys: x".into(),
            }],
            files: 2,
            directives: 5,
        };
        let out = compose_check_json(&report);
        assert_eq!(out["summary"]["issues"], 1);
        assert_eq!(out["summary"]["directives"], 5);
        assert_eq!(out["issues"][0]["lines"][0], 3);
    }

    #[test]
    fn test_lines_label() {
        assert_eq!(lines_label(&[]), "");
        assert_eq!(lines_label(&[0]), " (preamble)");
        assert_eq!(lines_label(&[2, 3]), " (line 2, 3)");
    }
}
