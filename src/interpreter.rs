//! Execution engine.
//!
//! Files are processed one at a time and their directives strictly in
//! document order. For each directive the rule is resolved, arguments are
//! bound, and the rule's commands run in passes gated by the directive's
//! conditional. Every element a command expression yields is dispatched:
//! booleans are outcomes, commands are processes, actions are built-ins.

use crate::arguments;
use crate::conditional::ConditionalEvaluator;
use crate::config::ExecutionOptions;
use crate::error::{OrdoError, Result};
use crate::expr::{Action, Context, Evaluator, Expr, Value};
use crate::extract;
use crate::helpers::{HelperScope, Session};
use crate::models::{Directive, ExitStatus, Rule, RuleCommand, RunReport, SkipReport, StepReport};
use crate::process;
use crate::rules;
use crate::store::ChangeStore;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// State owned by the file currently being processed.
struct FileState {
    path: PathBuf,
    working_dir: PathBuf,
    store: ChangeStore,
    /// Filled by the `halt` action; checked after every element.
    halt: Option<ExitStatus>,
}

pub struct Interpreter {
    options: ExecutionOptions,
    evaluator: Box<dyn Evaluator>,
}

impl Interpreter {
    pub fn new(options: ExecutionOptions) -> Self {
        Self::with_evaluator(options, Box::new(Expr))
    }

    pub fn with_evaluator(options: ExecutionOptions, evaluator: Box<dyn Evaluator>) -> Self {
        Interpreter { options, evaluator }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Process `inputs` in order. Errors end the run with status 2 and are
    /// recorded in the report alongside the steps that already ran.
    pub fn run(&self, inputs: &[PathBuf]) -> RunReport {
        let mut report = RunReport::default();
        let mut session = Session::default();
        for input in inputs {
            match self.run_file(input, &mut session, &mut report) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => {
                    error!(file = %input.display(), "{}", e);
                    report.status = ExitStatus::EXCEPTION;
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }
        report
    }

    fn run_file(
        &self,
        input: &Path,
        session: &mut Session,
        report: &mut RunReport,
    ) -> Result<Flow> {
        let (path, file_type) = extract::locate(input, &self.options.file_types)?;
        let directives = extract::extract(&path, &file_type, &self.options.preamble)?;
        if directives.is_empty() {
            return Err(OrdoError::extraction(
                format!("no directives found in {}", path.display()),
                vec![],
            ));
        }
        let working_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        info!(file = %path.display(), directives = directives.len(), "processing");
        let mut state = FileState {
            store: ChangeStore::for_project(&working_dir),
            path,
            working_dir,
            halt: None,
        };
        for directive in &directives {
            if self.run_directive(directive, &mut state, session, report)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn run_directive(
        &self,
        directive: &Directive,
        state: &mut FileState,
        session: &mut Session,
        report: &mut RunReport,
    ) -> Result<Flow> {
        let search = self.options.rule_search_paths(&state.working_dir);
        let rule = rules::resolve(&directive.identifier, &search)?;
        let header = rule.header();
        let file = state.path.display().to_string();
        debug!(rule = %rule.identifier, file = %file, lines = ?directive.line_numbers, "directive");

        let evaluator = self.evaluator.as_ref();
        let mut scope = HelperScope::new(&directive.reference, &mut state.store, session);
        let resolved = arguments::resolve(&rule, directive, evaluator, &mut scope)?;
        let mut ctx = Context::new(&mut scope);
        ctx.extend(arguments::bindings(directive));
        ctx.extend(resolved);

        let mut conditional = ConditionalEvaluator::new(self.options.max_loops, self.options.dry_run);
        if directive.conditional.kind.requires_prior_evaluation() {
            let go = conditional
                .evaluate(&directive.conditional, evaluator, &mut ctx)
                .map_err(|e| e.with_header(&header))?;
            if !go {
                info!(rule = %rule.identifier, file = %file, "skipped by conditional");
                report.skipped.push(SkipReport {
                    file,
                    rule: rule.identifier.clone(),
                    lines: directive.line_numbers.clone(),
                });
                return Ok(Flow::Continue);
            }
        }

        loop {
            for command in &rule.commands {
                let value = evaluator
                    .evaluate(&command.command, &mut ctx)
                    .map_err(|e| e.with_header(&header))?;
                for element in value.flatten().into_iter().filter(|v| !v.is_blank()) {
                    let step = self
                        .dispatch(element, &rule, command, directive, &state.working_dir, &mut state.halt, &mut ctx)
                        .map_err(|e| e.with_header(&header))?;
                    let success = step.success;
                    info!(
                        rule = %rule.identifier,
                        file = %file,
                        line = ?directive.line_numbers,
                        success,
                        "{}",
                        command.display_name()
                    );
                    report.steps.push(StepReport { file: file.clone(), ..step });

                    if !success && self.options.halt_on_errors {
                        warn!(rule = %rule.identifier, status = 1, "stopping on failed step");
                        report.status = ExitStatus::FAILURE;
                        report.halted = true;
                        return Ok(Flow::Stop);
                    }
                    if let Some(status) = state.halt.take() {
                        info!(rule = %rule.identifier, status = status.code(), "halt requested");
                        report.status = status;
                        report.halted = true;
                        return Ok(Flow::Stop);
                    }
                }
            }
            let again = conditional
                .evaluate(&directive.conditional, evaluator, &mut ctx)
                .map_err(|e| e.with_header(&header))?;
            if !again {
                return Ok(Flow::Continue);
            }
            debug!(rule = %rule.identifier, pass = conditional.counter() + 1, "repeating");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        element: Value,
        rule: &Rule,
        command: &RuleCommand,
        directive: &Directive,
        working_dir: &Path,
        halt: &mut Option<ExitStatus>,
        ctx: &mut Context<'_>,
    ) -> Result<StepReport> {
        let mut step = StepReport {
            file: String::new(),
            rule: rule.identifier.clone(),
            step: command.display_name().to_string(),
            lines: directive.line_numbers.clone(),
            success: true,
            command: None,
            exit_code: None,
        };
        match element {
            Value::Bool(b) => step.success = b,
            Value::Command(spec) => {
                let output = process::run(&spec, working_dir, &self.options)?;
                step.command = Some(spec.to_string());
                step.exit_code = Some(output.code);
                step.success = self.check_exit(command, output.code, ctx)?;
            }
            Value::Action(Action::Halt(status)) => {
                step.command = Some(format!("halt({})", status));
                *halt = Some(ExitStatus(status));
            }
            other => {
                return Err(OrdoError::execution(format!(
                    "command '{}' produced {} '{}', expected a boolean, a command or an action",
                    command.display_name(),
                    other.type_name(),
                    other
                )))
            }
        }
        Ok(step)
    }

    /// Evaluate the exit expression with `value` bound to the exit code.
    fn check_exit(&self, command: &RuleCommand, code: i32, ctx: &mut Context<'_>) -> Result<bool> {
        let shadowed = ctx.unbind("value");
        ctx.bind("value", Value::Int(i64::from(code)));
        let result = self.evaluator.evaluate_bool(command.exit_expression(), ctx);
        ctx.unbind("value");
        if let Some(v) = shadowed {
            ctx.bind("value", v);
        }
        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    const SHELL: &str = r#"
identifier: shell
name: Shell
arguments:
  - identifier: command
    required: true
    flag: "parameters.command"
commands:
  - name: Shell
    command: "getCommand('sh', '-c', command)"
"#;

    const CHECK: &str = r#"
identifier: check
name: Check
arguments:
  - identifier: ok
    default: "true"
    flag: "parameters.ok"
commands:
  - name: Check
    command: "ok"
"#;

    const STOP: &str = r#"
identifier: stop
name: Stop
arguments:
  - identifier: status
    default: "0"
    flag: "parameters.status"
commands:
  - command: "halt(status=status)"
"#;

    fn project(doc: &str) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("shell.yaml"), SHELL).unwrap();
        fs::write(dir.path().join("check.yaml"), CHECK).unwrap();
        fs::write(dir.path().join("stop.yaml"), STOP).unwrap();
        let file = dir.path().join("doc.sh");
        fs::write(&file, doc).unwrap();
        (dir, file)
    }

    fn options() -> ExecutionOptions {
        ExecutionOptions {
            bundled_rules: None,
            ..Default::default()
        }
    }

    #[test]
    fn exit_zero_succeeds_and_continues() {
        let (_dir, file) = project("# ordo: shell: { command: 'exit 0' }\n# ordo: check\n");
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus::SUCCESS);
        assert_eq!(report.steps.len(), 2);
        assert!(report.steps.iter().all(|s| s.success));
        assert_eq!(report.steps[0].exit_code, Some(0));
        assert_eq!(report.steps[0].command.as_deref(), Some("sh -c \"exit 0\""));
        assert!(!report.halted);
    }

    #[test]
    fn failure_without_halt_on_errors_keeps_going() {
        let (_dir, file) = project("# ordo: shell: { command: 'exit 1' }\n# ordo: check\n");
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus::SUCCESS);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.steps.len(), 2);
    }

    #[test]
    fn halt_on_errors_stops_the_run() {
        let (dir, file) = project(
            "# ordo: shell: { command: 'exit 1' }\n# ordo: shell: { command: 'touch after' }\n",
        );
        let opts = ExecutionOptions {
            halt_on_errors: true,
            ..options()
        };
        let report = Interpreter::new(opts).run(&[file]);
        assert_eq!(report.status, ExitStatus::FAILURE);
        assert!(report.halted);
        assert_eq!(report.steps.len(), 1);
        assert!(!dir.path().join("after").exists());
    }

    #[test]
    fn halt_action_adopts_status() {
        let (dir, file) = project("# ordo: stop: { status: 4 }\n# ordo: shell: { command: 'touch after' }\n");
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus(4));
        assert!(report.halted);
        assert!(!dir.path().join("after").exists());
    }

    #[test]
    fn unknown_parameter_fails_before_running() {
        let (dir, file) = project("# ordo: shell: { command: 'touch ran', colour: red }\n");
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus::EXCEPTION);
        assert!(report.steps.is_empty());
        assert!(report.error.unwrap().contains("unknown keys: colour"));
        assert!(!dir.path().join("ran").exists());
    }

    #[test]
    fn conditionals_gate_and_repeat() {
        let (_dir, file) = project(
            "# ordo: check if false\n# ordo: check: { ok: false } unless false\n# ordo: check while true\n",
        );
        let opts = ExecutionOptions {
            max_loops: 3,
            ..options()
        };
        let report = Interpreter::new(opts).run(&[file]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].lines, vec![1]);
        // one pass for `unless`, then three for `while` before the bound
        assert_eq!(report.steps.len(), 4);
        assert!(!report.steps[0].success);
    }

    #[test]
    fn exit_expression_must_be_boolean() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("odd.yaml"),
            "identifier: odd\nname: Odd\ncommands:\n  - command: \"getCommand('true')\"\n    exit: \"value\"\n",
        )
        .unwrap();
        let file = dir.path().join("doc.sh");
        fs::write(&file, "# ordo: odd\n").unwrap();
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus::EXCEPTION);
        let msg = report.error.unwrap();
        assert!(msg.starts_with("[rule odd ("));
        assert!(msg.contains("not boolean"));
    }

    #[test]
    fn dry_run_spawns_nothing() {
        let (dir, file) = project("# ordo: shell: { command: 'touch ran' }\n# ordo: check if true\n");
        let opts = ExecutionOptions {
            dry_run: true,
            ..options()
        };
        let report = Interpreter::new(opts).run(&[file]);
        assert_eq!(report.status, ExitStatus::SUCCESS);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(!dir.path().join("ran").exists());
    }

    #[test]
    fn file_without_directives_is_an_error() {
        let (_dir, file) = project("echo nothing here\n");
        let report = Interpreter::new(options()).run(&[file]);
        assert_eq!(report.status, ExitStatus::EXCEPTION);
        assert!(report.error.unwrap().contains("no directives"));
    }
}
