//! Shared data models: directives, rules, and run/check reports.

pub mod directive;
pub mod rule;

pub use directive::{Conditional, ConditionalType, Directive};
pub use rule::{Argument, Rule, RuleCommand};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
/// Process exit status of an interpreter run.
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);
    /// A step failed under halt-on-errors.
    pub const FAILURE: ExitStatus = ExitStatus(1);
    /// An error terminated the run before normal completion.
    pub const EXCEPTION: ExitStatus = ExitStatus(2);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        ExitStatus::SUCCESS
    }
}

#[derive(Debug, Clone, Serialize)]
/// Outcome of one dispatched command element.
pub struct StepReport {
    pub file: String,
    pub rule: String,
    pub step: String,
    pub lines: Vec<usize>,
    pub success: bool,
    /// Rendered command line for process elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
/// Directive that was not executed because its prior conditional was false.
pub struct SkipReport {
    pub file: String,
    pub rule: String,
    pub lines: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
/// Results of an interpreter run over one or more files.
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub skipped: Vec<SkipReport>,
    pub status: ExitStatus,
    /// Set when the run was cut short by halt-on-errors or a halt request.
    pub halted: bool,
    /// Error that aborted the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| !s.success).count()
    }
}

#[derive(Debug, Clone, Serialize)]
/// A static problem found by `ordo check`.
pub struct Issue {
    pub file: String,
    pub lines: Vec<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
/// Static check results.
pub struct CheckReport {
    pub issues: Vec<Issue>,
    pub files: usize,
    pub directives: usize,
}
