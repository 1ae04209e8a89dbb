//! Rule schema: a reusable definition of executable steps and their
//! parameter contract, loaded from `<identifier>.yaml`.
//!
//! Raw documents deserialize into `Option`-heavy shapes so validation can
//! report precise problems; `crate::rules` turns them into `Rule`.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Default, Deserialize)]
/// Rule document as written on disk.
pub struct RawRule {
    pub identifier: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub arguments: Vec<RawArgument>,
    #[serde(default)]
    pub commands: Vec<RawCommand>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawArgument {
    pub identifier: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawCommand {
    pub name: Option<String>,
    pub command: Option<String>,
    pub exit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// A validated rule.
pub struct Rule {
    pub identifier: String,
    pub name: String,
    pub authors: Vec<String>,
    pub arguments: Vec<Argument>,
    pub commands: Vec<RuleCommand>,
    /// File the rule was loaded from.
    pub path: PathBuf,
}

impl Rule {
    /// Diagnostic header used to prefix rule-specific errors.
    pub fn header(&self) -> String {
        format!("[rule {} ({})]", self.identifier, self.path.display())
    }

    pub fn declares(&self, key: &str) -> bool {
        self.arguments.iter().any(|a| a.identifier == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub identifier: String,
    pub required: bool,
    pub default: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleCommand {
    pub name: Option<String>,
    pub command: String,
    /// Exit-code check; `value == 0` when absent.
    pub exit: Option<String>,
}

impl RuleCommand {
    pub const DEFAULT_EXIT: &'static str = "value == 0";

    pub fn exit_expression(&self) -> &str {
        self.exit.as_deref().unwrap_or(Self::DEFAULT_EXIT)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}
