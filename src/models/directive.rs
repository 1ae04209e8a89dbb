//! Directive schema: one embedded instruction extracted from a source file.

use crate::expr::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// Kind of gating attached to a directive.
pub enum ConditionalType {
    None,
    If,
    While,
    Until,
    Unless,
}

impl ConditionalType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "if" => Some(ConditionalType::If),
            "while" => Some(ConditionalType::While),
            "until" => Some(ConditionalType::Until),
            "unless" => Some(ConditionalType::Unless),
            _ => None,
        }
    }

    /// Whether the condition is tested once before the first execution.
    /// `until` and unconditional directives always run at least once.
    pub fn requires_prior_evaluation(self) -> bool {
        matches!(
            self,
            ConditionalType::If | ConditionalType::While | ConditionalType::Unless
        )
    }
}

impl fmt::Display for ConditionalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionalType::None => "none",
            ConditionalType::If => "if",
            ConditionalType::While => "while",
            ConditionalType::Until => "until",
            ConditionalType::Unless => "unless",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conditional {
    #[serde(rename = "type")]
    pub kind: ConditionalType,
    /// Expression text; empty when `kind` is `None`.
    pub condition: String,
}

impl Conditional {
    pub fn none() -> Self {
        Conditional {
            kind: ConditionalType::None,
            condition: String::new(),
        }
    }

    pub fn new(kind: ConditionalType, condition: impl Into<String>) -> Self {
        Conditional {
            kind,
            condition: condition.into(),
        }
    }
}

impl Default for Conditional {
    fn default() -> Self {
        Conditional::none()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A parsed directive. `parameters` always carries a `reference` entry
/// pointing at the owning file.
pub struct Directive {
    pub identifier: String,
    pub parameters: BTreeMap<String, Value>,
    pub conditional: Conditional,
    /// 1-based source lines that contributed to this directive (0 for preamble lines).
    pub line_numbers: Vec<usize>,
    pub reference: PathBuf,
}

impl Directive {
    /// Parameter keys supplied by the author, without the implicit `reference`.
    pub fn supplied_keys(&self) -> impl Iterator<Item = &String> {
        self.parameters.keys().filter(|k| k.as_str() != "reference")
    }
}
