//! Error type shared by every stage of the interpreter.
//!
//! Each variant names where a failure originated; all of them carry a
//! human-readable message and, when there is one, the underlying cause.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

type Cause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum OrdoError {
    /// Malformed directive syntax or an unreadable source file.
    #[error("{message}")]
    Extraction {
        message: String,
        lines: Vec<usize>,
        #[source]
        source: Option<Cause>,
    },
    #[error("rule '{identifier}' not found; searched: {}", display_paths(.searched))]
    RuleNotFound {
        identifier: String,
        searched: Vec<PathBuf>,
    },
    /// Malformed rule file or failed header/body validation.
    #[error("{message}")]
    Rule {
        message: String,
        #[source]
        source: Option<Cause>,
    },
    #[error("{message}")]
    Argument {
        message: String,
        #[source]
        source: Option<Cause>,
    },
    #[error("{message}")]
    Evaluation {
        message: String,
        #[source]
        source: Option<Cause>,
    },
    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<Cause>,
    },
    #[error("process '{command}' timed out after {millis}ms")]
    Timeout { command: String, millis: u64 },
    #[error("{message}")]
    Config {
        message: String,
        #[source]
        source: Option<Cause>,
    },
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, OrdoError>;

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OrdoError {
    pub fn extraction(message: impl Into<String>, lines: Vec<usize>) -> Self {
        OrdoError::Extraction {
            message: message.into(),
            lines,
            source: None,
        }
    }

    pub fn rule(message: impl Into<String>) -> Self {
        OrdoError::Rule {
            message: message.into(),
            source: None,
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        OrdoError::Argument {
            message: message.into(),
            source: None,
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        OrdoError::Evaluation {
            message: message.into(),
            source: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        OrdoError::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        OrdoError::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        OrdoError::Io {
            path: path.into(),
            source,
        }
    }

    /// Prefix the message with a rule diagnostic header such as
    /// `[rule shell (rules/shell.yaml)]`.
    ///
    /// Errors that already name their origin (not found, timeouts, I/O) are
    /// wrapped into an `Execution` error so the header is never lost.
    pub fn with_header(self, header: &str) -> Self {
        if header.is_empty() {
            return self;
        }
        match self {
            OrdoError::Rule { message, source } => OrdoError::Rule {
                message: format!("{} {}", header, message),
                source,
            },
            OrdoError::Argument { message, source } => OrdoError::Argument {
                message: format!("{} {}", header, message),
                source,
            },
            OrdoError::Evaluation { message, source } => OrdoError::Evaluation {
                message: format!("{} {}", header, message),
                source,
            },
            OrdoError::Execution { message, source } => OrdoError::Execution {
                message: format!("{} {}", header, message),
                source,
            },
            other => OrdoError::Execution {
                message: format!("{} {}", header, other),
                source: Some(Box::new(other)),
            },
        }
    }

    /// Line numbers an extraction error is tied to, if any.
    pub fn lines(&self) -> &[usize] {
        match self {
            OrdoError::Extraction { lines, .. } => lines,
            _ => &[],
        }
    }
}
