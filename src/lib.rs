//! Ordo core library.
//!
//! Ordo runs build steps that documents declare in their own comments.
//! A directive such as `% ordo: pdflatex: { shell: yes } while changed('aux')`
//! names a YAML rule; the rule's command expressions are evaluated and the
//! resulting processes or built-in actions run in document order.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `extract`: Directive extraction from commented source files.
//! - `rules`: Rule lookup along the search path and validation.
//! - `arguments`: Binding directive parameters to rule arguments.
//! - `conditional`: The if/while/until/unless gate and loop bound.
//! - `interpreter`: The execution engine producing a `RunReport`.
//! - `process`: Child processes with capture, streaming and timeouts.
//! - `store`: Per-project content checksums behind `changed()`.
//! - `expr`, `helpers`: Expression evaluator and the functions it can call.
//! - `check`: Static validation across files, in parallel.
//! - `models`: Directives, rules and report structs.
//! - `output`: Human/JSON printers for run/check.
//! - `utils`: Supporting helpers.
pub mod arguments;
pub mod check;
pub mod cli;
pub mod conditional;
pub mod config;
pub mod error;
pub mod expr;
pub mod extract;
pub mod helpers;
pub mod interpreter;
pub mod models;
pub mod output;
pub mod process;
pub mod rules;
pub mod store;
pub mod utils;

pub use error::{OrdoError, Result};
