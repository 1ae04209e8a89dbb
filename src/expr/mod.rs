//! Sandboxed expression evaluation.
//!
//! Rule arguments, commands, exit checks and directive conditions are small
//! expression strings evaluated against a `Context` of named values. The
//! interpreter only depends on the `Evaluator` trait; `Expr` is the built-in
//! implementation. Expressions have no side effects of their own: function
//! calls are dispatched to the context's `Functions` host.

mod eval;
mod lexer;
mod parser;

use crate::error::{OrdoError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Typed result of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    File(PathBuf),
    Command(CommandSpec),
    Action(Action),
}

/// An external process invocation produced by `getCommand`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
}

/// Built-in action tokens executed by the interpreter instead of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the whole run with the given exit status.
    Halt(i32),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::File(_) => "file",
            Value::Command(_) => "command",
            Value::Action(_) => "action",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True when the value renders as whitespace only.
    pub fn is_blank(&self) -> bool {
        self.to_string().trim().is_empty()
    }

    /// Flatten nested lists depth-first into a single list of leaves.
    pub fn flatten(self) -> Vec<Value> {
        let mut out = Vec::new();
        flatten_into(self, &mut out);
        out
    }

    /// Convert a YAML scalar/sequence/mapping into a `Value`.
    ///
    /// Floats are kept as their textual form; non-string mapping keys are
    /// stringified.
    pub fn from_yaml(v: serde_yaml::Value) -> Value {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Text(n.to_string()),
            },
            serde_yaml::Value::String(s) => Value::Text(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::List(seq.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(k), Value::from_yaml(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }
}

fn yaml_key(k: serde_yaml::Value) -> String {
    match k {
        serde_yaml::Value::String(s) => s,
        other => Value::from_yaml(other).to_string(),
    }
}

fn flatten_into(v: Value, out: &mut Vec<Value>) {
    match v {
        Value::List(items) => {
            for it in items {
                flatten_into(it, out);
            }
        }
        other => out.push(other),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join(" "))
            }
            Value::Map(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::File(p) => write!(f, "{}", p.display()),
            Value::Command(c) => write!(f, "{}", c),
            Value::Action(Action::Halt(status)) => write!(f, "halt({})", status),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![quote(&self.program)];
        parts.extend(self.args.iter().map(|a| quote(a)));
        f.write_str(&parts.join(" "))
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('"', "\\\""))
    }
}

/// Host for function calls made from expressions.
pub trait Functions {
    fn call(&mut self, name: &str, args: Vec<Value>, named: BTreeMap<String, Value>)
        -> Result<Value>;
}

/// A `Functions` host that knows no functions.
pub struct NoFunctions;

impl Functions for NoFunctions {
    fn call(&mut self, name: &str, _: Vec<Value>, _: BTreeMap<String, Value>) -> Result<Value> {
        Err(OrdoError::evaluation(format!("unknown function '{}'", name)))
    }
}

/// Named values plus the function host visible to an expression.
pub struct Context<'a> {
    vars: BTreeMap<String, Value>,
    functions: &'a mut dyn Functions,
}

impl<'a> Context<'a> {
    pub fn new(functions: &'a mut dyn Functions) -> Self {
        Context {
            vars: BTreeMap::new(),
            functions,
        }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.vars.extend(values);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    fn call(&mut self, name: &str, args: Vec<Value>, named: BTreeMap<String, Value>) -> Result<Value> {
        self.functions.call(name, args, named)
    }
}

/// Maps an expression string and a context to one typed value.
pub trait Evaluator {
    fn evaluate(&self, source: &str, ctx: &mut Context<'_>) -> Result<Value>;

    /// Evaluate and require a boolean result.
    fn evaluate_bool(&self, source: &str, ctx: &mut Context<'_>) -> Result<bool> {
        let v = self.evaluate(source, ctx)?;
        v.as_bool().ok_or_else(|| {
            OrdoError::evaluation(format!(
                "expression `{}` is not boolean (got {} '{}')",
                source.trim(),
                v.type_name(),
                v
            ))
        })
    }
}

/// Built-in evaluator.
#[derive(Debug, Default, Clone, Copy)]
pub struct Expr;

impl Evaluator for Expr {
    fn evaluate(&self, source: &str, ctx: &mut Context<'_>) -> Result<Value> {
        let wrap = |e: OrdoError| {
            let message = format!("failed to evaluate `{}`: {}", source.trim(), e);
            OrdoError::Evaluation {
                message,
                source: Some(Box::new(e)),
            }
        };
        let ast = parser::parse(source).map_err(wrap)?;
        eval::eval(&ast, ctx).map_err(wrap)
    }
}

/// Check that `source` parses with the built-in grammar without evaluating it.
pub fn check_syntax(source: &str) -> Result<()> {
    parser::parse(source).map(|_| ()).map_err(|e| OrdoError::Evaluation {
        message: format!("malformed expression `{}`: {}", source.trim(), e),
        source: Some(Box::new(e)),
    })
}
