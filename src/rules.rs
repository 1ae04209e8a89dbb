//! Rule lookup and validation.
//!
//! A directive identifier `foo` names the first `foo.yaml` found along the
//! search list. The document is parsed into a `RawRule`, then validated in
//! two passes (header, body) before it becomes a `Rule`.

use crate::error::{OrdoError, Result};
use crate::models::rule::{RawArgument, RawCommand, RawRule};
use crate::models::{Argument, Rule, RuleCommand};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RULE_EXTENSION: &str = "yaml";

/// Argument identifiers that would shadow context bindings.
const RESERVED_ARGUMENTS: &[&str] = &["file", "files", "reference"];

/// First `<identifier>.yaml` along `paths`.
pub fn find(identifier: &str, paths: &[PathBuf]) -> Result<PathBuf> {
    let file_name = format!("{}.{}", identifier, RULE_EXTENSION);
    let mut searched = Vec::with_capacity(paths.len());
    for dir in paths {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return Ok(candidate);
        }
        searched.push(candidate);
    }
    Err(OrdoError::RuleNotFound {
        identifier: identifier.to_string(),
        searched,
    })
}

/// Locate, parse and validate the rule for `identifier`.
pub fn resolve(identifier: &str, paths: &[PathBuf]) -> Result<Rule> {
    let path = find(identifier, paths)?;
    let rule = load(identifier, &path)?;
    debug!(rule = %rule.identifier, path = %path.display(), "rule resolved");
    Ok(rule)
}

/// Parse and validate the rule file at `path`, expected to define `identifier`.
pub fn load(identifier: &str, path: &Path) -> Result<Rule> {
    let header = format!("[rule {} ({})]", identifier, path.display());
    let text = fs::read_to_string(path).map_err(|e| OrdoError::Rule {
        message: format!("{} cannot read rule file", header),
        source: Some(Box::new(e)),
    })?;
    let raw: RawRule = serde_yaml::from_str(&text).map_err(|e| OrdoError::Rule {
        message: format!("{} malformed rule: {}", header, e),
        source: Some(Box::new(e)),
    })?;
    validate_header(identifier, &raw).map_err(|e| e.with_header(&header))?;
    validate_body(raw, identifier, path).map_err(|e| e.with_header(&header))
}

fn validate_header(identifier: &str, raw: &RawRule) -> Result<()> {
    match raw.identifier.as_deref() {
        None => return Err(OrdoError::rule("rule has no identifier")),
        Some(id) if id != identifier => {
            return Err(OrdoError::rule(format!(
                "identifier '{}' does not match the requested rule '{}'",
                id, identifier
            )))
        }
        Some(_) => {}
    }
    if raw.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(OrdoError::rule("rule has no name"));
    }
    Ok(())
}

fn validate_body(raw: RawRule, identifier: &str, path: &Path) -> Result<Rule> {
    if raw.commands.is_empty() {
        return Err(OrdoError::rule("rule defines no commands"));
    }
    let commands = raw
        .commands
        .into_iter()
        .enumerate()
        .map(|(i, c)| command(i, c))
        .collect::<Result<Vec<_>>>()?;

    let mut seen = HashSet::new();
    let mut arguments = Vec::with_capacity(raw.arguments.len());
    for (i, a) in raw.arguments.into_iter().enumerate() {
        let arg = argument(i, a)?;
        if RESERVED_ARGUMENTS.contains(&arg.identifier.as_str()) {
            return Err(OrdoError::rule(format!(
                "argument '{}' uses a reserved identifier",
                arg.identifier
            )));
        }
        if !seen.insert(arg.identifier.clone()) {
            return Err(OrdoError::rule(format!(
                "argument '{}' is declared more than once",
                arg.identifier
            )));
        }
        arguments.push(arg);
    }

    Ok(Rule {
        identifier: identifier.to_string(),
        name: raw.name.unwrap_or_default(),
        authors: raw.authors,
        arguments,
        commands,
        path: path.to_path_buf(),
    })
}

fn command(index: usize, raw: RawCommand) -> Result<RuleCommand> {
    let command = raw
        .command
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| OrdoError::rule(format!("command #{} has no command expression", index + 1)))?;
    Ok(RuleCommand {
        name: raw.name,
        command,
        exit: raw.exit.filter(|e| !e.trim().is_empty()),
    })
}

fn argument(index: usize, raw: RawArgument) -> Result<Argument> {
    let identifier = raw
        .identifier
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| OrdoError::rule(format!("argument #{} has no identifier", index + 1)))?;
    if !raw.required && raw.default.is_none() && raw.flag.is_none() {
        return Err(OrdoError::rule(format!(
            "argument '{}' needs a default, a flag, or required: true",
            identifier
        )));
    }
    Ok(Argument {
        identifier,
        required: raw.required,
        default: raw.default,
        flag: raw.flag,
    })
}
