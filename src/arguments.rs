//! Binds directive parameters to the arguments a rule declares.

use crate::error::{OrdoError, Result};
use crate::expr::{Context, Evaluator, Functions, Value};
use crate::models::{Directive, Rule};
use std::collections::BTreeMap;

/// Names every expression for `directive` can see, besides helpers:
/// `parameters`, `reference` and `file` (the reference's file name).
pub fn bindings(directive: &Directive) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    out.insert(
        "parameters".to_string(),
        Value::Map(directive.parameters.clone()),
    );
    out.insert(
        "reference".to_string(),
        Value::File(directive.reference.clone()),
    );
    out.insert(
        "file".to_string(),
        Value::Text(
            directive
                .reference
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        ),
    );
    out
}

/// Resolve the argument map for `directive` against `rule`.
///
/// The result holds one entry per declared argument plus `reference`.
/// Failures carry the rule header.
pub fn resolve(
    rule: &Rule,
    directive: &Directive,
    evaluator: &dyn Evaluator,
    functions: &mut dyn Functions,
) -> Result<BTreeMap<String, Value>> {
    resolve_arguments(rule, directive, evaluator, functions).map_err(|e| e.with_header(&rule.header()))
}

fn resolve_arguments(
    rule: &Rule,
    directive: &Directive,
    evaluator: &dyn Evaluator,
    functions: &mut dyn Functions,
) -> Result<BTreeMap<String, Value>> {
    let unknown: Vec<&str> = directive
        .supplied_keys()
        .filter(|k| !rule.declares(k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(OrdoError::argument(format!(
            "unknown keys: {}",
            unknown.join(", ")
        )));
    }

    let mut ctx = Context::new(functions);
    ctx.extend(bindings(directive));

    let mut resolved = BTreeMap::new();
    for arg in &rule.arguments {
        let supplied = directive.parameters.contains_key(&arg.identifier);
        if arg.required && !supplied {
            return Err(OrdoError::argument(format!(
                "missing required argument '{}'",
                arg.identifier
            )));
        }
        let mut value = match &arg.default {
            Some(src) => evaluator.evaluate(src, &mut ctx)?,
            None => Value::text(""),
        };
        if supplied {
            if let Some(flag) = &arg.flag {
                value = evaluator.evaluate(flag, &mut ctx)?;
            }
        }
        resolved.insert(arg.identifier.clone(), value);
    }
    resolved.insert(
        "reference".to_string(),
        Value::File(directive.reference.clone()),
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Expr, NoFunctions};
    use crate::models::{Argument, Conditional, RuleCommand};
    use std::path::PathBuf;

    fn rule(arguments: Vec<Argument>) -> Rule {
        Rule {
            identifier: "demo".into(),
            name: "Demo".into(),
            authors: vec![],
            arguments,
            commands: vec![RuleCommand {
                name: None,
                command: "true".into(),
                exit: None,
            }],
            path: PathBuf::from("rules/demo.yaml"),
        }
    }

    fn arg(id: &str, default: Option<&str>, flag: Option<&str>) -> Argument {
        Argument {
            identifier: id.into(),
            required: false,
            default: default.map(String::from),
            flag: flag.map(String::from),
        }
    }

    fn directive(params: &[(&str, Value)]) -> Directive {
        let reference = PathBuf::from("/work/doc.tex");
        let mut parameters: BTreeMap<String, Value> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        parameters.insert("reference".into(), Value::File(reference.clone()));
        Directive {
            identifier: "demo".into(),
            parameters,
            conditional: Conditional::none(),
            line_numbers: vec![1],
            reference,
        }
    }

    fn run(rule: &Rule, d: &Directive) -> Result<BTreeMap<String, Value>> {
        resolve(rule, d, &Expr, &mut NoFunctions)
    }

    #[test]
    fn default_applies_when_key_absent() {
        let r = rule(vec![arg("mode", Some("'x'"), Some("'y'"))]);
        let out = run(&r, &directive(&[])).unwrap();
        assert_eq!(out.get("mode"), Some(&Value::text("x")));
        assert_eq!(
            out.get("reference"),
            Some(&Value::File(PathBuf::from("/work/doc.tex")))
        );
    }

    #[test]
    fn flag_overrides_when_key_supplied() {
        let r = rule(vec![arg("mode", Some("'x'"), Some("'y'"))]);
        let out = run(&r, &directive(&[("mode", Value::Bool(true))])).unwrap();
        assert_eq!(out.get("mode"), Some(&Value::text("y")));

        let r = rule(vec![arg("mode", None, Some("'-mode=' + parameters.mode"))]);
        let out = run(&r, &directive(&[("mode", Value::text("draft"))])).unwrap();
        assert_eq!(out.get("mode"), Some(&Value::text("-mode=draft")));
    }

    #[test]
    fn missing_default_is_empty_text() {
        let r = rule(vec![arg("opt", None, Some("'z'"))]);
        let out = run(&r, &directive(&[])).unwrap();
        assert_eq!(out.get("opt"), Some(&Value::text("")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let r = rule(vec![arg("mode", Some("''"), None)]);
        let err = run(&r, &directive(&[("colour", Value::text("red"))])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[rule demo (rules/demo.yaml)] unknown keys: colour"
        );
    }

    #[test]
    fn required_argument_must_be_supplied() {
        let mut a = arg("command", None, Some("parameters.command"));
        a.required = true;
        let r = rule(vec![a]);
        let err = run(&r, &directive(&[])).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'command'"));
        let out = run(&r, &directive(&[("command", Value::text("ls"))])).unwrap();
        assert_eq!(out.get("command"), Some(&Value::text("ls")));
    }

    #[test]
    fn evaluation_failures_carry_header() {
        let r = rule(vec![arg("x", Some("undefined_name"), None)]);
        let err = run(&r, &directive(&[])).unwrap_err();
        assert!(err.to_string().starts_with("[rule demo (rules/demo.yaml)]"));
        assert!(matches!(err, OrdoError::Evaluation { .. }));
    }
}
