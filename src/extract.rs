//! Directive extraction.
//!
//! Directives live in comments: `% ordo: pdflatex: { shell: yes } if missing('pdf')`.
//! A line whose body starts with `-->` continues the directive above it.
//! Raw text is assembled first and parsed once the directive is closed, so a
//! parameter block may span several lines.

use crate::config::FileType;
use crate::error::{OrdoError, Result};
use crate::expr::{self, Value};
use crate::models::{Conditional, ConditionalType, Directive};
use regex::Regex;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DIRECTIVE_PATTERN: &str =
    r"^(\w+)\s*(?::\s*(\{.*\})\s*)?(?:\s+(if|while|until|unless)\s+(\S.*))?$";
const CONTINUATION_PATTERN: &str = r"^\s*-->\s(.*)$";

/// Parameter keys bound by the extractor itself.
const RESERVED_KEYS: &[&str] = &["file", "reference"];

/// Compiled patterns for one file type.
#[derive(Debug, Clone)]
pub struct Syntax {
    header: Regex,
    directive: Regex,
    continuation: Regex,
}

impl Syntax {
    pub fn for_file_type(file_type: &FileType) -> Result<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| OrdoError::Config {
                message: format!("invalid directive pattern for '{}'", file_type.extension),
                source: Some(Box::new(e)),
            })
        };
        Ok(Syntax {
            header: compile(&format!(r"{}ordo:\s*(.*)$", file_type.pattern))?,
            directive: compile(DIRECTIVE_PATTERN)?,
            continuation: compile(CONTINUATION_PATTERN)?,
        })
    }
}

/// Directive text before parsing, with the lines it came from.
#[derive(Debug)]
struct RawDirective {
    lines: Vec<usize>,
    text: String,
}

/// Find the input file: `input` itself when it exists, otherwise `input.<ext>`
/// for each configured file type in order.
pub fn locate(input: &Path, file_types: &[FileType]) -> Result<(PathBuf, FileType)> {
    if input.is_file() {
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        return file_types
            .iter()
            .find(|ft| ft.extension == ext)
            .map(|ft| (input.to_path_buf(), ft.clone()))
            .ok_or_else(|| {
                OrdoError::extraction(
                    format!(
                        "{} has an unsupported extension; known file types: {}",
                        input.display(),
                        file_types
                            .iter()
                            .map(|ft| ft.extension.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                    vec![],
                )
            });
    }
    let mut tried = Vec::new();
    for ft in file_types {
        let mut name = OsString::from(input.as_os_str());
        name.push(".");
        name.push(&ft.extension);
        let candidate = PathBuf::from(name);
        if candidate.is_file() {
            return Ok((candidate, ft.clone()));
        }
        tried.push(candidate.display().to_string());
    }
    Err(OrdoError::extraction(
        format!(
            "cannot find {}; tried: {}",
            input.display(),
            tried.join(", ")
        ),
        vec![],
    ))
}

/// Read `path` and extract its directives, with `preamble` lines first.
pub fn extract(path: &Path, file_type: &FileType, preamble: &[String]) -> Result<Vec<Directive>> {
    let bytes = fs::read(path).map_err(|e| OrdoError::Extraction {
        message: format!("cannot read {}", path.display()),
        lines: vec![],
        source: Some(Box::new(e)),
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let syntax = Syntax::for_file_type(file_type)?;
    let lines = preamble
        .iter()
        .map(|l| (0, l.as_str()))
        .chain(content.lines().enumerate().map(|(i, l)| (i + 1, l)));
    let directives = extract_lines(&syntax, lines, path)?;
    debug!(file = %path.display(), count = directives.len(), "directives extracted");
    Ok(directives)
}

/// Extract directives from numbered lines belonging to `reference`.
pub fn extract_lines<'a>(
    syntax: &Syntax,
    lines: impl IntoIterator<Item = (usize, &'a str)>,
    reference: &Path,
) -> Result<Vec<Directive>> {
    let mut raws: Vec<RawDirective> = Vec::new();
    let mut open: Option<RawDirective> = None;
    for (number, line) in lines {
        let Some(caps) = syntax.header.captures(line) else {
            continue;
        };
        let body = caps.get(1).map(|m| m.as_str()).unwrap_or("").trim_end();
        if let Some(cont) = syntax.continuation.captures(body) {
            let rest = cont.get(1).map(|m| m.as_str()).unwrap_or("").trim();
            match open.as_mut() {
                Some(raw) => {
                    raw.text.push(' ');
                    raw.text.push_str(rest);
                    raw.lines.push(number);
                }
                None => {
                    return Err(OrdoError::extraction(
                        format!("line {}: continuation without a directive to continue", number),
                        vec![number],
                    ))
                }
            }
        } else {
            if let Some(raw) = open.take() {
                raws.push(raw);
            }
            open = Some(RawDirective {
                lines: vec![number],
                text: body.trim().to_string(),
            });
        }
    }
    raws.extend(open);

    let mut out = Vec::new();
    for raw in raws {
        out.extend(parse_directive(syntax, raw, reference)?);
    }
    Ok(out)
}

fn parse_directive(syntax: &Syntax, raw: RawDirective, reference: &Path) -> Result<Vec<Directive>> {
    let RawDirective { lines, text } = raw;
    let caps = syntax.directive.captures(&text).ok_or_else(|| {
        OrdoError::extraction(
            format!("{}: malformed directive '{}'", describe(&lines), text),
            lines.clone(),
        )
    })?;
    let identifier = caps[1].to_string();

    let mut parameters = match caps.get(2) {
        Some(block) => parse_parameters(block.as_str(), &lines)?,
        None => BTreeMap::new(),
    };
    for key in RESERVED_KEYS {
        if parameters.contains_key(*key) {
            return Err(OrdoError::extraction(
                format!(
                    "{}: '{}' is a reserved parameter of directive '{}'",
                    describe(&lines),
                    key,
                    identifier
                ),
                lines,
            ));
        }
    }

    let conditional = match (caps.get(3), caps.get(4)) {
        (Some(keyword), Some(condition)) => {
            let kind =
                ConditionalType::from_keyword(keyword.as_str()).unwrap_or(ConditionalType::None);
            let condition = condition.as_str().trim();
            expr::check_syntax(condition).map_err(|e| OrdoError::Extraction {
                message: format!("{}: {}", describe(&lines), e),
                lines: lines.clone(),
                source: Some(Box::new(e)),
            })?;
            Conditional::new(kind, condition)
        }
        _ => Conditional::none(),
    };

    let targets = match parameters.remove("files") {
        Some(files) => expand_files(files, reference, &lines)?,
        None => vec![reference.to_path_buf()],
    };

    Ok(targets
        .into_iter()
        .map(|target| {
            let mut parameters = parameters.clone();
            parameters.insert("reference".to_string(), Value::File(target.clone()));
            Directive {
                identifier: identifier.clone(),
                parameters,
                conditional: conditional.clone(),
                line_numbers: lines.clone(),
                reference: target,
            }
        })
        .collect())
}

fn parse_parameters(block: &str, lines: &[usize]) -> Result<BTreeMap<String, Value>> {
    let mapping: serde_yaml::Mapping =
        serde_yaml::from_str(block).map_err(|e| OrdoError::Extraction {
            message: format!("{}: malformed parameters {}: {}", describe(lines), block, e),
            lines: lines.to_vec(),
            source: Some(Box::new(e)),
        })?;
    match Value::from_yaml(serde_yaml::Value::Mapping(mapping)) {
        Value::Map(map) => Ok(map),
        _ => Ok(BTreeMap::new()),
    }
}

/// `files` entries resolve against the directory of the owning file.
fn expand_files(files: Value, reference: &Path, lines: &[usize]) -> Result<Vec<PathBuf>> {
    let base = match reference.parent() {
        Some(p) => p.to_path_buf(),
        None => PathBuf::new(),
    };
    let names: Vec<String> = files
        .flatten()
        .into_iter()
        .filter(|v| !v.is_blank())
        .map(|v| v.to_string())
        .collect();
    if names.is_empty() {
        return Err(OrdoError::extraction(
            format!("{}: 'files' must list at least one file", describe(lines)),
            lines.to_vec(),
        ));
    }
    Ok(names.into_iter().map(|n| base.join(n)).collect())
}

fn describe(lines: &[usize]) -> String {
    match lines {
        [] => "directive".to_string(),
        [one] => format!("line {}", one),
        many => format!(
            "lines {}",
            many.iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_file_types;
    use tempfile::tempdir;

    fn tex() -> FileType {
        default_file_types().remove(0)
    }

    fn run(src: &str) -> Result<Vec<Directive>> {
        let syntax = Syntax::for_file_type(&tex()).unwrap();
        let lines = src.lines().enumerate().map(|(i, l)| (i + 1, l));
        extract_lines(&syntax, lines, Path::new("/work/doc.tex"))
    }

    #[test]
    fn one_directive_per_line_in_order() {
        let ds = run("% ordo: pdflatex\n\\begin{document}\n  %  ordo: bibtex\n% ordo: clean\n").unwrap();
        let ids: Vec<_> = ds.iter().map(|d| d.identifier.as_str()).collect();
        assert_eq!(ids, ["pdflatex", "bibtex", "clean"]);
        assert_eq!(ds[0].line_numbers, vec![1]);
        assert_eq!(ds[1].line_numbers, vec![3]);
        assert_eq!(ds[2].line_numbers, vec![4]);
        assert_eq!(
            ds[0].parameters.get("reference"),
            Some(&Value::File(PathBuf::from("/work/doc.tex")))
        );
        assert_eq!(ds[0].conditional, Conditional::none());
    }

    #[test]
    fn continuation_lines_merge() {
        let src = "% ordo: pdflatex: {\n% ordo: --> shell: yes,\n% ordo: -->   mode: draft }\n% ordo: --> if missing('pdf')\n";
        let ds = run(src).unwrap();
        assert_eq!(ds.len(), 1);
        let d = &ds[0];
        assert_eq!(d.line_numbers, vec![1, 2, 3, 4]);
        assert_eq!(d.parameters.get("shell"), Some(&Value::text("yes")));
        assert_eq!(d.parameters.get("mode"), Some(&Value::text("draft")));
        assert_eq!(d.conditional, Conditional::new(ConditionalType::If, "missing('pdf')"));
    }

    #[test]
    fn conditional_keywords() {
        let ds = run(
            "% ordo: a while changed('aux')\n% ordo: b: { x: 1 } until value == 3\n% ordo: c unless exists('pdf')\n",
        )
        .unwrap();
        assert_eq!(ds[0].conditional.kind, ConditionalType::While);
        assert_eq!(ds[1].conditional.kind, ConditionalType::Until);
        assert_eq!(ds[1].parameters.get("x"), Some(&Value::Int(1)));
        assert_eq!(ds[2].conditional.kind, ConditionalType::Unless);
    }

    #[test]
    fn malformed_input_reports_lines() {
        let err = run("% ordo: a\n% ordo: b: { x: [1 }\n").unwrap_err();
        assert_eq!(err.lines(), &[2]);
        assert!(err.to_string().contains("malformed parameters"));

        let err = run("% ordo: a if missing(\n").unwrap_err();
        assert_eq!(err.lines(), &[1]);

        let err = run("% ordo: --> orphan\n").unwrap_err();
        assert_eq!(err.lines(), &[1]);

        let err = run("% ordo: not a directive!\n").unwrap_err();
        assert!(err.to_string().contains("malformed directive"));
    }

    #[test]
    fn reserved_keys_and_files_expansion() {
        let err = run("% ordo: a: { reference: x }\n").unwrap_err();
        assert!(err.to_string().contains("reserved"));
        assert!(run("% ordo: a: { file: x }\n").is_err());

        let ds = run("% ordo: makeindex: { files: [a.idx, b.idx], style: s }\n").unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].reference, PathBuf::from("/work/a.idx"));
        assert_eq!(ds[1].reference, PathBuf::from("/work/b.idx"));
        assert!(ds.iter().all(|d| !d.parameters.contains_key("files")));
        assert!(ds.iter().all(|d| d.parameters.get("style") == Some(&Value::text("s"))));
    }

    #[test]
    fn extract_reads_file_with_preamble() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.tex");
        fs::write(&file, "\\documentclass{article}\n% ordo: pdflatex\n").unwrap();
        let ds = extract(&file, &tex(), &["% ordo: clean".to_string()]).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].identifier, "clean");
        assert_eq!(ds[0].line_numbers, vec![0]);
        assert_eq!(ds[1].line_numbers, vec![2]);

        assert!(extract(&dir.path().join("none.tex"), &tex(), &[]).is_err());
    }

    #[test]
    fn locate_tries_extensions_in_order() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("doc.sh"), "# ordo: shell\n").unwrap();
        let types = default_file_types();
        let (path, ft) = locate(&dir.path().join("doc"), &types).unwrap();
        assert_eq!(path, dir.path().join("doc.sh"));
        assert_eq!(ft.extension, "sh");

        let (path, _) = locate(&dir.path().join("doc.sh"), &types).unwrap();
        assert_eq!(path, dir.path().join("doc.sh"));

        let err = locate(&dir.path().join("nothing"), &types).unwrap_err();
        assert!(err.to_string().contains("nothing.tex"));

        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert!(locate(&dir.path().join("notes.txt"), &types).is_err());
    }
}
