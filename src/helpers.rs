//! Functions available to rule and condition expressions.
//!
//! The set is closed: `Helper` enumerates every callable name and
//! `HelperScope` dispatches calls for one directive evaluation, with access
//! to the reference file, the project's change store and the run session.

use crate::error::{OrdoError, Result};
use crate::expr::{Action, CommandSpec, Functions, Value};
use crate::store::ChangeStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Helper {
    GetCommand,
    GetCommandWithWorkingDirectory,
    Halt,
    ToFile,
    Exists,
    Missing,
    Changed,
    Unchanged,
    IsTrue,
    IsFalse,
    IsEmpty,
    IsNotEmpty,
    GetBasename,
    GetExtension,
    GetFullBasename,
    IsWindows,
    IsUnix,
    SessionPut,
    SessionGet,
    SessionContains,
    SessionRemove,
    ThrowError,
}

impl Helper {
    pub const ALL: &'static [Helper] = &[
        Helper::GetCommand,
        Helper::GetCommandWithWorkingDirectory,
        Helper::Halt,
        Helper::ToFile,
        Helper::Exists,
        Helper::Missing,
        Helper::Changed,
        Helper::Unchanged,
        Helper::IsTrue,
        Helper::IsFalse,
        Helper::IsEmpty,
        Helper::IsNotEmpty,
        Helper::GetBasename,
        Helper::GetExtension,
        Helper::GetFullBasename,
        Helper::IsWindows,
        Helper::IsUnix,
        Helper::SessionPut,
        Helper::SessionGet,
        Helper::SessionContains,
        Helper::SessionRemove,
        Helper::ThrowError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Helper::GetCommand => "getCommand",
            Helper::GetCommandWithWorkingDirectory => "getCommandWithWorkingDirectory",
            Helper::Halt => "halt",
            Helper::ToFile => "toFile",
            Helper::Exists => "exists",
            Helper::Missing => "missing",
            Helper::Changed => "changed",
            Helper::Unchanged => "unchanged",
            Helper::IsTrue => "isTrue",
            Helper::IsFalse => "isFalse",
            Helper::IsEmpty => "isEmpty",
            Helper::IsNotEmpty => "isNotEmpty",
            Helper::GetBasename => "getBasename",
            Helper::GetExtension => "getExtension",
            Helper::GetFullBasename => "getFullBasename",
            Helper::IsWindows => "isWindows",
            Helper::IsUnix => "isUnix",
            Helper::SessionPut => "sessionPut",
            Helper::SessionGet => "sessionGet",
            Helper::SessionContains => "sessionContains",
            Helper::SessionRemove => "sessionRemove",
            Helper::ThrowError => "throwError",
        }
    }

    pub fn from_name(name: &str) -> Option<Helper> {
        Helper::ALL.iter().copied().find(|h| h.name() == name)
    }
}

/// Key/value table shared by all directives of one run.
#[derive(Debug, Default)]
pub struct Session {
    values: BTreeMap<String, Value>,
}

impl Session {
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

/// Function host for one evaluation scope.
pub struct HelperScope<'a> {
    reference: &'a Path,
    store: &'a mut ChangeStore,
    session: &'a mut Session,
}

impl<'a> HelperScope<'a> {
    pub fn new(reference: &'a Path, store: &'a mut ChangeStore, session: &'a mut Session) -> Self {
        HelperScope {
            reference,
            store,
            session,
        }
    }

    fn base_dir(&self) -> PathBuf {
        match self.reference.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Text arguments swap the reference file's extension; `File` arguments
    /// name a path directly.
    fn target(&self, helper: Helper, v: &Value) -> Result<PathBuf> {
        match v {
            Value::Text(ext) => Ok(self.reference.with_extension(ext.trim_start_matches('.'))),
            Value::File(p) => Ok(p.clone()),
            other => Err(OrdoError::evaluation(format!(
                "{}() expects an extension or a file, got {}",
                helper.name(),
                other.type_name()
            ))),
        }
    }

    fn path_arg(&self, helper: Helper, args: &[Value]) -> Result<PathBuf> {
        match args.first() {
            None => Ok(self.reference.to_path_buf()),
            Some(Value::File(p)) => Ok(p.clone()),
            Some(Value::Text(s)) => Ok(PathBuf::from(s)),
            Some(other) => Err(OrdoError::evaluation(format!(
                "{}() expects a path, got {}",
                helper.name(),
                other.type_name()
            ))),
        }
    }

    fn resolve(&self, p: &str) -> PathBuf {
        let path = PathBuf::from(p);
        if path.is_absolute() {
            path
        } else {
            self.base_dir().join(path)
        }
    }
}

impl Functions for HelperScope<'_> {
    fn call(
        &mut self,
        name: &str,
        args: Vec<Value>,
        mut named: BTreeMap<String, Value>,
    ) -> Result<Value> {
        let helper = Helper::from_name(name)
            .ok_or_else(|| OrdoError::evaluation(format!("unknown function '{}'", name)))?;
        // `halt(status=...)` is the only helper taking a named argument.
        let status = if helper == Helper::Halt {
            named.remove("status")
        } else {
            None
        };
        if let Some(key) = named.keys().next() {
            return Err(OrdoError::evaluation(format!(
                "{}() has no parameter '{}'",
                helper.name(),
                key
            )));
        }
        match helper {
            Helper::GetCommand => {
                arity(helper, &args, 1, usize::MAX)?;
                command(args, None)
            }
            Helper::GetCommandWithWorkingDirectory => {
                arity(helper, &args, 2, usize::MAX)?;
                let mut args = args;
                let dir = match args.remove(0) {
                    Value::File(p) => p,
                    Value::Text(s) => self.resolve(&s),
                    other => {
                        return Err(OrdoError::evaluation(format!(
                            "working directory must be a path, got {}",
                            other.type_name()
                        )))
                    }
                };
                command(args, Some(dir))
            }
            Helper::Halt => {
                arity(helper, &args, 0, 1)?;
                let v = status.or_else(|| args.into_iter().next()).unwrap_or(Value::Int(0));
                let code = v.as_int().ok_or_else(|| {
                    OrdoError::evaluation(format!("halt status must be an integer, got '{}'", v))
                })?;
                let code = i32::try_from(code)
                    .map_err(|_| OrdoError::evaluation(format!("halt status {} out of range", code)))?;
                Ok(Value::Action(Action::Halt(code)))
            }
            Helper::ToFile => {
                arity(helper, &args, 1, 1)?;
                Ok(Value::File(self.resolve(&args[0].to_string())))
            }
            Helper::Exists | Helper::Missing => {
                arity(helper, &args, 1, 1)?;
                let found = self.target(helper, &args[0])?.exists();
                Ok(Value::Bool(if helper == Helper::Exists { found } else { !found }))
            }
            Helper::Changed | Helper::Unchanged => {
                arity(helper, &args, 1, 1)?;
                let path = self.target(helper, &args[0])?;
                let changed = self.store.has_changed(&path)?;
                Ok(Value::Bool(if helper == Helper::Changed { changed } else { !changed }))
            }
            Helper::IsTrue | Helper::IsFalse | Helper::IsEmpty | Helper::IsNotEmpty => {
                arity(helper, &args, 1, 3)?;
                let mut it = args.into_iter();
                let subject = it.next().unwrap_or(Value::Null);
                let holds = match helper {
                    Helper::IsTrue => truthy(&subject),
                    Helper::IsFalse => falsy(&subject),
                    Helper::IsEmpty => subject.is_blank(),
                    _ => !subject.is_blank(),
                };
                select(holds, it.next(), it.next())
            }
            Helper::GetBasename => {
                arity(helper, &args, 0, 1)?;
                let p = self.path_arg(helper, &args)?;
                Ok(Value::Text(stem(&p)))
            }
            Helper::GetExtension => {
                arity(helper, &args, 0, 1)?;
                let p = self.path_arg(helper, &args)?;
                Ok(Value::Text(
                    p.extension()
                        .map(|e| e.to_string_lossy().to_string())
                        .unwrap_or_default(),
                ))
            }
            Helper::GetFullBasename => {
                arity(helper, &args, 0, 1)?;
                let p = self.path_arg(helper, &args)?;
                Ok(Value::Text(p.with_extension("").to_string_lossy().to_string()))
            }
            Helper::IsWindows | Helper::IsUnix => {
                arity(helper, &args, 0, 2)?;
                let holds = if helper == Helper::IsWindows {
                    cfg!(windows)
                } else {
                    cfg!(unix)
                };
                let mut it = args.into_iter();
                let then = it.next();
                if then.is_none() {
                    return Ok(Value::Bool(holds));
                }
                select(holds, then, it.next())
            }
            Helper::SessionPut => {
                arity(helper, &args, 2, 2)?;
                let mut it = args.into_iter();
                let key = it.next().unwrap_or(Value::Null).to_string();
                self.session.put(key, it.next().unwrap_or(Value::Null));
                Ok(Value::Null)
            }
            Helper::SessionGet => {
                arity(helper, &args, 1, 1)?;
                let key = args[0].to_string();
                self.session.get(&key).cloned().ok_or_else(|| {
                    OrdoError::evaluation(format!("session has no entry '{}'", key))
                })
            }
            Helper::SessionContains => {
                arity(helper, &args, 1, 1)?;
                Ok(Value::Bool(self.session.contains(&args[0].to_string())))
            }
            Helper::SessionRemove => {
                arity(helper, &args, 1, 1)?;
                Ok(self
                    .session
                    .remove(&args[0].to_string())
                    .unwrap_or(Value::Null))
            }
            Helper::ThrowError => {
                arity(helper, &args, 1, 1)?;
                Err(OrdoError::execution(args[0].to_string()))
            }
        }
    }
}

fn arity(helper: Helper, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(OrdoError::evaluation(format!(
            "{}() takes {} argument(s), got {}",
            helper.name(),
            expected,
            args.len()
        )));
    }
    Ok(())
}

/// Build a command from flattened arguments, dropping blank elements.
fn command(args: Vec<Value>, working_directory: Option<PathBuf>) -> Result<Value> {
    let mut parts = Value::List(args)
        .flatten()
        .into_iter()
        .filter(|v| !v.is_blank())
        .map(|v| v.to_string());
    let program = parts
        .next()
        .ok_or_else(|| OrdoError::evaluation("getCommand() requires a program name"))?;
    Ok(Value::Command(CommandSpec {
        program,
        args: parts.collect(),
        working_directory,
    }))
}

fn select(holds: bool, then: Option<Value>, otherwise: Option<Value>) -> Result<Value> {
    match (then, holds) {
        (None, _) => Ok(Value::Bool(holds)),
        (Some(v), true) => Ok(v),
        (Some(_), false) => Ok(otherwise.unwrap_or_else(|| Value::text(""))),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Int(i) => *i == 1,
        Value::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "yes" | "true" | "on" | "1"
        ),
        _ => false,
    }
}

fn falsy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => !*b,
        Value::Int(i) => *i == 0,
        Value::Text(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "no" | "false" | "off" | "0"
        ),
        _ => false,
    }
}

fn stem(p: &Path) -> String {
    p.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
