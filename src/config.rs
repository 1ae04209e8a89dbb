//! Configuration discovery and effective settings resolution.
//!
//! Ordo reads `ordo.toml|yaml|yml` from the repository root (or closest
//! ancestor) and merges it with CLI flags to produce an `Effective` config.
//! Defaults:
//! - `loops`: 10
//! - `timeout`: none
//! - `verbose|dry_run|halt_on_errors`: false
//! - `output`: `human`
//! - `filetypes`: the built-in table in `default_file_types`
//! - `paths`: none beyond the file's directory and the bundled rules
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::error::{OrdoError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOOPS: u32 = 10;

#[derive(Debug, Default, Deserialize, Clone)]
/// A `[[filetypes]]` entry. Omitting `pattern` keeps the built-in comment
/// pattern for a known extension.
pub struct FileTypeCfg {
    pub extension: String,
    pub pattern: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `ordo.toml|yaml`.
pub struct OrdoConfig {
    pub paths: Option<Vec<String>>,
    pub filetypes: Option<Vec<FileTypeCfg>>,
    pub loops: Option<u32>,
    /// Per-process timeout in milliseconds.
    pub timeout: Option<u64>,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
    pub halt_on_errors: Option<bool>,
    pub output: Option<String>,
    /// Named blocks of directive lines injected before a file's own lines.
    #[serde(default)]
    pub preambles: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A supported input extension and the comment prefix its directives use.
pub struct FileType {
    pub extension: String,
    pub pattern: String,
}

impl FileType {
    pub fn new(extension: &str, pattern: &str) -> Self {
        FileType {
            extension: extension.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// Built-in file types, in lookup order.
pub fn default_file_types() -> Vec<FileType> {
    let percent = r"^\s*%\s+";
    let hash = r"^\s*#\s+";
    vec![
        FileType::new("tex", percent),
        FileType::new("dtx", percent),
        FileType::new("ltx", percent),
        FileType::new("drv", percent),
        FileType::new("ins", percent),
        FileType::new("sh", hash),
        FileType::new("py", hash),
        FileType::new("yaml", hash),
        FileType::new("toml", hash),
        FileType::new("mk", hash),
        FileType::new("md", r"^\s*<!--\s+"),
    ]
}

/// Directory holding the rules shipped with ordo; `ORDO_RULES` overrides it.
pub fn bundled_rules_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ORDO_RULES") {
        return PathBuf::from(dir);
    }
    let source_tree = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rules");
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    pick_rules_dir(source_tree, exe_dir.as_deref())
}

/// The source tree's `rules/` when it still exists, else `<bin>/rules` or
/// `<bin>/../share/ordo/rules` next to an installed binary.
fn pick_rules_dir(source_tree: PathBuf, exe_dir: Option<&Path>) -> PathBuf {
    if source_tree.is_dir() {
        return source_tree;
    }
    exe_dir
        .into_iter()
        .flat_map(|dir| [dir.join("rules"), dir.join("..").join("share").join("ordo").join("rules")])
        .find(|candidate| candidate.is_dir())
        .unwrap_or(source_tree)
}

#[derive(Debug, Clone)]
/// Options threaded through every interpreter component.
pub struct ExecutionOptions {
    pub verbose: bool,
    pub dry_run: bool,
    pub halt_on_errors: bool,
    pub max_loops: u32,
    pub timeout: Option<Duration>,
    /// Extra rule directories; relative entries resolve against the
    /// directory of the file being processed.
    pub rule_paths: Vec<PathBuf>,
    pub file_types: Vec<FileType>,
    pub preamble: Vec<String>,
    /// Consulted after `rule_paths` and the file's own directory.
    pub bundled_rules: Option<PathBuf>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            verbose: false,
            dry_run: false,
            halt_on_errors: false,
            max_loops: DEFAULT_LOOPS,
            timeout: None,
            rule_paths: Vec::new(),
            file_types: default_file_types(),
            preamble: Vec::new(),
            bundled_rules: Some(bundled_rules_dir()),
        }
    }
}

impl ExecutionOptions {
    /// Ordered rule search list for a file living in `base`.
    pub fn rule_search_paths(&self, base: &Path) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = self
            .rule_paths
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { base.join(p) })
            .collect();
        out.push(base.to_path_buf());
        if let Some(b) = &self.bundled_rules {
            out.push(b.clone());
        }
        out.dedup();
        out
    }
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line; `None` defers to the config file.
pub struct CliOverrides {
    pub repo_root: Option<String>,
    pub verbose: Option<bool>,
    pub dry_run: Option<bool>,
    pub halt_on_errors: Option<bool>,
    pub max_loops: Option<u32>,
    pub timeout: Option<u64>,
    pub preamble: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub output: String,
    pub options: ExecutionOptions,
    pub config_found: bool,
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when an `ordo.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if config_path(cur).is_some() || cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

fn config_path(root: &Path) -> Option<PathBuf> {
    ["ordo.toml", "ordo.yaml", "ordo.yml"]
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
}

/// Load `OrdoConfig` from `ordo.toml` or `ordo.yaml|yml` if present.
pub fn load_config(root: &Path) -> Result<Option<OrdoConfig>> {
    let Some(path) = config_path(root) else {
        return Ok(None);
    };
    let s = fs::read_to_string(&path).map_err(|e| OrdoError::io(&path, e))?;
    let parsed = if path.extension().is_some_and(|e| e == "toml") {
        toml::from_str::<OrdoConfig>(&s).map_err(|e| OrdoError::Config {
            message: format!("invalid configuration {}", path.display()),
            source: Some(Box::new(e)),
        })?
    } else {
        serde_yaml::from_str::<OrdoConfig>(&s).map_err(|e| OrdoError::Config {
            message: format!("invalid configuration {}", path.display()),
            source: Some(Box::new(e)),
        })?
    };
    Ok(Some(parsed))
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Result<Effective> {
    let start = PathBuf::from(cli.repo_root.as_deref().unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let loaded = load_config(&repo_root)?;
    let config_found = loaded.is_some();
    let cfg = loaded.unwrap_or_default();

    let output = cli
        .output
        .clone()
        .or(cfg.output.clone())
        .unwrap_or_else(|| "human".to_string());

    let mut options = ExecutionOptions {
        verbose: cli.verbose.or(cfg.verbose).unwrap_or(false),
        dry_run: cli.dry_run.or(cfg.dry_run).unwrap_or(false),
        halt_on_errors: cli.halt_on_errors.or(cfg.halt_on_errors).unwrap_or(false),
        max_loops: cli.max_loops.or(cfg.loops).unwrap_or(DEFAULT_LOOPS),
        timeout: cli
            .timeout
            .or(cfg.timeout)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis),
        rule_paths: cfg
            .paths
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        file_types: merge_file_types(cfg.filetypes.as_deref())?,
        ..ExecutionOptions::default()
    };

    if let Some(name) = cli.preamble.as_deref() {
        let block = cfg.preambles.get(name).ok_or_else(|| {
            OrdoError::config(format!("preamble '{}' is not defined in the configuration", name))
        })?;
        options.preamble = block.lines().map(str::to_string).collect();
    }

    Ok(Effective {
        repo_root,
        output,
        options,
        config_found,
    })
}

/// Configured file types replace the defaults entirely; entries without a
/// pattern borrow the built-in one for that extension.
fn merge_file_types(configured: Option<&[FileTypeCfg]>) -> Result<Vec<FileType>> {
    let defaults = default_file_types();
    let Some(list) = configured else {
        return Ok(defaults);
    };
    let mut out = Vec::with_capacity(list.len());
    for ft in list {
        let ext = ft.extension.trim_start_matches('.').to_string();
        let pattern = match &ft.pattern {
            Some(p) => p.clone(),
            None => defaults
                .iter()
                .find(|d| d.extension == ext)
                .map(|d| d.pattern.clone())
                .ok_or_else(|| {
                    OrdoError::config(format!(
                        "file type '{}' needs a comment pattern",
                        ext
                    ))
                })?,
        };
        regex::Regex::new(&pattern).map_err(|e| OrdoError::Config {
            message: format!("invalid pattern for file type '{}'", ext),
            source: Some(Box::new(e)),
        })?;
        out.push(FileType {
            extension: ext,
            pattern,
        });
    }
    Ok(out)
}
