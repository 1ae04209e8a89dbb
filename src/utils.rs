//! Small shared helpers: colored message prefixes and path display.

use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if colors_enabled() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if colors_enabled() {
        "note:".yellow().bold().to_string()
    } else {
        "note:".to_string()
    }
}

/// Display `path` relative to the current directory when possible.
pub fn rel_to_wd(path: &str) -> String {
    let p = Path::new(path);
    if p.is_relative() {
        return path.to_string();
    }
    std::env::current_dir()
        .ok()
        .and_then(|wd| pathdiff::diff_paths(p, wd))
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(|rel| rel.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Expand glob patterns among `args`; plain names pass through untouched so
/// extension-less inputs can still be located later. A pattern matching
/// nothing is kept as written and fails at lookup.
pub fn expand_inputs(args: &[String]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for arg in args {
        if !arg.contains(['*', '?', '[']) {
            out.push(PathBuf::from(arg));
            continue;
        }
        let mut matched: Vec<PathBuf> = match glob::glob(arg) {
            Ok(paths) => paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect(),
            Err(_) => Vec::new(),
        };
        if matched.is_empty() {
            out.push(PathBuf::from(arg));
        } else {
            matched.sort();
            out.extend(matched);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn globs_expand_sorted_and_names_pass_through() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.tex"), "").unwrap();
        fs::write(dir.path().join("a.tex"), "").unwrap();
        fs::write(dir.path().join("c.md"), "").unwrap();
        let pattern = dir.path().join("*.tex").to_string_lossy().to_string();
        let out = expand_inputs(&[pattern, "thesis".to_string()]);
        assert_eq!(
            out,
            vec![
                dir.path().join("a.tex"),
                dir.path().join("b.tex"),
                PathBuf::from("thesis"),
            ]
        );
        let none = dir.path().join("*.rst").to_string_lossy().to_string();
        assert_eq!(expand_inputs(&[none.clone()]), vec![PathBuf::from(none)]);
    }

    #[test]
    fn relative_paths_are_kept() {
        assert_eq!(rel_to_wd("docs/a.tex"), "docs/a.tex");
    }

    #[test]
    fn absolute_paths_under_wd_are_shortened() {
        let wd = std::env::current_dir().unwrap();
        let abs = wd.join("sub").join("doc.tex");
        let shown = rel_to_wd(abs.to_str().unwrap());
        assert_eq!(Path::new(&shown), Path::new("sub").join("doc.tex"));
    }
}
