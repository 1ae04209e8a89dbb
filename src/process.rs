//! Child-process execution for command elements.
//!
//! Verbose runs inherit stdio so tool output streams live; otherwise output
//! is drained on reader threads and logged at debug level. A timeout polls
//! the child and kills it on expiry.

use crate::config::ExecutionOptions;
use crate::error::{OrdoError, Result};
use crate::expr::CommandSpec;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; -1 when the process was terminated by a signal.
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Run `spec` in its working directory, or `default_dir` when it has none.
///
/// In dry-run mode nothing is spawned and the exit code is 0.
pub fn run(spec: &CommandSpec, default_dir: &Path, options: &ExecutionOptions) -> Result<ProcessOutput> {
    let dir = spec.working_directory.as_deref().unwrap_or(default_dir);
    if options.dry_run {
        info!(command = %spec, dir = %dir.display(), "dry-run: not executing");
        return Ok(ProcessOutput::default());
    }

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).current_dir(dir).stdin(Stdio::null());
    if options.verbose {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    }
    debug!(command = %spec, dir = %dir.display(), "spawning");
    let mut child = cmd.spawn().map_err(|e| OrdoError::Execution {
        message: format!("cannot run '{}'", spec),
        source: Some(Box::new(e)),
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match options.timeout {
        Some(limit) => wait_with_timeout(&mut child, limit, spec)?,
        None => child.wait().map_err(|e| OrdoError::Execution {
            message: format!("failed waiting for '{}'", spec),
            source: Some(Box::new(e)),
        })?,
    };

    let output = ProcessOutput {
        code: status.code().unwrap_or(-1),
        stdout: stdout.map(collect).unwrap_or_default(),
        stderr: stderr.map(collect).unwrap_or_default(),
    };
    debug!(
        command = %spec,
        code = output.code,
        stdout = %output.stdout.trim_end(),
        stderr = %output.stderr.trim_end(),
        "process finished"
    );
    Ok(output)
}

fn wait_with_timeout(
    child: &mut Child,
    limit: Duration,
    spec: &CommandSpec,
) -> Result<std::process::ExitStatus> {
    let start = Instant::now();
    loop {
        let polled = child.try_wait().map_err(|e| OrdoError::Execution {
            message: format!("failed waiting for '{}'", spec),
            source: Some(Box::new(e)),
        })?;
        if let Some(status) = polled {
            return Ok(status);
        }
        if start.elapsed() > limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(OrdoError::Timeout {
                command: spec.to_string(),
                millis: limit.as_millis() as u64,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            working_directory: None,
        }
    }

    #[test]
    fn captures_output_and_exit_code() {
        let dir = tempdir().unwrap();
        let opts = ExecutionOptions::default();
        let out = run(&sh("echo hi; echo err >&2; exit 3"), dir.path(), &opts).unwrap();
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let mut spec = sh("touch marker");
        spec.working_directory = Some(sub.clone());
        run(&spec, dir.path(), &ExecutionOptions::default()).unwrap();
        assert!(sub.join("marker").exists());
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn timeout_kills_the_child() {
        let dir = tempdir().unwrap();
        let opts = ExecutionOptions {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let err = run(&sh("sleep 5"), dir.path(), &opts).unwrap_err();
        assert!(matches!(err, OrdoError::Timeout { millis: 100, .. }));
    }

    #[test]
    fn dry_run_spawns_nothing() {
        let dir = tempdir().unwrap();
        let opts = ExecutionOptions {
            dry_run: true,
            ..Default::default()
        };
        let out = run(&sh("touch marker; exit 1"), dir.path(), &opts).unwrap();
        assert_eq!(out.code, 0);
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec {
            program: "ordo-no-such-program".into(),
            args: vec![],
            working_directory: None,
        };
        assert!(run(&spec, dir.path(), &ExecutionOptions::default()).is_err());
    }
}
