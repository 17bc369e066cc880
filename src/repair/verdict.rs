// Runs the external test runner against one artifact.
// Every failure mode ends up inside the returned Verdict.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, ScribeError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl Verdict {
    pub fn failed(stdout: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
            duration: Duration::ZERO,
        }
    }
}

pub trait Checker {
    fn check(&self, artifact: &Path) -> Verdict;
}

#[derive(Debug, Clone)]
pub struct CommandChecker {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub working_dir: Option<PathBuf>,
}

impl CommandChecker {
    /// `command[0]` is the program; the artifact path is appended after the rest.
    pub fn from_command(command: &[String], timeout: Duration) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ScribeError::Config("runner command is empty".into()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            working_dir: None,
        })
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// The child runs in `working_dir`, so a relative artifact is resolved
    /// against our own cwd first.
    fn target(&self, artifact: &Path) -> PathBuf {
        if self.working_dir.is_none() || artifact.is_absolute() {
            return artifact.to_path_buf();
        }
        std::path::absolute(artifact).unwrap_or_else(|_| artifact.to_path_buf())
    }

    /// Runs the runner with `--version` once; used to fail fast at startup.
    pub fn probe(&self) -> Result<String> {
        let out = self
            .command()
            .arg("--version")
            .output()
            .map_err(|e| ScribeError::CheckerUnavailable(format!("{}: {}", self.program, e)))?;

        if !out.status.success() {
            return Err(ScribeError::CheckerUnavailable(format!(
                "{} --version exited with {}",
                self.program,
                out.status.code().unwrap_or(-1)
            )));
        }

        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl Checker for CommandChecker {
    fn check(&self, artifact: &Path) -> Verdict {
        let started = Instant::now();

        let target = self.target(artifact);
        let mut child = match self.command().arg(&target).spawn() {
            Ok(c) => c,
            Err(e) => {
                warn!(program = %self.program, "failed to launch test runner: {e}");
                return Verdict::failed(format!("Error: {e}"));
            }
        };

        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(
                    artifact = %artifact.display(),
                    "test runner exceeded {}s, killed",
                    self.timeout.as_secs()
                );
                return Verdict {
                    success: false,
                    stdout: format!("Test timed out after {} seconds", self.timeout.as_secs()),
                    stderr: String::new(),
                    exit_code: None,
                    timed_out: true,
                    duration: started.elapsed(),
                };
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Verdict::failed(format!("Error: {e}"));
            }
        };

        let stdout = stdout_rx.recv().unwrap_or_default();
        let stderr = stderr_rx.recv().unwrap_or_default();
        let exit_code = status.code();

        debug!(
            artifact = %artifact.display(),
            exit = exit_code.unwrap_or(-1),
            "test runner finished"
        );

        Verdict {
            success: status.success(),
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            exit_code,
            timed_out: false,
            duration: started.elapsed(),
        }
    }
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let start = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            let _ = p.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });

    rx
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn sh(script: &str, timeout: Duration) -> CommandChecker {
        CommandChecker::from_command(
            &["sh".into(), "-c".into(), script.into(), "sh".into()],
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn zero_exit_is_success_and_streams_are_captured() {
        let v = sh("echo out:$1; echo err >&2", Duration::from_secs(10))
            .check(Path::new("A-Test.php"));

        assert!(v.success);
        assert_eq!(v.exit_code, Some(0));
        assert_eq!(v.stdout, "out:A-Test.php");
        assert_eq!(v.stderr, "err");
        assert!(!v.timed_out);
    }

    #[test]
    fn relative_artifact_is_found_from_another_working_dir() {
        let here = tempfile::tempdir_in(".").unwrap();
        fs::write(here.path().join("A-Test.php"), "<?php").unwrap();
        let name = here.path().file_name().unwrap();
        let relative = Path::new(name).join("A-Test.php");
        assert!(relative.is_relative());

        let elsewhere = tempfile::tempdir().unwrap();
        let v = sh(r#"test -f "$1""#, Duration::from_secs(10))
            .with_working_dir(elsewhere.path())
            .check(&relative);

        assert!(v.success, "{v:?}");
    }

    #[test]
    fn relative_artifact_is_passed_unchanged_without_working_dir() {
        let v = sh("echo $1", Duration::from_secs(10)).check(Path::new("tests/A-Test.php"));
        assert_eq!(v.stdout, "tests/A-Test.php");
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let v = sh("echo '  FAIL  Tests'; exit 2", Duration::from_secs(10))
            .check(Path::new("x.php"));

        assert!(!v.success);
        assert_eq!(v.exit_code, Some(2));
        assert!(v.stdout.contains("FAIL"));
    }

    #[test]
    fn timeout_kills_the_child() {
        let started = Instant::now();
        let v = sh("sleep 30", Duration::from_millis(300)).check(Path::new("x.php"));

        assert!(!v.success);
        assert!(v.timed_out);
        assert!(v.stdout.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn launch_failure_is_a_failed_verdict() {
        let c = CommandChecker::from_command(
            &["/definitely/not/a/runner".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        let v = c.check(Path::new("x.php"));

        assert!(!v.success);
        assert!(v.stdout.starts_with("Error:"));
        assert_eq!(v.exit_code, None);
    }

    #[test]
    fn large_output_does_not_block() {
        let v = sh("head -c 300000 /dev/zero | tr '\\0' 'a'", Duration::from_secs(10))
            .check(Path::new("x.php"));
        assert!(v.success);
        assert_eq!(v.stdout.len(), 300_000);
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandChecker::from_command(&[], Duration::from_secs(1)).is_err());
    }

    #[test]
    fn probe_reports_missing_runner() {
        let c = CommandChecker::from_command(&["/no/such/bin".into()], Duration::from_secs(1))
            .unwrap();
        assert!(matches!(c.probe(), Err(ScribeError::CheckerUnavailable(_))));
    }
}
