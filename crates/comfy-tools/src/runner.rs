//! Structured subprocess execution with timeouts

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};
use crate::timeouts::INTROSPECTION_TIMEOUT;

/// A program invocation: argument list, working directory, extra
/// environment and timeout. Arguments are passed to the OS verbatim.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(OsString, OsString)>,
    timeout: Duration,
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl ToolCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: PathBuf::from(program.as_ref()),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            timeout: INTROSPECTION_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Human-readable command line, for logs and error messages only.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion. A non-zero exit is returned as `Ok` so callers can
    /// inspect it; spawn failures and timeouts are errors.
    pub async fn output(&self) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        tracing::debug!(command = %self.display(), timeout_secs = self.timeout.as_secs(), "running");

        let program = self.program.to_string_lossy().into_owned();
        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout {
                command: self.display(),
                timeout: self.timeout,
            })?
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    Error::CommandNotFound {
                        program: program.clone(),
                    }
                } else {
                    Error::Spawn {
                        program: program.clone(),
                        source,
                    }
                }
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run to completion, turning a non-zero exit into [`Error::CommandFailed`].
    pub async fn run(&self) -> Result<ToolOutput> {
        let output = self.output().await?;
        if output.success() {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                command: self.display(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let out = ToolCommand::new("sh")
            .args(["-c", "echo hello; echo oops >&2; exit 3"])
            .output()
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn run_maps_nonzero_to_command_failed() {
        let err = ToolCommand::new("sh")
            .args(["-c", "echo bad >&2; exit 1"])
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: Some(1), ref stderr, .. } if stderr.contains("bad")));
    }

    #[tokio::test]
    async fn arguments_are_not_shell_interpreted() {
        let out = ToolCommand::new("echo")
            .arg("$(whoami); rm -rf /")
            .run()
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "$(whoami); rm -rf /");
    }

    #[tokio::test]
    async fn timeout_is_an_error() {
        let err = ToolCommand::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100))
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_command_not_found() {
        let err = ToolCommand::new("definitely-not-a-real-tool-xyz")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let out = ToolCommand::new("sh")
            .args(["-c", "echo $COMFY_TEST_VAR; pwd"])
            .env("COMFY_TEST_VAR", "set")
            .current_dir(dir.path())
            .run()
            .await
            .unwrap();
        let lines: Vec<&str> = out.stdout.lines().collect();
        assert_eq!(lines[0], "set");
        let reported = std::fs::canonicalize(lines[1]).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }
}
