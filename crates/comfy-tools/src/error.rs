//! Error types for comfy-tools

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Command not found: {program}")]
    CommandNotFound { program: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with exit code {code:?}: {}", summarize(.stderr, .stdout))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("Rejected git URL '{url}': {reason}")]
    InvalidGitUrl { url: String, reason: String },

    #[error("Rejected git ref '{git_ref}': {reason}")]
    InvalidGitRef { git_ref: String, reason: String },

    #[error("Unexpected output from {program}: {output}")]
    UnexpectedOutput { program: String, output: String },

    #[error("Interpreter not found at {path}")]
    InterpreterNotFound { path: PathBuf },
}

/// Prefer stderr, fall back to stdout, keep the tail short.
fn summarize(stderr: &str, stdout: &str) -> String {
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<&str> = text.trim().lines().collect();
    let tail = lines.len().saturating_sub(5);
    lines[tail..].join(" | ")
}
