//! Target interpreter queries

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::runner::{ToolCommand, ToolOutput};
use crate::timeouts::{INTROSPECTION_TIMEOUT, QUICK_TIMEOUT};

static PYTHON_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Python\s+(\d+\.\d+(?:\.\d+)?)").unwrap());

/// Extract `X.Y.Z` from `python --version` output.
pub fn parse_python_version(output: &str) -> Option<String> {
    PYTHON_VERSION
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// Interpreter path inside a virtual environment.
pub fn venv_python_path(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Version of the interpreter at `python`.
///
/// Older interpreters print the banner on stderr, so both streams are read.
pub async fn python_version(python: &Path) -> Result<String> {
    let out = ToolCommand::new(python)
        .arg("--version")
        .timeout(QUICK_TIMEOUT)
        .run()
        .await?;
    parse_python_version(&out.stdout)
        .or_else(|| parse_python_version(&out.stderr))
        .ok_or_else(|| Error::UnexpectedOutput {
            program: python.display().to_string(),
            output: format!("{}{}", out.stdout, out.stderr).trim().to_string(),
        })
}

/// Evaluate a fixed code snippet with `python -c` and return trimmed stdout.
pub async fn eval(python: &Path, code: &str) -> Result<String> {
    let out = ToolCommand::new(python)
        .args(["-c", code])
        .timeout(INTROSPECTION_TIMEOUT)
        .run()
        .await?;
    Ok(out.stdout.trim().to_string())
}

/// Torch version as reported by the interpreter, `None` when torch is not
/// importable.
pub async fn torch_version(python: &Path) -> Result<Option<String>> {
    match eval(python, "import torch; print(torch.__version__)").await {
        Ok(version) if !version.is_empty() => Ok(Some(version)),
        Ok(_) | Err(Error::CommandFailed { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Run a script file with `cwd` as the working directory.
pub async fn run_script(
    python: &Path,
    script: &Path,
    cwd: &Path,
    timeout: Duration,
) -> Result<ToolOutput> {
    if !python.exists() {
        return Err(Error::InterpreterNotFound {
            path: python.to_path_buf(),
        });
    }
    ToolCommand::new(python)
        .arg(script)
        .current_dir(cwd)
        .timeout(timeout)
        .run()
        .await
}
