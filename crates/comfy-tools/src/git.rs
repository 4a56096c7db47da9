//! Version-control client wrapper (`git` CLI)
//!
//! Only clone and checkout go through the CLI; read-only inspection of local
//! repositories is done in-process by the detector.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::runner::ToolCommand;
use crate::timeouts::{CHECKOUT_TIMEOUT, CLONE_TIMEOUT, QUICK_TIMEOUT};

/// Accepted repository URL shapes.
///
/// - `https://host/path`
/// - `ssh://[user@]host/path`
/// - `git@host:path` (SCP-style)
pub fn validate_git_url(url: &str) -> Result<()> {
    let reject = |reason: &str| Error::InvalidGitUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.starts_with('-') {
        return Err(reject("must not start with '-'"));
    }
    if url.bytes().any(|b| b.is_ascii_control() || b == b' ') {
        return Err(reject("contains whitespace or control characters"));
    }

    if let Some(rest) = url.strip_prefix("https://") {
        return validate_host_path(rest, '/').map_err(|r| reject(&r));
    }
    if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map_or(rest, |(_, host_path)| host_path);
        return validate_host_path(rest, '/').map_err(|r| reject(&r));
    }
    if let Some(rest) = url.strip_prefix("git@") {
        return validate_host_path(rest, ':').map_err(|r| reject(&r));
    }

    Err(reject("only https://, ssh:// and git@host:path URLs are accepted"))
}

fn validate_host_path(rest: &str, separator: char) -> std::result::Result<(), String> {
    let (host, path) = rest
        .split_once(separator)
        .ok_or_else(|| "missing repository path".to_string())?;
    let host = host.split(':').next().unwrap_or(host);
    let host_ok = !host.is_empty()
        && !host.starts_with(['-', '.'])
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.'));
    if !host_ok {
        return Err(format!("invalid host '{host}'"));
    }
    let path = path.trim_matches('/');
    if path.is_empty() {
        return Err("missing repository path".to_string());
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err("path contains '..'".to_string());
    }
    Ok(())
}

/// Validate a commit, tag or branch name before handing it to git.
pub fn validate_git_ref(git_ref: &str) -> Result<()> {
    let reject = |reason: &str| Error::InvalidGitRef {
        git_ref: git_ref.to_string(),
        reason: reason.to_string(),
    };
    if git_ref.is_empty() || git_ref.len() > 256 {
        return Err(reject("must be 1-256 characters"));
    }
    if git_ref.starts_with('-') {
        return Err(reject("must not start with '-'"));
    }
    if git_ref.contains("..") || git_ref.contains("//") {
        return Err(reject("contains '..' or '//'"));
    }
    let valid = git_ref
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'/' | b'+'));
    if !valid {
        return Err(reject("contains invalid characters"));
    }
    if git_ref.ends_with('/') || git_ref.ends_with('.') || git_ref.ends_with(".lock") {
        return Err(reject("has an invalid suffix"));
    }
    Ok(())
}

/// Thin wrapper around the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// `git --version`, used as an availability probe.
    pub async fn version(&self) -> Result<String> {
        let out = ToolCommand::new(&self.binary)
            .arg("--version")
            .timeout(QUICK_TIMEOUT)
            .run()
            .await?;
        Ok(out.stdout.trim().to_string())
    }

    /// Clone `url` into `dest`. The URL is validated first.
    pub async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        validate_git_url(url)?;
        tracing::info!(url, dest = %dest.display(), "cloning");
        ToolCommand::new(&self.binary)
            .args(["clone", "--quiet", "--"])
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(CLONE_TIMEOUT)
            .run()
            .await?;
        Ok(())
    }

    /// Check out `git_ref` (commit, tag or branch) in `repo`.
    pub async fn checkout(&self, repo: &Path, git_ref: &str) -> Result<()> {
        validate_git_ref(git_ref)?;
        tracing::debug!(repo = %repo.display(), git_ref, "checking out");
        ToolCommand::new(&self.binary)
            .arg("-C")
            .arg(repo)
            .args(["checkout", "--quiet", git_ref])
            .timeout(CHECKOUT_TIMEOUT)
            .run()
            .await?;
        Ok(())
    }

    /// Full commit hash of `HEAD` in `repo`.
    pub async fn head_commit(&self, repo: &Path) -> Result<String> {
        let out = ToolCommand::new(&self.binary)
            .arg("-C")
            .arg(repo)
            .args(["rev-parse", "HEAD"])
            .timeout(QUICK_TIMEOUT)
            .run()
            .await?;
        Ok(out.stdout.trim().to_string())
    }
}
