//! GitHub releases/tags client and repository URL helpers

use std::fmt;

use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::http::JsonClient;

const GITHUB_HOST: &str = "github.com";

/// An `owner/repo` pair on github.com.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    pub fn https_url(&self) -> String {
        format!("https://{GITHUB_HOST}/{}/{}", self.owner, self.repo)
    }

    /// Source archive of a tag.
    pub fn tag_archive_url(&self, tag: &str) -> String {
        format!("{}/archive/refs/tags/{tag}.zip", self.https_url())
    }

    /// Source archive of a commit.
    pub fn commit_archive_url(&self, commit: &str) -> String {
        format!("{}/archive/{commit}.zip", self.https_url())
    }
}

impl fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Recognize `https://github.com/o/r(.git)`, `git@github.com:o/r(.git)` and
/// `ssh://git@github.com/o/r(.git)`. Anything else is `None`.
pub fn parse_github_url(url: &str) -> Option<GitHubRepo> {
    let url = url.trim();
    let path = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
        .or_else(|| url.strip_prefix("https://www.github.com/"))
        .or_else(|| url.strip_prefix("git@github.com:"))
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))?;

    let mut parts = path.trim_end_matches('/').splitn(3, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if parts.next().is_some_and(|rest| !rest.is_empty()) {
        tracing::trace!(url, "ignoring trailing path on GitHub URL");
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    let valid = |s: &str| {
        !s.is_empty()
            && s != "."
            && s != ".."
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
    };
    (valid(owner) && valid(repo)).then(|| GitHubRepo {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubTagCommit {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubTag {
    pub name: String,
    pub commit: GitHubTagCommit,
}

#[derive(Debug)]
pub struct GitHubClient {
    http: JsonClient,
    api_url: String,
    page_size: usize,
    max_pages: usize,
}

impl GitHubClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(
                config.github_interval(),
                config.request_timeout,
                config.retry.clone(),
                "application/vnd.github+json",
                config.github_token.as_deref(),
            )?,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, 100),
            max_pages: config.max_pages.max(1),
        })
    }

    pub async fn list_releases(&self, repo: &GitHubRepo) -> Result<Vec<GitHubRelease>> {
        self.paginate(repo, "releases").await
    }

    pub async fn list_tags(&self, repo: &GitHubRepo) -> Result<Vec<GitHubTag>> {
        self.paginate(repo, "tags").await
    }

    async fn paginate<T: serde::de::DeserializeOwned>(
        &self,
        repo: &GitHubRepo,
        resource: &str,
    ) -> Result<Vec<T>> {
        if parse_github_url(&repo.https_url()).as_ref() != Some(repo) {
            return Err(Error::InvalidUrl {
                url: repo.https_url(),
                reason: "not a valid owner/repo pair".into(),
            });
        }
        let mut all = Vec::new();
        for page in 1..=self.max_pages {
            let url = format!(
                "{}/repos/{}/{}/{resource}?per_page={}&page={page}",
                self.api_url, repo.owner, repo.repo, self.page_size
            );
            let Some(batch) = self.http.get::<Vec<T>>(&url).await? else {
                break;
            };
            let short = batch.len() < self.page_size;
            all.extend(batch);
            if short {
                break;
            }
        }
        Ok(all)
    }
}
