//! Registry and GitHub lookups for scanned extensions
//!
//! Lookups fill [`RegistryValidation`] and [`GitHubValidation`] on the
//! descriptor. A lookup that fails after retries is recorded in the
//! descriptor's `errors`, which later degrades it to local priority.

use comfy_remote::{
    parse_github_url, GitHubClient, GitHubRelease, GitHubRepo, GitHubTag, RegistryClient,
    RegistryNode, RegistryVersion, RemoteConfig,
};

use crate::descriptor::{ExtensionDescriptor, GitHubValidation, RegistryValidation};
use crate::error::Result;
use crate::priority::{closest_version, versions_equal};

pub struct RemoteValidator {
    registry: RegistryClient,
    github: GitHubClient,
}

impl RemoteValidator {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Ok(Self {
            registry: RegistryClient::new(config)?,
            github: GitHubClient::new(config)?,
        })
    }

    /// Look `desc` up in both sources. Never fails; problems land in
    /// `desc.errors`.
    pub async fn validate(&self, desc: &mut ExtensionDescriptor) {
        match self.check_registry(desc).await {
            Ok(result) => desc.registry = Some(result),
            Err(e) => {
                tracing::warn!(node = %desc.name, error = %e, "registry lookup failed");
                desc.errors.push(format!("registry: {e}"));
            }
        }

        let Some(repo) = desc.remote_url().and_then(parse_github_url) else {
            return;
        };
        match self.check_github(&repo, desc).await {
            Ok(result) => desc.github = Some(result),
            Err(e) => {
                tracing::warn!(node = %desc.name, repo = %repo, error = %e, "GitHub lookup failed");
                desc.errors.push(format!("github: {e}"));
            }
        }
    }

    async fn check_registry(&self, desc: &ExtensionDescriptor) -> comfy_remote::Result<RegistryValidation> {
        let id = desc.registry_id();
        let Some(node) = self.registry.get_node(&id).await? else {
            tracing::debug!(node = %desc.name, id = %id, "not in registry");
            return Ok(RegistryValidation {
                registry_id: id,
                ..Default::default()
            });
        };

        let versions = match desc.declared_version() {
            Some(_) => self.registry.list_versions(&id).await?,
            None => Vec::new(),
        };
        let mut result = match_registry(&node, desc.declared_version(), &versions);

        if result.download_url.is_none()
            && let Some(version) = result.matched_version.clone().or_else(|| result.closest_version.clone())
            && let Some(info) = self.registry.install_info(&id, &version).await?
        {
            result.download_url = info.download_url;
        }
        tracing::debug!(
            node = %desc.name,
            exact = result.exact_match,
            closest = result.closest_version.as_deref().unwrap_or("-"),
            "registry lookup"
        );
        Ok(result)
    }

    async fn check_github(
        &self,
        repo: &GitHubRepo,
        desc: &ExtensionDescriptor,
    ) -> comfy_remote::Result<GitHubValidation> {
        let releases = self.github.list_releases(repo).await?;
        let tags = self.github.list_tags(repo).await?;
        Ok(match_github(repo, desc.declared_version(), desc.commit(), &releases, &tags))
    }
}

/// Compare a declared version with the registry's published versions.
pub fn match_registry(
    node: &RegistryNode,
    declared: Option<&str>,
    versions: &[RegistryVersion],
) -> RegistryValidation {
    let mut result = RegistryValidation {
        registry_id: node.id.clone(),
        found: true,
        repository: node.repository.clone(),
        latest_version: node.latest_version.as_ref().map(|v| v.version.clone()),
        ..Default::default()
    };

    let Some(declared) = declared else {
        result.download_url = node.latest_version.as_ref().and_then(|v| v.download_url.clone());
        return result;
    };

    let published = versions.iter().filter(|v| !v.deprecated);
    if let Some(exact) = published.clone().find(|v| versions_equal(&v.version, declared)) {
        result.exact_match = true;
        result.matched_version = Some(exact.version.clone());
        result.download_url = exact.download_url.clone();
        return result;
    }

    if let Some((closest, distance)) = closest_version(declared, published.clone().map(|v| v.version.as_str())) {
        result.closest_version = Some(closest.to_string());
        result.distance = Some(distance);
        result.download_url = published
            .clone()
            .find(|v| v.version == closest)
            .and_then(|v| v.download_url.clone());
    }
    result
}

/// Compare a declared version and `HEAD` commit with a repository's
/// releases and tags.
pub fn match_github(
    repo: &GitHubRepo,
    declared: Option<&str>,
    commit: Option<&str>,
    releases: &[GitHubRelease],
    tags: &[GitHubTag],
) -> GitHubValidation {
    let mut result = GitHubValidation {
        repo: repo.to_string(),
        has_releases: releases.iter().any(|r| !r.draft),
        ..Default::default()
    };

    let names: Vec<&str> = tags
        .iter()
        .map(|t| t.name.as_str())
        .chain(releases.iter().filter(|r| !r.draft).map(|r| r.tag_name.as_str()))
        .collect();

    if let Some(declared) = declared
        && let Some(tag) = names.iter().find(|name| versions_equal(name, declared))
    {
        result.exact_match = true;
        result.matched_tag = Some(tag.to_string());
        result.matched_commit = tags
            .iter()
            .find(|t| t.name == *tag)
            .map(|t| t.commit.sha.clone());
        return result;
    }

    if let Some(commit) = commit
        && let Some(tag) = tags.iter().find(|t| t.commit.sha == commit)
    {
        result.exact_match = true;
        result.matched_tag = Some(tag.name.clone());
        result.matched_commit = Some(tag.commit.sha.clone());
        return result;
    }

    if let Some(declared) = declared
        && let Some((closest, distance)) = closest_version(declared, names.iter().copied())
    {
        result.closest_tag = Some(closest.to_string());
        result.distance = Some(distance);
    }
    result
}
