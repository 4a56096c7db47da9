//! Manifest generation
//!
//! Turns ranked extension descriptors and the resolved package set into a
//! [`MigrationManifest`]. Each extension gets exactly one
//! `(install_method, url, ref)` triple or is dropped with a reason.

use std::collections::BTreeMap;

use comfy_manifest::package::{pytorch_index_url, PYTORCH_PACKAGES};
use comfy_manifest::{
    is_accelerator_package, CustomNodeSpec, DependencySpec, MigrationManifest, PytorchSpec,
    SystemInfo,
};
use comfy_remote::parse_github_url;
use comfy_tools::git::validate_git_url;
use serde::Serialize;

use crate::conflicts::Resolution;
use crate::descriptor::ExtensionDescriptor;
use crate::packages::InstalledPackages;
use crate::priority::InstallPriority;

/// An extension left out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedNode {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestGenerator;

impl ManifestGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Build the manifest. Returns it together with the extensions that
    /// could not be given an install source.
    pub fn generate(
        &self,
        system_info: SystemInfo,
        extensions: &[ExtensionDescriptor],
        installed: &InstalledPackages,
        resolution: &Resolution,
    ) -> (MigrationManifest, Vec<DroppedNode>) {
        let mut manifest = MigrationManifest::new(system_info);
        let mut dropped = Vec::new();

        for desc in extensions {
            match node_spec(desc).and_then(|spec| {
                spec.validate().map_err(|e| e.to_string())?;
                Ok(spec)
            }) {
                Ok(spec) => {
                    tracing::debug!(
                        node = %spec.name,
                        method = %spec.install_method,
                        priority = %desc.install_priority,
                        "selected install source"
                    );
                    manifest.custom_nodes.push(spec);
                }
                Err(reason) => {
                    tracing::warn!(node = %desc.name, reason = %reason, "dropping custom node from manifest");
                    dropped.push(DroppedNode {
                        name: desc.name.clone(),
                        reason,
                    });
                }
            }
        }

        manifest.dependencies = dependency_spec(
            manifest.system_info.torch_version.as_deref(),
            installed,
            resolution,
        );
        (manifest, dropped)
    }
}

/// Select the install triple for one ranked extension.
pub fn node_spec(desc: &ExtensionDescriptor) -> Result<CustomNodeSpec, String> {
    let spec = match desc.install_priority {
        InstallPriority::Registry => registry_spec(desc)?,
        InstallPriority::Github => github_spec(desc)?,
        InstallPriority::Git => {
            let url = desc
                .remote_url()
                .ok_or_else(|| "git priority without a remote URL".to_string())?;
            CustomNodeSpec::git(&desc.name, url, desc.commit().map(str::to_string))
        }
        InstallPriority::Local => CustomNodeSpec::local(&desc.name),
    };
    Ok(spec.with_post_install(desc.has_post_install))
}

fn registry_spec(desc: &ExtensionDescriptor) -> Result<CustomNodeSpec, String> {
    let registry = desc
        .registry
        .as_ref()
        .ok_or_else(|| "registry priority without registry data".to_string())?;
    if let Some(url) = &registry.download_url {
        return Ok(CustomNodeSpec::archive(&desc.name, url));
    }

    let remote = desc.remote_url().or(registry.repository.as_deref());
    match (remote, desc.commit()) {
        (Some(remote), Some(commit)) => match parse_github_url(remote) {
            Some(repo) => Ok(CustomNodeSpec::archive(&desc.name, repo.commit_archive_url(commit))),
            None => Ok(CustomNodeSpec::git(&desc.name, remote, Some(commit.to_string()))),
        },
        _ => Err("registry entry has no download URL and no remote commit".to_string()),
    }
}

fn github_spec(desc: &ExtensionDescriptor) -> Result<CustomNodeSpec, String> {
    let github = desc
        .github
        .as_ref()
        .ok_or_else(|| "github priority without GitHub data".to_string())?;
    let repo = desc
        .remote_url()
        .and_then(parse_github_url)
        .ok_or_else(|| format!("cannot derive a GitHub repository for {}", github.repo))?;
    let commit = desc.commit().or(github.matched_commit.as_deref());

    if github.exact_match {
        let declares_version = desc.pyproject.as_ref().is_some_and(|p| p.version.is_some());
        let url = match (&github.matched_tag, commit) {
            (Some(tag), _) if declares_version => repo.tag_archive_url(tag),
            (_, Some(commit)) => repo.commit_archive_url(commit),
            (Some(tag), None) => repo.tag_archive_url(tag),
            (None, None) => return Err("exact GitHub match without tag or commit".to_string()),
        };
        return Ok(CustomNodeSpec::archive(&desc.name, url));
    }

    if let Some(remote) = desc.remote_url().filter(|u| validate_git_url(u).is_ok()) {
        return Ok(CustomNodeSpec::git(&desc.name, remote, desc.commit().map(str::to_string)));
    }
    match commit {
        Some(commit) => Ok(CustomNodeSpec::archive(&desc.name, repo.commit_archive_url(commit))),
        None => Err("GitHub remote is unusable and no commit is known".to_string()),
    }
}

fn dependency_spec(
    torch_version: Option<&str>,
    installed: &InstalledPackages,
    resolution: &Resolution,
) -> DependencySpec {
    let packages: BTreeMap<String, String> = resolution
        .resolved
        .iter()
        .filter(|(name, _)| !is_accelerator_package(name))
        .map(|(name, version)| (name.clone(), version.clone()))
        .collect();

    let torch_packages: BTreeMap<String, String> = PYTORCH_PACKAGES
        .iter()
        .filter_map(|name| installed.version(name).map(|v| (name.to_string(), v.to_string())))
        .collect();
    let pytorch = torch_version
        .or_else(|| installed.version("torch"))
        .filter(|_| !torch_packages.is_empty())
        .map(|torch| PytorchSpec {
            index_url: pytorch_index_url(torch),
            packages: torch_packages,
        });

    DependencySpec {
        packages,
        pytorch,
        editable_installs: installed.editable_installs.clone(),
        git_requirements: installed.git_requirements.clone(),
    }
}
