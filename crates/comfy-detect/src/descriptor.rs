//! Per-extension detection records

use std::path::PathBuf;

use comfy_manifest::Requirement;
use serde::Serialize;

use crate::priority::{InstallPriority, PriorityKind};

/// Version-control state of an extension directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitInfo {
    pub remote_url: Option<String>,
    pub commit: Option<String>,
    /// Tag pointing exactly at `HEAD`.
    pub tag: Option<String>,
    pub dirty: bool,
}

/// Metadata declared in an extension's `pyproject.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PyprojectInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub publisher_id: Option<String>,
    pub display_name: Option<String>,
}

/// Outcome of looking an extension up in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryValidation {
    pub registry_id: String,
    pub found: bool,
    pub exact_match: bool,
    pub matched_version: Option<String>,
    /// Nearest published version with the same major, when not exact.
    pub closest_version: Option<String>,
    pub distance: Option<u64>,
    pub download_url: Option<String>,
    pub repository: Option<String>,
    pub latest_version: Option<String>,
}

/// Outcome of looking an extension up on GitHub.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GitHubValidation {
    /// `owner/repo`.
    pub repo: String,
    pub has_releases: bool,
    pub exact_match: bool,
    pub matched_tag: Option<String>,
    pub matched_commit: Option<String>,
    pub closest_tag: Option<String>,
    pub distance: Option<u64>,
}

/// Everything known about one extension directory. Created per detection
/// run; only the derived manifest entry is persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionDescriptor {
    /// Directory name under `custom_nodes/`.
    pub name: String,
    pub path: PathBuf,
    pub git: Option<GitInfo>,
    pub pyproject: Option<PyprojectInfo>,
    #[serde(serialize_with = "serialize_requirements")]
    pub requirements: Vec<Requirement>,
    pub has_post_install: bool,
    pub has_requirements_file: bool,
    pub registry: Option<RegistryValidation>,
    pub github: Option<GitHubValidation>,
    pub install_priority: InstallPriority,
    pub priority_kind: PriorityKind,
    pub priority_reason: String,
    pub priority_score: u32,
    /// Non-fatal problems hit while scanning or validating.
    pub errors: Vec<String>,
}

impl ExtensionDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            git: None,
            pyproject: None,
            requirements: Vec::new(),
            has_post_install: false,
            has_requirements_file: false,
            registry: None,
            github: None,
            install_priority: InstallPriority::Local,
            priority_kind: PriorityKind::Local,
            priority_reason: String::new(),
            priority_score: 0,
            errors: Vec::new(),
        }
    }

    /// Version the extension claims to be: the pyproject version, else the
    /// tag at `HEAD`.
    pub fn declared_version(&self) -> Option<&str> {
        self.pyproject
            .as_ref()
            .and_then(|p| p.version.as_deref())
            .or_else(|| self.git.as_ref().and_then(|g| g.tag.as_deref()))
    }

    /// Registry lookup id: pyproject name, else the directory name, lowercased.
    pub fn registry_id(&self) -> String {
        self.pyproject
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or(&self.name)
            .to_lowercase()
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.git
            .as_ref()
            .and_then(|g| g.remote_url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }

    pub fn commit(&self) -> Option<&str> {
        self.git.as_ref().and_then(|g| g.commit.as_deref())
    }
}

fn serialize_requirements<S: serde::Serializer>(
    reqs: &[Requirement],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(reqs.iter().map(|r| {
        let mut line = r.name.clone();
        line.push_str(&r.specifier);
        line
    }))
}
