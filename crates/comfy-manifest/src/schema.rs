//! Manifest schema types and validation.
//!
//! The JSON form omits optional fields instead of writing `null`, so every
//! `Option` and collection carries a `skip_serializing_if`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::method::InstallMethod;
use crate::package::PYTORCH_PACKAGES;
use crate::version::parse_version;
use crate::SCHEMA_VERSION;

/// Detected runtime and accelerator versions of the source host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub python_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuda_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub torch_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comfyui_version: Option<String>,
}

impl SystemInfo {
    pub fn new(python_version: impl Into<String>) -> Self {
        Self {
            python_version: python_version.into(),
            cuda_version: None,
            torch_version: None,
            comfyui_version: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parts: Vec<&str> = self.python_version.trim().split('.').collect();
        let numeric = parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
        if !(2..=3).contains(&parts.len()) || !numeric {
            return Err(Error::field(
                "system_info.python_version",
                format!("expected MAJOR.MINOR[.PATCH], got '{}'", self.python_version),
            ));
        }
        if let Some(cuda) = &self.cuda_version
            && parse_version(cuda).is_none()
        {
            return Err(Error::field(
                "system_info.cuda_version",
                format!("not a version: '{cuda}'"),
            ));
        }
        if let Some(torch) = &self.torch_version
            && parse_version(torch).is_none()
        {
            return Err(Error::field(
                "system_info.torch_version",
                format!("not a version: '{torch}'"),
            ));
        }
        Ok(())
    }
}

/// A custom node entry as persisted in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomNodeSpec {
    pub name: String,
    pub install_method: InstallMethod,
    /// Fetch location; for `local` the bare node name as a placeholder.
    pub url: String,
    /// Commit, tag or branch. Only meaningful for `git`.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_post_install: bool,
}

impl CustomNodeSpec {
    pub fn archive(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            install_method: InstallMethod::Archive,
            url: url.into(),
            git_ref: None,
            has_post_install: false,
        }
    }

    pub fn git(name: impl Into<String>, url: impl Into<String>, git_ref: Option<String>) -> Self {
        Self {
            name: name.into(),
            install_method: InstallMethod::Git,
            url: url.into(),
            git_ref,
            has_post_install: false,
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            url: name.clone(),
            name,
            install_method: InstallMethod::Local,
            git_ref: None,
            has_post_install: false,
        }
    }

    pub fn with_post_install(mut self, has_post_install: bool) -> Self {
        self.has_post_install = has_post_install;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(Error::node(name, "name is empty"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(Error::node(name, "name must be a single path component"));
        }
        if self.url.trim().is_empty() {
            return Err(Error::node(name, "url is empty"));
        }

        match self.install_method {
            InstallMethod::Local => {
                if has_scheme(&self.url) {
                    return Err(Error::node(
                        name,
                        "local nodes carry their bare name as url, not a fetchable location",
                    ));
                }
            }
            InstallMethod::Archive => {
                if !has_scheme(&self.url) {
                    return Err(Error::node(
                        name,
                        format!("archive url must be absolute with a scheme: '{}'", self.url),
                    ));
                }
            }
            InstallMethod::Git => {
                if !has_scheme(&self.url) && !is_scp_like(&self.url) {
                    return Err(Error::node(
                        name,
                        format!("git url must be absolute with a scheme: '{}'", self.url),
                    ));
                }
            }
        }

        if self.git_ref.is_some() && self.install_method != InstallMethod::Git {
            return Err(Error::node(
                name,
                format!("ref is only allowed for git installs, not {}", self.install_method),
            ));
        }
        if let Some(git_ref) = &self.git_ref
            && git_ref.trim().is_empty()
        {
            return Err(Error::node(name, "ref is empty"));
        }
        Ok(())
    }
}

/// `scheme://rest` with a non-empty, purely alphabetic-ish scheme.
fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// SCP-style SSH location: `user@host:path`.
fn is_scp_like(url: &str) -> bool {
    match url.split_once('@') {
        Some((user, rest)) => {
            !user.is_empty()
                && !user.contains('/')
                && rest
                    .split_once(':')
                    .is_some_and(|(host, path)| !host.is_empty() && !path.is_empty())
        }
        None => false,
    }
}

/// Accelerator package block: one index plus exact versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PytorchSpec {
    pub index_url: String,
    pub packages: BTreeMap<String, String>,
}

/// All dependency classes to install on the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Normalized package name to exact version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pytorch: Option<PytorchSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editable_installs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub git_requirements: Vec<String>,
}

impl DependencySpec {
    pub fn validate(&self) -> Result<()> {
        for (name, version) in &self.packages {
            if name.trim().is_empty() {
                return Err(Error::field("dependencies.packages", "empty package name"));
            }
            if version.trim().is_empty() {
                return Err(Error::field(
                    "dependencies.packages",
                    format!("package '{name}' has an empty version"),
                ));
            }
        }

        if let Some(pytorch) = &self.pytorch {
            if !has_scheme(&pytorch.index_url) {
                return Err(Error::field(
                    "dependencies.pytorch.index_url",
                    format!("not an absolute URL: '{}'", pytorch.index_url),
                ));
            }
            for (name, version) in &pytorch.packages {
                if !PYTORCH_PACKAGES.contains(&name.as_str()) {
                    return Err(Error::field(
                        "dependencies.pytorch.packages",
                        format!("'{name}' is not a core accelerator package"),
                    ));
                }
                if version.trim().is_empty() {
                    return Err(Error::field(
                        "dependencies.pytorch.packages",
                        format!("package '{name}' has an empty version"),
                    ));
                }
            }
        }

        if self.git_requirements.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::field("dependencies.git_requirements", "empty entry"));
        }
        if self.editable_installs.iter().any(|r| r.trim().is_empty()) {
            return Err(Error::field("dependencies.editable_installs", "empty entry"));
        }
        Ok(())
    }

    /// Total number of install units across all classes.
    pub fn total_count(&self) -> usize {
        self.packages.len()
            + self.pytorch.as_ref().map_or(0, |p| p.packages.len())
            + self.editable_installs.len()
            + self.git_requirements.len()
    }
}

/// The portable description of a captured environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationManifest {
    pub schema_version: String,
    pub system_info: SystemInfo,
    #[serde(default)]
    pub custom_nodes: Vec<CustomNodeSpec>,
    #[serde(default)]
    pub dependencies: DependencySpec,
}

impl MigrationManifest {
    pub fn new(system_info: SystemInfo) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            system_info,
            custom_nodes: Vec::new(),
            dependencies: DependencySpec::default(),
        }
    }

    /// Validate the manifest and every nested entity.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(Error::UnsupportedSchema {
                found: self.schema_version.clone(),
                expected: SCHEMA_VERSION.to_string(),
            });
        }
        self.system_info.validate()?;

        let mut seen = std::collections::HashSet::new();
        for node in &self.custom_nodes {
            node.validate()?;
            if !seen.insert(node.name.as_str()) {
                return Err(Error::node(&node.name, "listed more than once"));
            }
        }

        self.dependencies.validate()
    }

    /// Convert to a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Build from a JSON value, validating the result.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let manifest: Self = serde_json::from_value(value)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse and validate manifest JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let manifest: Self = comfy_fs::io::read_json(path)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate, then write the manifest atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        comfy_fs::io::write_json(path, self)?;
        Ok(())
    }
}
