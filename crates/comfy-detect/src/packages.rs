//! Installed package detection

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use comfy_manifest::package::is_vcs_url;
use comfy_manifest::{normalize_package_name, Requirement};
use comfy_tools::PackageManager;
use serde::Serialize;

use crate::error::Result;

/// What the package installer reports for one interpreter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstalledPackages {
    /// Normalized name to version, excluding VCS and editable installs.
    pub versions: BTreeMap<String, String>,
    /// `name @ git+...` lines recovered from freeze.
    pub git_requirements: Vec<String>,
    /// Targets of `-e` lines recovered from freeze.
    pub editable_installs: Vec<String>,
    /// Raw freeze output.
    pub freeze: Vec<String>,
}

impl InstalledPackages {
    pub fn version(&self, name: &str) -> Option<&str> {
        self.versions
            .get(&normalize_package_name(name))
            .map(String::as_str)
    }

    /// Split freeze lines into VCS and editable sources and drop those
    /// packages from the plain version map.
    pub fn absorb_freeze(&mut self, lines: Vec<String>) {
        for line in &lines {
            let Ok(req) = Requirement::parse(line) else {
                continue;
            };
            let Some(url) = req.url.as_deref() else {
                continue;
            };
            if req.editable {
                self.editable_installs.push(url.to_string());
            } else if is_vcs_url(url) {
                self.git_requirements.push(line.trim().to_string());
            } else {
                continue;
            }
            self.versions.remove(&req.name);
        }
        self.freeze = lines;
    }
}

pub struct PackageDetector<'a> {
    manager: &'a dyn PackageManager,
    python: PathBuf,
}

impl<'a> PackageDetector<'a> {
    pub fn new(manager: &'a dyn PackageManager, python: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub async fn detect(&self) -> Result<InstalledPackages> {
        let listed = self.manager.list_installed(&self.python).await?;
        let mut packages = InstalledPackages {
            versions: listed
                .iter()
                .filter(|p| !p.is_editable())
                .map(|p| (normalize_package_name(&p.name), p.version.clone()))
                .collect(),
            ..Default::default()
        };

        match self.manager.freeze(&self.python).await {
            Ok(lines) => packages.absorb_freeze(lines),
            Err(e) => tracing::warn!(error = %e, "pip freeze failed; VCS and editable installs not captured"),
        }

        tracing::info!(
            manager = self.manager.name(),
            packages = packages.versions.len(),
            git = packages.git_requirements.len(),
            editable = packages.editable_installs.len(),
            "detected installed packages"
        );
        Ok(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn freeze_moves_vcs_and_editable_out_of_versions() {
        let mut packages = InstalledPackages::default();
        packages.versions.insert("numpy".into(), "1.26.0".into());
        packages.versions.insert("sam2".into(), "1.0".into());
        packages.versions.insert("my-tool".into(), "0.1.0".into());

        packages.absorb_freeze(vec![
            "numpy==1.26.0".into(),
            "sam2 @ git+https://github.com/facebookresearch/sam2.git@abc123".into(),
            "-e /src/my_tool#egg=my_tool".into(),
        ]);

        assert_eq!(packages.versions.keys().collect::<Vec<_>>(), vec!["numpy"]);
        assert_eq!(
            packages.git_requirements,
            vec!["sam2 @ git+https://github.com/facebookresearch/sam2.git@abc123"]
        );
        assert_eq!(packages.editable_installs, vec!["/src/my_tool#egg=my_tool"]);
        assert_eq!(packages.freeze.len(), 3);
        assert_eq!(packages.version("NumPy"), Some("1.26.0"));
    }
}
