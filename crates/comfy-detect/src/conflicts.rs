//! Greedy package resolution
//!
//! Declared requirements from the application and every extension are
//! folded into one version per package. An installed package always
//! resolves to its installed version; each declared specifier it violates is
//! recorded as a [`Conflict`]. A package that is declared but not installed
//! resolves to the first non-empty specifier seen. There is no backtracking.

use std::collections::{BTreeMap, BTreeSet};

use comfy_manifest::version::{specifier_satisfied, VersionConstraint};
use comfy_manifest::{is_accelerator_package, Requirement};
use serde::Serialize;

use crate::packages::InstalledPackages;

/// Requirements declared by one party.
#[derive(Debug, Clone)]
pub struct DependencySource {
    /// `comfyui` for the application, otherwise the extension name.
    pub source: String,
    pub requirements: Vec<Requirement>,
}

impl DependencySource {
    pub fn new(source: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            source: source.into(),
            requirements,
        }
    }
}

/// A declared specifier the installed version does not satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub package: String,
    pub installed: String,
    pub required: String,
    pub resolved_to: String,
    /// Who declared `required`.
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Normalized name to the version (or, when absent, the specifier) to
    /// install.
    pub resolved: BTreeMap<String, String>,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<String>,
}

/// Resolve declared requirements against what is installed.
///
/// Accelerator packages and VCS/editable requirements are skipped; they are
/// captured through their own channels.
pub fn resolve(sources: &[DependencySource], installed: &InstalledPackages) -> Resolution {
    let mut resolution = Resolution::default();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut missing: BTreeSet<String> = BTreeSet::new();

    for source in sources {
        for req in &source.requirements {
            if req.url.is_some() || req.editable || is_accelerator_package(&req.name) {
                continue;
            }

            let Some(version) = installed.version(&req.name) else {
                if !resolution.resolved.contains_key(&req.name) && !req.specifier.is_empty() {
                    resolution
                        .resolved
                        .insert(req.name.clone(), pinned_or_raw(&req.specifier));
                }
                if missing.insert(req.name.clone()) {
                    resolution.warnings.push(format!(
                        "{} required by {} is not installed",
                        req.name, source.source
                    ));
                }
                continue;
            };

            resolution
                .resolved
                .insert(req.name.clone(), version.to_string());

            if !seen.insert((req.name.clone(), req.specifier.clone())) {
                continue;
            }
            match specifier_satisfied(version, &req.specifier) {
                Some(true) => {}
                Some(false) => {
                    tracing::debug!(
                        package = %req.name,
                        installed = version,
                        required = %req.specifier,
                        source = %source.source,
                        "installed version violates declared constraint"
                    );
                    resolution.conflicts.push(Conflict {
                        package: req.name.clone(),
                        installed: version.to_string(),
                        required: req.specifier.clone(),
                        resolved_to: version.to_string(),
                        source: source.source.clone(),
                    });
                }
                None => resolution.warnings.push(format!(
                    "cannot compare {} {} against '{}' from {}",
                    req.name, version, req.specifier, source.source
                )),
            }
        }
    }

    resolution
}

/// `==X` becomes `X`; anything else is kept as a raw specifier.
fn pinned_or_raw(specifier: &str) -> String {
    VersionConstraint::parse(specifier)
        .ok()
        .and_then(|c| c.pinned_version().map(str::to_string))
        .unwrap_or_else(|| specifier.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn reqs(lines: &[&str]) -> Vec<Requirement> {
        lines.iter().map(|l| Requirement::parse(l).unwrap()).collect()
    }

    fn installed(pairs: &[(&str, &str)]) -> InstalledPackages {
        InstalledPackages {
            versions: pairs
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn installed_version_wins_and_only_violations_conflict() {
        let sources = vec![
            DependencySource::new("NodeA", reqs(&["numpy==1.24.0"])),
            DependencySource::new("NodeB", reqs(&["numpy>=1.25.0"])),
            DependencySource::new("NodeC", reqs(&["numpy<2"])),
        ];
        let resolution = resolve(&sources, &installed(&[("numpy", "1.23.0")]));

        assert_eq!(resolution.resolved.get("numpy").map(String::as_str), Some("1.23.0"));
        let required: Vec<_> = resolution.conflicts.iter().map(|c| c.required.as_str()).collect();
        assert_eq!(required, vec!["==1.24.0", ">=1.25.0"]);
        assert!(resolution.conflicts.iter().all(|c| c.resolved_to == "1.23.0"));
    }

    #[test]
    fn two_sources_both_violated_by_installed_version() {
        let sources = vec![
            DependencySource::new("NodeA", reqs(&["numpy==1.24.0"])),
            DependencySource::new("NodeB", reqs(&["numpy>=1.25.0"])),
        ];
        let resolution = resolve(&sources, &installed(&[("numpy", "1.23.0")]));

        let conflict = |required: &str, source: &str| Conflict {
            package: "numpy".to_string(),
            installed: "1.23.0".to_string(),
            required: required.to_string(),
            resolved_to: "1.23.0".to_string(),
            source: source.to_string(),
        };
        assert_eq!(
            resolution.conflicts,
            vec![conflict("==1.24.0", "NodeA"), conflict(">=1.25.0", "NodeB")]
        );
        assert_eq!(resolution.resolved.get("numpy").map(String::as_str), Some("1.23.0"));
    }

    #[test]
    fn same_violation_from_two_sources_is_one_conflict() {
        let sources = vec![
            DependencySource::new("NodeA", reqs(&["pillow>=11"])),
            DependencySource::new("NodeB", reqs(&["Pillow>=11"])),
        ];
        let resolution = resolve(&sources, &installed(&[("pillow", "10.2.0")]));
        assert_eq!(resolution.conflicts.len(), 1);
        assert_eq!(resolution.conflicts[0].source, "NodeA");
    }

    #[test]
    fn missing_package_takes_first_specifier_with_warning() {
        let sources = vec![
            DependencySource::new("comfyui", reqs(&["einops"])),
            DependencySource::new("NodeA", reqs(&["einops==0.7.0"])),
            DependencySource::new("NodeB", reqs(&["einops>=0.8"])),
            DependencySource::new("NodeC", reqs(&["kornia>=0.7"])),
        ];
        let resolution = resolve(&sources, &InstalledPackages::default());
        assert_eq!(resolution.resolved.get("einops").map(String::as_str), Some("0.7.0"));
        assert_eq!(resolution.resolved.get("kornia").map(String::as_str), Some(">=0.7"));
        assert_eq!(resolution.warnings.len(), 2);
        assert!(resolution.conflicts.is_empty());
    }

    #[test]
    fn accelerator_and_vcs_requirements_are_skipped() {
        let sources = vec![DependencySource::new(
            "NodeA",
            reqs(&[
                "torch>=99",
                "xformers",
                "nvidia-cudnn-cu12==8.9",
                "clip @ git+https://github.com/openai/CLIP.git",
            ]),
        )];
        let resolution = resolve(&sources, &installed(&[("torch", "2.1.0")]));
        assert_eq!(resolution, Resolution::default());
    }
}
