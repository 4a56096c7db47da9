//! Post-recreation check of installed state against the manifest

use std::collections::BTreeMap;
use std::path::Path;

use comfy_manifest::package::requirement_spec;
use comfy_manifest::version::specifier_satisfied;
use comfy_manifest::{MigrationManifest, normalize_package_name};
use comfy_tools::PackageManager;

/// What the target environment actually contains. Every discrepancy is a
/// warning; validation never fails a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Normalized name to installed version.
    pub installed_packages: BTreeMap<String, String>,
    pub present_nodes: Vec<String>,
    pub warnings: Vec<String>,
}

pub async fn validate_environment(
    manager: &dyn PackageManager,
    python: &Path,
    manifest: &MigrationManifest,
    custom_nodes: &Path,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    match manager.list_installed(python).await {
        Ok(packages) => {
            report.installed_packages = packages
                .into_iter()
                .map(|p| (normalize_package_name(&p.name), p.version))
                .collect();
            report
                .warnings
                .extend(package_warnings(manifest, &report.installed_packages));
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not list installed packages");
            report
                .warnings
                .push(format!("could not list installed packages: {e}"));
        }
    }

    for spec in &manifest.custom_nodes {
        if custom_nodes.join(&spec.name).is_dir() {
            report.present_nodes.push(spec.name.clone());
        } else {
            report
                .warnings
                .push(format!("custom node '{}' is missing after recreation", spec.name));
        }
    }

    tracing::info!(
        packages = report.installed_packages.len(),
        nodes = report.present_nodes.len(),
        warnings = report.warnings.len(),
        "validated environment"
    );
    report
}

/// Missing or mismatched declared packages. Specifiers that cannot be
/// evaluated are not reported.
pub fn package_warnings(manifest: &MigrationManifest, installed: &BTreeMap<String, String>) -> Vec<String> {
    let deps = &manifest.dependencies;
    let declared = deps
        .pytorch
        .iter()
        .flat_map(|p| p.packages.iter())
        .chain(deps.packages.iter());

    let mut warnings = Vec::new();
    for (name, wanted) in declared {
        let Some(version) = installed.get(&normalize_package_name(name)) else {
            warnings.push(format!("package '{name}' is not installed"));
            continue;
        };
        let spec = requirement_spec(name, wanted);
        let specifier = &spec[name.len()..];
        if specifier_satisfied(version, specifier) == Some(false) {
            warnings.push(format!(
                "package '{name}' is {version}, manifest wants {specifier}"
            ));
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use comfy_manifest::SystemInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn reports_missing_and_mismatched_packages() {
        let mut manifest = MigrationManifest::new(SystemInfo::new("3.11.5"));
        manifest.dependencies.packages.insert("numpy".into(), "1.26.0".into());
        manifest.dependencies.packages.insert("Pillow".into(), ">=10.0".into());
        manifest.dependencies.packages.insert("requests".into(), "2.31.0".into());

        let installed: BTreeMap<String, String> = [
            ("numpy".to_string(), "1.24.0".to_string()),
            ("pillow".to_string(), "10.2.0".to_string()),
        ]
        .into();

        assert_eq!(
            package_warnings(&manifest, &installed),
            vec![
                "package 'numpy' is 1.24.0, manifest wants ==1.26.0".to_string(),
                "package 'requests' is not installed".to_string(),
            ]
        );
    }
}
