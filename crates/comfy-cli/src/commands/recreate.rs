//! Recreate command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_fs::tree::is_missing_or_empty;
use comfy_manifest::MigrationManifest;
use comfy_recreate::{EnvironmentRecreator, RecreateConfig};

use super::{print_errors, print_warnings};
use crate::error::{CliError, Result};
use crate::settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct RecreateOptions {
    pub cache_dir: Option<PathBuf>,
    pub uv_cache_path: Option<PathBuf>,
    pub python_install_path: Option<PathBuf>,
    pub no_cache: bool,
}

pub fn recreate_config(settings: &Settings, options: &RecreateOptions) -> Result<RecreateConfig> {
    let cache_root = if options.no_cache {
        None
    } else {
        Some(settings.cache_root(options.cache_dir.as_deref())?)
    };
    Ok(RecreateConfig {
        uv: settings.uv(),
        git: settings.git(),
        enable_cache: !options.no_cache,
        cache_root,
        uv_cache_dir: options.uv_cache_path.clone(),
        python_install_dir: options.python_install_path.clone(),
        ..RecreateConfig::default()
    })
}

/// Run the recreate command
pub async fn run_recreate(
    settings: &Settings,
    manifest_path: &Path,
    target: &Path,
    options: RecreateOptions,
) -> Result<()> {
    if !is_missing_or_empty(target)? {
        return Err(comfy_recreate::Error::TargetNotEmpty {
            path: target.to_path_buf(),
        }
        .into());
    }
    let manifest = MigrationManifest::load(manifest_path)?;
    let config = recreate_config(settings, &options)?;

    println!(
        "{} {} ({} custom nodes, {} packages)",
        "Recreating".cyan().bold(),
        target.display(),
        manifest.custom_nodes.len(),
        manifest.dependencies.total_count()
    );
    let result = EnvironmentRecreator::new(config)
        .recreate(&manifest, target)
        .await?;

    println!();
    println!("{}", "Environment".bold());
    println!("  {}:  {}", "Python".dimmed(), result.python_path.display());
    println!("  {}: {}", "ComfyUI".dimmed(), result.comfyui_path.display());
    for outcome in &result.package_classes {
        if outcome.result.total == 0 {
            continue;
        }
        let counts = format!("{}/{}", outcome.result.installed_count, outcome.result.total);
        let counts = if outcome.result.success {
            counts.green()
        } else {
            counts.red()
        };
        println!("  {}: {}", outcome.class.to_string().dimmed(), counts);
    }

    println!();
    println!(
        "{} ({} installed, {} failed):",
        "Custom nodes".bold(),
        result.installed_nodes.len(),
        result.failed_nodes.len()
    );
    for name in &result.installed_nodes {
        println!("  {} {}", "+".green(), name.cyan());
    }
    for name in &result.failed_nodes {
        println!("  {} {}", "-".red(), name);
    }

    print_warnings(&result.warnings);
    print_errors(&result.errors);
    println!();
    println!("Finished in {:.1}s", result.duration_seconds);

    if !result.success {
        return Err(CliError::user(format!(
            "recreation finished with {} error(s)",
            result.errors.len()
        )));
    }
    println!("{}", "Environment ready".green().bold());
    Ok(())
}
