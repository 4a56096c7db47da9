//! Detect command implementation

use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_detect::{DetectConfig, Detector};
use comfy_tools::{PackageManager, PipTool, UvTool};

use super::print_warnings;
use crate::error::Result;
use crate::settings::Settings;

#[derive(Debug, Clone, Default)]
pub struct DetectOptions {
    pub python: Option<PathBuf>,
    pub validate_registry: bool,
    pub registry_url: Option<String>,
    pub github_token: Option<String>,
    pub skip_custom_nodes: bool,
    pub output: PathBuf,
}

/// Use uv when it answers `--version`, else `python -m pip`.
pub async fn select_package_manager(uv: &Path) -> Box<dyn PackageManager> {
    let uv = UvTool::new(uv);
    match uv.version().await {
        Ok(version) => {
            tracing::debug!(version = %version, "using uv");
            Box::new(uv)
        }
        Err(e) => {
            tracing::info!(error = %e, "uv unavailable, falling back to pip");
            Box::new(PipTool::new())
        }
    }
}

pub fn detect_config(settings: &Settings, options: &DetectOptions) -> DetectConfig {
    DetectConfig {
        python: options
            .python
            .clone()
            .or_else(|| settings.install.python.clone()),
        validate_registry: options.validate_registry,
        skip_custom_nodes: options.skip_custom_nodes,
        remote: settings.remote_config(options.registry_url.as_deref(), options.github_token.as_deref()),
        ..DetectConfig::default()
    }
}

/// Run the detect command
pub async fn run_detect(settings: &Settings, path: &Path, options: DetectOptions) -> Result<()> {
    let config = detect_config(settings, &options);
    let manager = select_package_manager(&settings.uv()).await;
    println!("{} {}", "Detecting".cyan().bold(), path.display());

    let report = Detector::new(config, manager).run(path).await?;
    std::fs::create_dir_all(&options.output)?;
    let outputs = report.write_outputs(&options.output)?;

    let manifest = &report.manifest;
    let system = &manifest.system_info;
    println!();
    println!("{}", "Environment".bold());
    println!("  {}:  {}", "Python".dimmed(), system.python_version);
    println!(
        "  {}:    {}",
        "CUDA".dimmed(),
        system.cuda_version.as_deref().unwrap_or("none")
    );
    println!(
        "  {}:   {}",
        "Torch".dimmed(),
        system.torch_version.as_deref().unwrap_or("none")
    );
    println!(
        "  {}: {}",
        "ComfyUI".dimmed(),
        system.comfyui_version.as_deref().unwrap_or("unknown")
    );
    println!(
        "  {}: {}",
        "Packages".dimmed(),
        manifest.dependencies.total_count()
    );

    println!();
    println!("{} ({}):", "Custom nodes".bold(), manifest.custom_nodes.len());
    for node in &manifest.custom_nodes {
        println!(
            "  {} {} ({})",
            "+".green(),
            node.name.cyan(),
            node.install_method
        );
    }
    for dropped in &report.dropped_nodes {
        println!(
            "  {} {} ({})",
            "-".red(),
            dropped.name,
            dropped.reason.dimmed()
        );
    }

    if !report.conflicts.is_empty() {
        println!();
        println!("{} ({}):", "Conflicts".yellow().bold(), report.conflicts.len());
        for conflict in &report.conflicts {
            println!(
                "  {} requires {}{}, keeping {}",
                conflict.source,
                conflict.package,
                conflict.required,
                conflict.resolved_to
            );
        }
    }
    print_warnings(&report.warnings);

    println!();
    println!("{}", "Wrote".green().bold());
    for path in [&outputs.manifest, &outputs.log, &outputs.requirements] {
        println!("  {}", path.display());
    }
    Ok(())
}
