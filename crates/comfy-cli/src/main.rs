//! comfy-env CLI
//!
//! Captures a ComfyUI installation into a portable manifest and replays
//! that manifest onto a fresh target directory.

mod cli;
mod commands;
mod error;
mod settings;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;
use settings::Settings;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute_command(cli, settings))
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}

async fn execute_command(cli: Cli, settings: Settings) -> Result<()> {
    match cli.command {
        Commands::Detect {
            path,
            python,
            validate_registry,
            registry_url,
            github_token,
            skip_custom_nodes,
            output,
        } => {
            let options = commands::DetectOptions {
                python,
                validate_registry,
                registry_url,
                github_token,
                skip_custom_nodes,
                output,
            };
            commands::run_detect(&settings, &path, options).await
        }
        Commands::Recreate {
            manifest,
            target,
            uv_cache_path,
            python_install_path,
            no_cache,
        } => {
            let options = commands::RecreateOptions {
                cache_dir: cli.cache_dir,
                uv_cache_path,
                python_install_path,
                no_cache,
            };
            commands::run_recreate(&settings, &manifest, &target, options).await
        }
        Commands::Cache { action } => {
            let root = settings.cache_root(cli.cache_dir.as_deref())?;
            commands::run_cache(&root, action)
        }
    }
}
