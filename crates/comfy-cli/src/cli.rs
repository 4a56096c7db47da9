//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// comfy-env - Capture a ComfyUI environment and recreate it elsewhere
#[derive(Parser, Debug)]
#[command(name = "comfy-env")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to <config dir>/comfy-env/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Custom node cache root
    #[arg(long, global = true, env = "COMFY_ENV_CACHE_DIR", value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Capture an installation into a migration manifest
    ///
    /// Writes comfyui_migration.json, comfyui_detection_log.json and
    /// comfyui_requirements.txt into the output directory.
    ///
    /// Examples:
    ///   comfy-env detect ~/ComfyUI
    ///   comfy-env detect ~/ComfyUI --validate-registry -o out/
    Detect {
        /// ComfyUI application directory
        path: PathBuf,

        /// Interpreter of the environment to capture
        #[arg(long)]
        python: Option<PathBuf>,

        /// Look custom nodes up in the registry and on GitHub
        #[arg(long)]
        validate_registry: bool,

        /// Registry base URL
        #[arg(long, env = "COMFY_REGISTRY_URL")]
        registry_url: Option<String>,

        /// Token for GitHub API requests
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,

        /// Do not scan custom_nodes/
        #[arg(long)]
        skip_custom_nodes: bool,

        /// Directory to write the outputs into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Recreate an environment from a migration manifest
    ///
    /// The target must not exist or must be empty.
    Recreate {
        /// Manifest written by `detect`
        manifest: PathBuf,

        /// Directory to build the environment in
        target: PathBuf,

        /// Package cache directory for uv
        #[arg(long)]
        uv_cache_path: Option<PathBuf>,

        /// Directory uv installs interpreters into
        #[arg(long)]
        python_install_path: Option<PathBuf>,

        /// Neither read nor populate the custom node cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Inspect or maintain the custom node cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// List cached custom nodes
    List,

    /// Show cache totals
    Stats,

    /// Remove cached nodes
    ///
    /// Without NAME every entry is removed, which requires --force.
    Clear {
        /// Only remove entries of this node
        name: Option<String>,

        /// Allow clearing the entire cache
        #[arg(long)]
        force: bool,
    },

    /// Recompute content hashes and report mismatches
    Verify,
}
