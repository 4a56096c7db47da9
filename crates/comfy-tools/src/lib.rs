//! Subprocess wrappers for the external collaborator tools.
//!
//! Every invocation goes through [`runner::ToolCommand`]: a program plus a
//! structured argument list, spawned directly (never through a shell) with an
//! explicit timeout. Wrappers exist for the version-control client
//! ([`git::GitCli`]), the package installer ([`uv::UvTool`], [`pip::PipTool`])
//! and the target interpreter ([`python`]).

pub mod error;
pub mod git;
pub mod pip;
pub mod python;
pub mod runner;
pub mod timeouts;
pub mod uv;

pub use error::{Error, Result};
pub use git::GitCli;
pub use pip::{InstallOptions, InstalledPackage, PackageManager, PipTool};
pub use runner::{ToolCommand, ToolOutput};
pub use uv::UvTool;
