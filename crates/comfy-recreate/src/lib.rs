//! Recreation of a captured environment from a migration manifest.
//!
//! [`EnvironmentRecreator`] drives the run: it creates the venv through uv,
//! installs the application and every dependency class with
//! [`PackageInstaller`], installs custom nodes with [`CustomNodeInstaller`]
//! (consulting the node cache first), and finishes with a validation pass.

pub mod archive;
pub mod config;
pub mod error;
pub mod nodes;
pub mod packages;
pub mod recreator;
pub mod result;
pub mod validator;

pub use config::RecreateConfig;
pub use error::{Error, Result};
pub use nodes::{CustomNodeInstaller, NodeInstallReport, NodeSource};
pub use packages::{DependencyClass, PackageInstallResult, PackageInstaller};
pub use recreator::EnvironmentRecreator;
pub use result::{ClassOutcome, EnvironmentResult};
