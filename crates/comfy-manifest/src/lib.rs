//! Migration manifest model for comfy-env.
//!
//! This crate defines the portable manifest that describes a captured
//! environment (runtime, packages, custom nodes), plus the helpers every
//! other crate needs to reason about Python packages: PEP 503 name
//! normalization, requirement-line parsing and version specifiers.

pub mod error;
pub mod method;
pub mod package;
pub mod schema;
pub mod version;

/// The manifest schema version this crate reads and writes.
pub const SCHEMA_VERSION: &str = "1.0";

pub use error::{Error, Result};
pub use method::InstallMethod;
pub use package::{Requirement, is_accelerator_package, is_pytorch_package, normalize_package_name};
pub use schema::{CustomNodeSpec, DependencySpec, MigrationManifest, PytorchSpec, SystemInfo};
pub use version::{VersionConstraint, parse_version};
