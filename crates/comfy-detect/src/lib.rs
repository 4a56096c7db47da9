//! Environment capture for comfy-env.
//!
//! A [`Detector`] inspects an application install and its interpreter,
//! scans `custom_nodes/`, optionally validates each extension against the
//! registry and GitHub, ranks install sources and resolves package versions
//! into a [`MigrationManifest`](comfy_manifest::MigrationManifest) plus a
//! diagnostic [`DetectionReport`].

pub mod config;
pub mod conflicts;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod packages;
pub mod pipeline;
pub mod priority;
pub mod report;
pub mod scanner;
pub mod system;
pub mod validation;

pub use config::DetectConfig;
pub use conflicts::{Conflict, DependencySource, Resolution};
pub use descriptor::ExtensionDescriptor;
pub use error::{Error, Result};
pub use generator::{DroppedNode, ManifestGenerator};
pub use packages::{InstalledPackages, PackageDetector};
pub use pipeline::Detector;
pub use priority::{InstallPriority, PriorityKind, ScoringConfig};
pub use report::{DetectionReport, OutputPaths};
pub use scanner::ExtensionScanner;
pub use system::SystemDetector;
pub use validation::RemoteValidator;
