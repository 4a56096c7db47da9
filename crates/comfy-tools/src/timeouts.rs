//! Subprocess timeouts
//!
//! A timeout fails the single operation that hit it, never the whole run.

use std::time::Duration;

pub const CLONE_TIMEOUT: Duration = Duration::from_secs(300);
pub const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(60);
pub const REQUIREMENTS_TIMEOUT: Duration = Duration::from_secs(300);
pub const INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const QUICK_TIMEOUT: Duration = Duration::from_secs(5);
pub const PACKAGE_INSTALL_TIMEOUT: Duration = Duration::from_secs(1800);
pub const VENV_TIMEOUT: Duration = Duration::from_secs(600);
pub const POST_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);
