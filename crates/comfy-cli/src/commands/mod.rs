//! Command implementations for comfy-cli

pub mod cache;
pub mod detect;
pub mod recreate;

pub use cache::run_cache;
pub use detect::{DetectOptions, run_detect};
pub use recreate::{RecreateOptions, run_recreate};

use colored::Colorize;

/// Print a titled list of warnings, if any.
pub(crate) fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Warnings".yellow().bold(), warnings.len());
    for warning in warnings {
        println!("  {} {}", "!".yellow(), warning);
    }
}

/// Print a titled list of errors, if any.
pub(crate) fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", "Errors".red().bold(), errors.len());
    for error in errors {
        println!("  {} {}", "x".red(), error);
    }
}
