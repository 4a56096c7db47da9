//! Shared test fixtures for the comfy-env workspace.
//!
//! Dev-dependency only, never published.
//!
//! - [`git`]: repositories with real history, built in-process with `git2`
//! - [`tree`]: [`ComfyTree`](tree::ComfyTree), a fake application tree with custom nodes
//! - [`toolchain`]: [`FakeToolchain`](toolchain::FakeToolchain), shell stand-ins for
//!   `uv`, `git` and `python` that record every call (unix only)

pub mod git;
#[cfg(unix)]
pub mod toolchain;
pub mod tree;
