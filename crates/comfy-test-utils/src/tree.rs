//! [`ComfyTree`] builder for fake application installs.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary application tree:
///
/// ```text
/// <tmp>/ComfyUI/requirements.txt
/// <tmp>/ComfyUI/custom_nodes/<node>/...
/// ```
pub struct ComfyTree {
    temp_dir: TempDir,
}

impl Default for ComfyTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComfyTree {
    /// Empty application with an empty `custom_nodes/`.
    pub fn new() -> Self {
        let tree = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(tree.custom_nodes()).unwrap();
        tree
    }

    /// The temporary directory holding the tree.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The application directory.
    pub fn app(&self) -> PathBuf {
        self.root().join("ComfyUI")
    }

    pub fn custom_nodes(&self) -> PathBuf {
        self.app().join("custom_nodes")
    }

    /// Write `content` at `relative` under the application directory.
    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.app().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    /// Application-level `requirements.txt`.
    pub fn requirements(&self, content: &str) -> &Self {
        self.write("requirements.txt", content)
    }

    /// `comfyui_version.py` declaring `version`.
    pub fn app_version(&self, version: &str) -> &Self {
        self.write("comfyui_version.py", &format!("__version__ = \"{version}\"\n"))
    }

    /// A minimal custom node directory with an `__init__.py`.
    pub fn node(&self, name: &str) -> PathBuf {
        let dir = self.custom_nodes().join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__init__.py"), "NODE_CLASS_MAPPINGS = {}\n").unwrap();
        dir
    }

    /// A custom node with a `pyproject.toml` declaring name, version and
    /// dependencies.
    pub fn node_with_pyproject(&self, dir_name: &str, project: &str, version: &str, deps: &[&str]) -> PathBuf {
        let dir = self.node(dir_name);
        let deps = deps
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            dir.join("pyproject.toml"),
            format!(
                "[project]\nname = \"{project}\"\nversion = \"{version}\"\ndependencies = [{deps}]\n\n[tool.comfy]\nPublisherId = \"tester\"\nDisplayName = \"{project}\"\n"
            ),
        )
        .unwrap();
        dir
    }

    /// A custom node with a `requirements.txt`.
    pub fn node_with_requirements(&self, name: &str, requirements: &str) -> PathBuf {
        let dir = self.node(name);
        fs::write(dir.join("requirements.txt"), requirements).unwrap();
        dir
    }
}
