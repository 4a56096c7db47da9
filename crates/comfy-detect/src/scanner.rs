//! Custom node directory scanning

use std::fs;
use std::path::Path;

use comfy_manifest::package::parse_requirements;
use comfy_manifest::Requirement;
use git2::{Repository, StatusOptions};

use crate::descriptor::{ExtensionDescriptor, GitInfo, PyprojectInfo};
use crate::error::{Error, Result};

/// Directory names never treated as extensions.
pub const SCAN_BLACKLIST: [&str; 3] = ["__pycache__", ".disabled", "example_node.py.example"];

/// Post-install scripts, in the order they are looked for.
pub const POST_INSTALL_SCRIPTS: [&str; 2] = ["install.py", "setup.py"];

/// Walks `custom_nodes/` and builds one [`ExtensionDescriptor`] per
/// extension directory. Remote validation happens later.
#[derive(Debug, Clone, Default)]
pub struct ExtensionScanner;

impl ExtensionScanner {
    pub fn new() -> Self {
        Self
    }

    /// Scan `custom_nodes`, sorted by directory name. A missing directory
    /// yields no extensions.
    pub fn scan(&self, custom_nodes: &Path) -> Result<Vec<ExtensionDescriptor>> {
        if !custom_nodes.is_dir() {
            tracing::info!(path = %custom_nodes.display(), "no custom_nodes directory");
            return Ok(Vec::new());
        }

        let mut entries: Vec<_> = fs::read_dir(custom_nodes)
            .map_err(|e| comfy_fs::Error::io(custom_nodes, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .filter(|(name, _)| !name.starts_with('.') && !SCAN_BLACKLIST.contains(&name.as_str()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(entries
            .into_iter()
            .map(|(name, path)| self.describe(&name, &path))
            .collect())
    }

    /// Collect local facts about one extension. Problems are recorded on the
    /// descriptor instead of failing the scan.
    pub fn describe(&self, name: &str, path: &Path) -> ExtensionDescriptor {
        let mut desc = ExtensionDescriptor::new(name, path);

        match read_pyproject(&path.join("pyproject.toml")) {
            Ok(Some(project)) => {
                desc.requirements.extend(
                    project
                        .dependencies
                        .iter()
                        .filter_map(|d| Requirement::parse(d).ok()),
                );
                desc.pyproject = Some(project);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(node = name, error = %e, "unreadable pyproject.toml");
                desc.errors.push(e.to_string());
            }
        }

        let requirements = path.join("requirements.txt");
        if requirements.is_file() {
            desc.has_requirements_file = true;
            match fs::read_to_string(&requirements) {
                Ok(content) => {
                    for req in parse_requirements(&content) {
                        if !desc.requirements.iter().any(|r| r.name == req.name && r.specifier == req.specifier) {
                            desc.requirements.push(req);
                        }
                    }
                }
                Err(e) => desc.errors.push(format!("{}: {e}", requirements.display())),
            }
        }

        desc.has_post_install = POST_INSTALL_SCRIPTS.iter().any(|s| path.join(s).is_file());

        if path.join(".git").exists() {
            match read_git_info(path) {
                Ok(info) => desc.git = Some(info),
                Err(e) => {
                    tracing::debug!(node = name, error = %e, "git inspection failed");
                    desc.errors.push(format!("git: {e}"));
                }
            }
        }

        tracing::debug!(
            node = name,
            git = desc.git.is_some(),
            pyproject = desc.pyproject.is_some(),
            requirements = desc.requirements.len(),
            "scanned custom node"
        );
        desc
    }
}

/// Parse `[project]` and `[tool.comfy]`; `Ok(None)` when the file is absent.
pub fn read_pyproject(path: &Path) -> Result<Option<PyprojectInfo>> {
    let Ok(content) = fs::read_to_string(path) else {
        return Ok(None);
    };
    let doc: toml::Table = toml::from_str(&content).map_err(|source| Error::Toml {
        path: path.to_path_buf(),
        source,
    })?;

    let project = doc.get("project").and_then(|v| v.as_table());
    let comfy = doc
        .get("tool")
        .and_then(|v| v.get("comfy"))
        .and_then(|v| v.as_table());
    let string = |table: Option<&toml::Table>, key: &str| {
        table
            .and_then(|t| t.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    Ok(Some(PyprojectInfo {
        name: string(project, "name"),
        version: string(project, "version"),
        dependencies: project
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
            .map(|deps| {
                deps.iter()
                    .filter_map(|d| d.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        publisher_id: string(comfy, "PublisherId"),
        display_name: string(comfy, "DisplayName"),
    }))
}

/// Origin URL, `HEAD` commit, exact tag and dirty flag of a repository.
pub fn read_git_info(path: &Path) -> Result<GitInfo> {
    let repo = Repository::open(path)?;

    let remote_url = repo
        .find_remote("origin")
        .ok()
        .and_then(|r| r.url().map(str::to_string));

    let head = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let commit = head.as_ref().map(|c| c.id().to_string());

    let tag = match &head {
        Some(head) => exact_tag(&repo, head.id())?,
        None => None,
    };

    let mut options = StatusOptions::new();
    options.include_untracked(false).include_ignored(false);
    let dirty = repo
        .statuses(Some(&mut options))
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    Ok(GitInfo {
        remote_url,
        commit,
        tag,
        dirty,
    })
}

/// A tag whose target (peeled) is `oid`; the lexically greatest on ties.
fn exact_tag(repo: &Repository, oid: git2::Oid) -> Result<Option<String>> {
    let names = repo.tag_names(None)?;
    let mut matching: Vec<String> = names
        .iter()
        .flatten()
        .filter(|name| {
            repo.revparse_single(&format!("refs/tags/{name}"))
                .and_then(|obj| obj.peel_to_commit())
                .is_ok_and(|c| c.id() == oid)
        })
        .map(str::to_string)
        .collect();
    matching.sort();
    Ok(matching.pop())
}
