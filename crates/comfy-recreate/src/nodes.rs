//! Custom node installation: cache, archive, git and local strategies

use std::fmt;
use std::path::{Path, PathBuf};

use comfy_cache::NodeCache;
use comfy_fs::tree::{is_missing_or_empty, move_dir};
use comfy_manifest::{CustomNodeSpec, InstallMethod};
use comfy_tools::python::run_script;
use comfy_tools::timeouts::{POST_INSTALL_TIMEOUT, REQUIREMENTS_TIMEOUT};
use comfy_tools::{GitCli, InstallOptions, PackageManager};
use serde::Serialize;
use serde_json::json;

use crate::archive::{self, ArchiveKind};
use crate::config::RecreateConfig;
use crate::error::{Error, Result};

/// Post-install scripts, first match wins.
pub const POST_INSTALL_SCRIPTS: [&str; 2] = ["install.py", "setup.py"];

/// Where an installed node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    Cache,
    Archive,
    Git,
    Local,
}

impl fmt::Display for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeSource::Cache => "cache",
            NodeSource::Archive => "archive",
            NodeSource::Git => "git",
            NodeSource::Local => "local",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeInstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

pub struct CustomNodeInstaller<'a> {
    git: GitCli,
    cache: Option<NodeCache>,
    http: reqwest::Client,
    manager: &'a dyn PackageManager,
    python: PathBuf,
    config: &'a RecreateConfig,
}

impl<'a> CustomNodeInstaller<'a> {
    pub fn new(
        config: &'a RecreateConfig,
        cache: Option<NodeCache>,
        manager: &'a dyn PackageManager,
        python: impl Into<PathBuf>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("comfy-env/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::ClientBuild)?;
        Ok(Self {
            git: GitCli::new(&config.git),
            cache,
            http,
            manager,
            python: python.into(),
            config,
        })
    }

    /// Install every spec under `custom_nodes`. One node's failure never
    /// stops the loop.
    pub async fn install_all(&self, specs: &[CustomNodeSpec], custom_nodes: &Path) -> NodeInstallReport {
        let mut report = NodeInstallReport::default();
        for spec in specs {
            let dest = custom_nodes.join(&spec.name);
            match self.install(spec, &dest).await {
                Ok(source) => {
                    tracing::info!(node = %spec.name, source = %source, "custom node installed");
                    report.installed.push(spec.name.clone());
                    if spec.has_post_install
                        && let Some(warning) = self.post_install(spec, &dest).await
                    {
                        report.warnings.push(warning);
                    }
                    if let Some(warning) = self.node_requirements(spec, &dest).await {
                        report.warnings.push(warning);
                    }
                }
                Err(e) => {
                    tracing::error!(node = %spec.name, error = %e, "custom node install failed");
                    report.failed.push(spec.name.clone());
                    report.errors.push(format!("{}: {e}", spec.name));
                }
            }
        }
        report
    }

    /// Install one node at `dest`.
    pub async fn install(&self, spec: &CustomNodeSpec, dest: &Path) -> Result<NodeSource> {
        spec.validate()?;
        if spec.install_method == InstallMethod::Local {
            return install_local(spec, dest);
        }
        if self.restore_from_cache(spec, dest) {
            return Ok(NodeSource::Cache);
        }

        let parent = dest.parent().unwrap_or(dest);
        std::fs::create_dir_all(parent).map_err(|e| comfy_fs::Error::io(parent, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(".comfy-env-")
            .tempdir_in(parent)
            .map_err(|e| comfy_fs::Error::io(parent, e))?;

        match spec.install_method {
            InstallMethod::Archive => {
                self.install_archive(spec, scratch.path(), dest).await?;
                Ok(NodeSource::Archive)
            }
            InstallMethod::Git => {
                self.install_git(spec, scratch.path(), dest).await?;
                Ok(NodeSource::Git)
            }
            InstallMethod::Local => install_local(spec, dest),
        }
    }

    async fn install_archive(&self, spec: &CustomNodeSpec, scratch: &Path, dest: &Path) -> Result<()> {
        let download = scratch.join("download");
        archive::download(
            &self.http,
            &spec.url,
            &download,
            self.config.download_timeout,
            self.config.max_download_size,
        )
        .await?;

        let kind = ArchiveKind::detect_file(&download)?.ok_or_else(|| Error::UnsupportedArchive {
            url: spec.url.clone(),
        })?;
        let extracted = scratch.join("extract");
        archive::extract(&download, kind, &extracted)?;
        let source = archive::source_root(&extracted)?;

        self.populate_cache(
            spec,
            &source,
            Some(&download),
            json!({ "url": spec.url, "format": kind.as_str() }),
        );
        move_dir(&source, dest)?;
        Ok(())
    }

    async fn install_git(&self, spec: &CustomNodeSpec, scratch: &Path, dest: &Path) -> Result<()> {
        let checkout = scratch.join("repo");
        self.git.clone_repo(&spec.url, &checkout).await?;
        if let Some(git_ref) = &spec.git_ref {
            self.git.checkout(&checkout, git_ref).await?;
        }
        let commit = self.git.head_commit(&checkout).await.ok();

        self.populate_cache(
            spec,
            &checkout,
            None,
            json!({ "url": spec.url, "ref": spec.git_ref, "commit": commit }),
        );
        move_dir(&checkout, dest)?;
        Ok(())
    }

    /// A cache problem is never fatal; it only costs a fresh fetch.
    fn restore_from_cache(&self, spec: &CustomNodeSpec, dest: &Path) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        match cache.copy_from_cache(spec, dest) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(node = %spec.name, error = %e, "cache restore failed, fetching");
                false
            }
        }
    }

    fn populate_cache(
        &self,
        spec: &CustomNodeSpec,
        source: &Path,
        archive: Option<&Path>,
        info: serde_json::Value,
    ) {
        if let Some(cache) = &self.cache
            && let Err(e) = cache.cache_node(spec, source, archive, info)
        {
            tracing::warn!(node = %spec.name, error = %e, "could not cache custom node");
        }
    }

    /// Run the node's post-install script with the target interpreter.
    async fn post_install(&self, spec: &CustomNodeSpec, dest: &Path) -> Option<String> {
        let script = POST_INSTALL_SCRIPTS
            .iter()
            .map(|s| dest.join(s))
            .find(|p| p.is_file())?;
        tracing::info!(node = %spec.name, script = %script.display(), "running post-install script");
        match run_script(&self.python, &script, dest, POST_INSTALL_TIMEOUT).await {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(node = %spec.name, error = %e, "post-install script failed");
                Some(format!("{}: post-install script failed: {e}", spec.name))
            }
        }
    }

    async fn node_requirements(&self, spec: &CustomNodeSpec, dest: &Path) -> Option<String> {
        let requirements = dest.join("requirements.txt");
        if !requirements.is_file() {
            return None;
        }
        let options = InstallOptions::default().with_timeout(REQUIREMENTS_TIMEOUT);
        match self
            .manager
            .install_requirements(&self.python, &requirements, &options)
            .await
        {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(node = %spec.name, error = %e, "node requirements failed");
                Some(format!("{}: requirements install failed: {e}", spec.name))
            }
        }
    }
}

/// Local nodes are pre-staged; presence is success.
fn install_local(spec: &CustomNodeSpec, dest: &Path) -> Result<NodeSource> {
    if is_missing_or_empty(dest)? {
        return Err(Error::LocalNodeMissing {
            name: spec.name.clone(),
            path: dest.to_path_buf(),
        });
    }
    tracing::debug!(node = %spec.name, "local node already present");
    Ok(NodeSource::Local)
}
