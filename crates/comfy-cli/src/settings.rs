//! Settings file and precedence
//!
//! Values come from, in order of preference: command-line flags (clap also
//! folds in `COMFY_ENV_CACHE_DIR`, `COMFY_REGISTRY_URL` and `GITHUB_TOKEN`),
//! the TOML settings file, then library defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use comfy_remote::RemoteConfig;
use serde::Deserialize;

use crate::error::{CliError, Result};

/// Settings file location under the platform config directory.
pub const SETTINGS_SUBPATH: &str = "comfy-env/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub cache: CacheSettings,
    pub install: InstallSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSettings {
    pub registry_url: Option<String>,
    pub github_api_url: Option<String>,
    pub min_interval_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallSettings {
    pub uv: Option<PathBuf>,
    pub git: Option<PathBuf>,
    pub python: Option<PathBuf>,
}

impl Settings {
    /// Load `explicit`, or the default settings file when present.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_settings_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };
        let content = std::fs::read_to_string(&path)
            .map_err(|e| CliError::user(format!("cannot read settings file {}: {e}", path.display())))?;
        let settings = Self::parse(&content).map_err(|source| CliError::Settings {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Remote settings with flag values layered on top.
    pub fn remote_config(&self, registry_url: Option<&str>, github_token: Option<&str>) -> RemoteConfig {
        let mut config = RemoteConfig::default();
        if let Some(url) = registry_url.map(str::to_string).or_else(|| self.remote.registry_url.clone()) {
            config.registry_url = url;
        }
        if let Some(url) = &self.remote.github_api_url {
            config.github_api_url = url.clone();
        }
        if let Some(ms) = self.remote.min_interval_ms {
            config.min_interval = Duration::from_millis(ms);
        }
        if let Some(retries) = self.remote.max_retries {
            config.retry.max_retries = retries;
        }
        config.github_token = github_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        config
    }

    /// Cache root: flag or env, then the settings file, then the platform default.
    pub fn cache_root(&self, flag: Option<&Path>) -> Result<PathBuf> {
        let explicit = flag.or(self.cache.root.as_deref());
        Ok(comfy_fs::resolve_cache_root(explicit)?)
    }

    pub fn uv(&self) -> PathBuf {
        self.install.uv.clone().unwrap_or_else(|| PathBuf::from("uv"))
    }

    pub fn git(&self) -> PathBuf {
        self.install.git.clone().unwrap_or_else(|| PathBuf::from("git"))
    }
}

fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| {
        SETTINGS_SUBPATH
            .split('/')
            .fold(dir, |acc, part| acc.join(part))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_all_sections() {
        let settings = Settings::parse(
            r#"
[remote]
registry_url = "https://registry.internal"
min_interval_ms = 250
max_retries = 2

[cache]
root = "/var/cache/comfy"

[install]
uv = "/opt/uv/bin/uv"
"#,
        )
        .unwrap();
        assert_eq!(settings.remote.min_interval_ms, Some(250));
        assert_eq!(settings.cache.root, Some(PathBuf::from("/var/cache/comfy")));
        assert_eq!(settings.uv(), PathBuf::from("/opt/uv/bin/uv"));
        assert_eq!(settings.git(), PathBuf::from("git"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Settings::parse("[cache]\nroot = \"/c\"\nsize = 3\n").is_err());
    }

    #[test]
    fn flags_win_over_file() {
        let settings = Settings::parse("[remote]\nregistry_url = \"https://file\"\n[cache]\nroot = \"/file\"\n").unwrap();

        let remote = settings.remote_config(Some("https://flag"), Some("  "));
        assert_eq!(remote.registry_url, "https://flag");
        assert_eq!(remote.github_token, None);
        assert_eq!(settings.remote_config(None, None).registry_url, "https://file");

        assert_eq!(settings.cache_root(Some(Path::new("/flag"))).unwrap(), PathBuf::from("/flag"));
        assert_eq!(settings.cache_root(None).unwrap(), PathBuf::from("/file"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
