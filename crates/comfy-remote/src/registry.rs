//! Extension registry client

use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::http::JsonClient;

/// A registry node record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryNode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Source repository URL as published by the author.
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub latest_version: Option<RegistryVersion>,
}

/// One published version; also the shape of the install-info response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryVersion {
    pub version: String,
    #[serde(default, rename = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, rename = "createdAt")]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionPage {
    Bare(Vec<RegistryVersion>),
    Wrapped { versions: Vec<RegistryVersion> },
}

impl VersionPage {
    fn into_vec(self) -> Vec<RegistryVersion> {
        match self {
            VersionPage::Bare(v) | VersionPage::Wrapped { versions: v } => v,
        }
    }
}

#[derive(Debug)]
pub struct RegistryClient {
    http: JsonClient,
    base_url: String,
    page_size: usize,
    max_pages: usize,
}

impl RegistryClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(
                config.registry_interval(),
                config.request_timeout,
                config.retry.clone(),
                "application/json",
                None,
            )?,
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /nodes/{id}`; `None` when the registry does not know the id.
    pub async fn get_node(&self, id: &str) -> Result<Option<RegistryNode>> {
        let url = self.node_url(id, "")?;
        self.http.get(&url).await
    }

    /// All published versions, following pagination until a short page.
    pub async fn list_versions(&self, id: &str) -> Result<Vec<RegistryVersion>> {
        let base = self.node_url(id, "/versions")?;
        let mut all = Vec::new();
        for page in 1..=self.max_pages {
            let url = format!("{base}?page={page}&limit={}", self.page_size);
            let Some(batch) = self.http.get::<VersionPage>(&url).await? else {
                break;
            };
            let batch = batch.into_vec();
            let short = batch.len() < self.page_size;
            all.extend(batch);
            if short {
                break;
            }
        }
        Ok(all)
    }

    /// `GET /nodes/{id}/install?version=V`: download location for a version.
    pub async fn install_info(&self, id: &str, version: &str) -> Result<Option<RegistryVersion>> {
        let base = self.node_url(id, "/install")?;
        check_segment(version, &base)?;
        self.http.get(&format!("{base}?version={version}")).await
    }

    fn node_url(&self, id: &str, suffix: &str) -> Result<String> {
        let url = format!("{}/nodes/{id}{suffix}", self.base_url);
        check_segment(id, &url)?;
        Ok(url)
    }
}

/// Ids and versions are interpolated into paths and queries verbatim, so only
/// URL-safe characters are accepted.
fn check_segment(segment: &str, url: &str) -> Result<()> {
    let ok = !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'+'));
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidUrl {
            url: url.to_string(),
            reason: format!("'{segment}' is not a valid path segment"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn version_page_accepts_bare_and_wrapped_lists() {
        let bare: VersionPage =
            serde_json::from_str(r#"[{"version": "1.0.0", "downloadUrl": "https://x/1.zip"}]"#).unwrap();
        let wrapped: VersionPage =
            serde_json::from_str(r#"{"versions": [{"version": "1.0.0"}]}"#).unwrap();
        assert_eq!(bare.into_vec()[0].download_url.as_deref(), Some("https://x/1.zip"));
        assert_eq!(wrapped.into_vec()[0].version, "1.0.0");
    }

    #[test]
    fn rejects_ids_that_would_alter_the_url() {
        let client = RegistryClient::new(&RemoteConfig::default()).unwrap();
        assert!(client.node_url("comfyui-manager", "").is_ok());
        assert!(client.node_url("../admin", "").is_err());
        assert!(client.node_url("a?b=c", "").is_err());
    }
}
