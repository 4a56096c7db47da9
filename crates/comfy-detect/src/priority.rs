//! Install-source priority scoring
//!
//! Each extension is ranked by which metadata source should govern how it is
//! reinstalled. The ranking is a fixed ordinal table; "close" matches compare
//! versions with a weighted distance that requires equal majors.

use std::fmt;

use comfy_manifest::parse_version;
use serde::Serialize;

use crate::descriptor::ExtensionDescriptor;

/// How much smaller a GitHub distance must be to beat the registry.
pub const CLOSE_MATCH_DOMINANCE: u64 = 10;

/// Source that governs an extension's install method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPriority {
    Registry,
    Github,
    Git,
    Local,
}

impl fmt::Display for InstallPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstallPriority::Registry => "registry",
            InstallPriority::Github => "github",
            InstallPriority::Git => "git",
            InstallPriority::Local => "local",
        })
    }
}

/// The ordinal table, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityKind {
    Local,
    ManifestOnly,
    GitOnly,
    RegistryOnly,
    CloseGithub,
    CloseRegistry,
    ExactGithub,
    ExactRegistry,
}

impl PriorityKind {
    pub fn score(self) -> u32 {
        match self {
            PriorityKind::ExactRegistry => 100,
            PriorityKind::ExactGithub => 90,
            PriorityKind::CloseRegistry => 80,
            PriorityKind::CloseGithub => 70,
            PriorityKind::RegistryOnly => 60,
            PriorityKind::GitOnly => 40,
            PriorityKind::ManifestOnly => 20,
            PriorityKind::Local => 0,
        }
    }

    pub fn priority(self) -> InstallPriority {
        match self {
            PriorityKind::ExactRegistry | PriorityKind::CloseRegistry | PriorityKind::RegistryOnly => {
                InstallPriority::Registry
            }
            PriorityKind::ExactGithub | PriorityKind::CloseGithub => InstallPriority::Github,
            PriorityKind::GitOnly => InstallPriority::Git,
            PriorityKind::ManifestOnly | PriorityKind::Local => InstallPriority::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringConfig {
    /// A GitHub close match wins only when its distance times this factor is
    /// still below the registry distance.
    pub dominance_factor: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            dominance_factor: CLOSE_MATCH_DOMINANCE,
        }
    }
}

/// Weighted distance between two versions: `None` when majors differ,
/// otherwise `|Δminor| * 1000 + |Δpatch|`.
pub fn version_distance(a: &str, b: &str) -> Option<u64> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;
    if a.major != b.major {
        return None;
    }
    Some(a.minor.abs_diff(b.minor) * 1000 + a.patch.abs_diff(b.patch))
}

/// Version strings equal after dropping a leading `v`.
pub fn versions_equal(a: &str, b: &str) -> bool {
    let strip = |s: &str| {
        let s = s.trim();
        s.strip_prefix(['v', 'V']).unwrap_or(s).to_string()
    };
    let (a, b) = (strip(a), strip(b));
    if a == b {
        return true;
    }
    matches!((parse_version(&a), parse_version(&b)), (Some(x), Some(y)) if x == y)
}

/// Pick the closest candidate to `target` by [`version_distance`].
pub fn closest_version<'a, I>(target: &str, candidates: I) -> Option<(&'a str, u64)>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter_map(|c| version_distance(target, c).map(|d| (c, d)))
        .min_by_key(|(_, d)| *d)
}

/// Rank `desc` and record the outcome on it.
pub fn assign_priority(desc: &mut ExtensionDescriptor, config: &ScoringConfig) {
    let (kind, reason) = classify(desc, config);
    desc.priority_kind = kind;
    desc.install_priority = kind.priority();
    desc.priority_score = kind.score();
    desc.priority_reason = reason;
}

fn classify(desc: &ExtensionDescriptor, config: &ScoringConfig) -> (PriorityKind, String) {
    if !desc.errors.is_empty() {
        return (
            PriorityKind::Local,
            format!("validation failed: {}", desc.errors.join("; ")),
        );
    }

    let registry = desc.registry.as_ref().filter(|r| r.found);
    let github = desc.github.as_ref();

    if let Some(r) = registry.filter(|r| r.exact_match) {
        return (
            PriorityKind::ExactRegistry,
            format!(
                "registry publishes version {}",
                r.matched_version.as_deref().unwrap_or("?")
            ),
        );
    }
    if let Some(g) = github.filter(|g| g.exact_match) {
        return (
            PriorityKind::ExactGithub,
            format!(
                "GitHub {} has tag {}",
                g.repo,
                g.matched_tag.as_deref().unwrap_or("?")
            ),
        );
    }

    let registry_close = registry.and_then(|r| r.distance.map(|d| (r, d)));
    let github_close = github.and_then(|g| g.distance.map(|d| (g, d)));
    match (registry_close, github_close) {
        (Some((r, rd)), Some((g, gd))) => {
            if gd.saturating_mul(config.dominance_factor) < rd {
                return (
                    PriorityKind::CloseGithub,
                    format!(
                        "GitHub tag {} (distance {gd}) dominates registry {} (distance {rd})",
                        g.closest_tag.as_deref().unwrap_or("?"),
                        r.closest_version.as_deref().unwrap_or("?")
                    ),
                );
            }
            return (
                PriorityKind::CloseRegistry,
                format!(
                    "registry version {} (distance {rd}) preferred over GitHub (distance {gd})",
                    r.closest_version.as_deref().unwrap_or("?")
                ),
            );
        }
        (Some((r, rd)), None) => {
            return (
                PriorityKind::CloseRegistry,
                format!(
                    "registry version {} is close (distance {rd})",
                    r.closest_version.as_deref().unwrap_or("?")
                ),
            );
        }
        (None, Some((g, gd))) => {
            return (
                PriorityKind::CloseGithub,
                format!(
                    "GitHub tag {} is close (distance {gd})",
                    g.closest_tag.as_deref().unwrap_or("?")
                ),
            );
        }
        (None, None) => {}
    }

    if let Some(r) = registry {
        return (
            PriorityKind::RegistryOnly,
            format!("listed in registry as '{}' without a matching version", r.registry_id),
        );
    }
    if let Some(url) = desc.remote_url() {
        return (PriorityKind::GitOnly, format!("git remote {url}"));
    }
    if desc.pyproject.is_some() {
        return (
            PriorityKind::ManifestOnly,
            "pyproject.toml only, no remote source".to_string(),
        );
    }
    (PriorityKind::Local, "no remote source found".to_string())
}
