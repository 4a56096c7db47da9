//! Python package naming and requirement-line parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// The core accelerator packages recorded in the manifest's `pytorch` block.
pub const PYTORCH_PACKAGES: [&str; 3] = ["torch", "torchvision", "torchaudio"];

/// Accelerator-adjacent packages that are resolved with torch, never through
/// the regular conflict path.
const ACCELERATOR_EXTRAS: [&str; 3] = ["xformers", "triton", "pytorch-triton"];

/// Prefix of vendor driver/runtime wheels (`nvidia-cudnn-cu12`, ...).
const ACCELERATOR_VENDOR_PREFIX: &str = "nvidia-";

/// Base of the accelerator package index.
pub const PYTORCH_INDEX_BASE: &str = "https://download.pytorch.org/whl";

static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_.]+").unwrap());

static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<rest>.*)$")
        .unwrap()
});

static EGG_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#&]egg=(?P<name>[A-Za-z0-9._-]+)").unwrap());

/// Normalize a package name per PEP 503: lowercase, runs of `-`, `_`, `.`
/// collapsed to a single hyphen.
pub fn normalize_package_name(name: &str) -> String {
    SEPARATORS
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// True for `torch`, `torchvision` and `torchaudio`.
pub fn is_pytorch_package(name: &str) -> bool {
    let normalized = normalize_package_name(name);
    PYTORCH_PACKAGES.contains(&normalized.as_str())
}

/// True for any package excluded from regular conflict resolution because it
/// is tied to the accelerator stack.
pub fn is_accelerator_package(name: &str) -> bool {
    let normalized = normalize_package_name(name);
    PYTORCH_PACKAGES.contains(&normalized.as_str())
        || ACCELERATOR_EXTRAS.contains(&normalized.as_str())
        || normalized.starts_with(ACCELERATOR_VENDOR_PREFIX)
}

/// Index URL for a torch build, derived from its local version label.
///
/// `2.1.0+cu121` maps to `.../whl/cu121`; a version without a label maps to
/// the CPU index.
pub fn pytorch_index_url(torch_version: &str) -> String {
    let tag = torch_version
        .split_once('+')
        .map(|(_, local)| local.trim())
        .filter(|local| !local.is_empty())
        .unwrap_or("cpu");
    format!("{PYTORCH_INDEX_BASE}/{tag}")
}

/// Install spec for a manifest package entry: `name==version`, or
/// `name<spec>` when the value is itself a specifier (declared but not
/// installed at capture time).
pub fn requirement_spec(name: &str, version: &str) -> String {
    let version = version.trim();
    if version.starts_with(['<', '>', '=', '!', '~']) {
        format!("{name}{version}")
    } else {
        format!("{name}=={version}")
    }
}

/// One parsed requirement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// PEP 503 normalized name.
    pub name: String,
    pub extras: Vec<String>,
    /// Raw version specifier with whitespace removed; empty means unconstrained.
    pub specifier: String,
    /// Direct reference (`name @ url`, VCS URL or editable path).
    pub url: Option<String>,
    /// Environment marker after `;`, unevaluated.
    pub marker: Option<String>,
    pub editable: bool,
}

impl Requirement {
    /// Parse a single requirement line (PEP 508 subset plus pip's `-e`).
    pub fn parse(line: &str) -> Result<Self> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Err(Error::RequirementParse {
                line: line.to_string(),
                reason: "empty requirement".into(),
            });
        }

        if let Some(target) = line
            .strip_prefix("--editable")
            .or_else(|| line.strip_prefix("-e"))
        {
            return Ok(Self::editable(target.trim_start_matches('=').trim()));
        }

        if is_vcs_url(line) {
            let name = egg_name(line).unwrap_or_else(|| name_from_url(line));
            return Ok(Self {
                name: normalize_package_name(&name),
                extras: Vec::new(),
                specifier: String::new(),
                url: Some(line.to_string()),
                marker: None,
                editable: false,
            });
        }

        let (body, marker) = match line.split_once(';') {
            Some((body, marker)) => (body.trim(), Some(marker.trim().to_string())),
            None => (line, None),
        };

        let caps = REQUIREMENT
            .captures(body)
            .ok_or_else(|| Error::RequirementParse {
                line: line.to_string(),
                reason: "missing package name".into(),
            })?;

        let extras = caps
            .name("extras")
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let rest = caps.name("rest").map_or("", |m| m.as_str()).trim();
        let (specifier, url) = if let Some(url) = rest.strip_prefix('@') {
            (String::new(), Some(url.trim().to_string()))
        } else {
            let spec: String = rest
                .trim_start_matches('(')
                .trim_end_matches(')')
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if !spec.is_empty() && !spec.starts_with(['<', '>', '=', '!', '~']) {
                return Err(Error::RequirementParse {
                    line: line.to_string(),
                    reason: format!("unexpected text after name: '{rest}'"),
                });
            }
            (spec, None)
        };

        Ok(Self {
            name: normalize_package_name(&caps["name"]),
            extras,
            specifier,
            url,
            marker,
            editable: false,
        })
    }

    fn editable(target: &str) -> Self {
        let name = egg_name(target).unwrap_or_else(|| name_from_url(target));
        Self {
            name: normalize_package_name(&name),
            extras: Vec::new(),
            specifier: String::new(),
            url: Some(target.to_string()),
            marker: None,
            editable: true,
        }
    }

    /// True when this requirement is sourced from version control.
    pub fn is_vcs(&self) -> bool {
        self.url.as_deref().is_some_and(is_vcs_url)
    }
}

/// Parse a requirements file body, skipping blanks, comments and pip options.
///
/// Lines that fail to parse are skipped with a debug log; a single malformed
/// line never invalidates the whole file.
pub fn parse_requirements(content: &str) -> Vec<Requirement> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            !line.starts_with('-') || line.starts_with("-e") || line.starts_with("--editable")
        })
        .filter_map(|line| match Requirement::parse(line) {
            Ok(req) => Some(req),
            Err(e) => {
                tracing::debug!(line, error = %e, "skipping unparseable requirement");
                None
            }
        })
        .collect()
}

/// True for pip VCS URLs (`git+https://...`, `git+ssh://...`, ...).
pub fn is_vcs_url(s: &str) -> bool {
    let s = s.trim();
    ["git+", "hg+", "svn+", "bzr+"]
        .iter()
        .any(|prefix| s.starts_with(prefix))
}

fn strip_comment(line: &str) -> &str {
    match line.find(" #") {
        Some(idx) => &line[..idx],
        None if line.trim_start().starts_with('#') => "",
        None => line,
    }
}

fn egg_name(url: &str) -> Option<String> {
    EGG_FRAGMENT
        .captures(url)
        .map(|caps| caps["name"].to_string())
}

fn name_from_url(url: &str) -> String {
    let path = url
        .split(['#', '?'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/');
    let last = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let last = last.split('@').next().unwrap_or(last);
    last.trim_end_matches(".git").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("NumPy", "numpy")]
    #[case("typing_extensions", "typing-extensions")]
    #[case("zope.interface", "zope-interface")]
    #[case("Foo__Bar-.baz", "foo-bar-baz")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_package_name(input), expected);
    }

    #[test]
    fn test_requirement_spec() {
        assert_eq!(requirement_spec("numpy", "1.26.0"), "numpy==1.26.0");
        assert_eq!(requirement_spec("kornia", ">=0.7"), "kornia>=0.7");
    }

    #[test]
    fn test_accelerator_classification() {
        assert!(is_pytorch_package("Torch"));
        assert!(!is_pytorch_package("xformers"));
        assert!(is_accelerator_package("xformers"));
        assert!(is_accelerator_package("nvidia-cudnn-cu12"));
        assert!(is_accelerator_package("nvidia_cublas_cu12"));
        assert!(!is_accelerator_package("numpy"));
    }

    #[test]
    fn test_index_url() {
        assert_eq!(
            pytorch_index_url("2.1.0+cu121"),
            "https://download.pytorch.org/whl/cu121"
        );
        assert_eq!(pytorch_index_url("2.1.0"), "https://download.pytorch.org/whl/cpu");
    }

    #[test]
    fn test_parse_simple() {
        let req = Requirement::parse("numpy>=1.25.0").unwrap();
        assert_eq!(req.name, "numpy");
        assert_eq!(req.specifier, ">=1.25.0");
        assert!(req.url.is_none());
    }

    #[test]
    fn test_parse_extras_marker_and_spaces() {
        let req =
            Requirement::parse("Pillow[tiff, webp] >= 9.0 , < 11 ; python_version >= '3.8'").unwrap();
        assert_eq!(req.name, "pillow");
        assert_eq!(req.extras, vec!["tiff", "webp"]);
        assert_eq!(req.specifier, ">=9.0,<11");
        assert_eq!(req.marker.as_deref(), Some("python_version >= '3.8'"));
    }

    #[test]
    fn test_parse_unconstrained() {
        let req = Requirement::parse("opencv-python").unwrap();
        assert_eq!(req.specifier, "");
    }

    #[test]
    fn test_parse_direct_reference() {
        let req = Requirement::parse("clip @ git+https://github.com/openai/CLIP.git").unwrap();
        assert_eq!(req.name, "clip");
        assert!(req.is_vcs());
    }

    #[test]
    fn test_parse_bare_vcs_url() {
        let req = Requirement::parse("git+https://github.com/org/some_pkg.git@v1#egg=some_pkg").unwrap();
        assert_eq!(req.name, "some-pkg");
        assert!(req.is_vcs());
    }

    #[test]
    fn test_parse_editable() {
        let req = Requirement::parse("-e ./libs/my_lib").unwrap();
        assert!(req.editable);
        assert_eq!(req.name, "my-lib");
        assert_eq!(req.url.as_deref(), Some("./libs/my_lib"));
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        assert!(Requirement::parse("numpy please").is_err());
    }

    #[test]
    fn test_parse_requirements_file() {
        let content = "\
# comment
numpy==1.26.0  # pinned
--extra-index-url https://example.com/simple

scipy
-e ./local_pkg
not valid !!
";
        let reqs = parse_requirements(content);
        let names: Vec<_> = reqs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["numpy", "scipy", "local-pkg"]);
        assert_eq!(reqs[0].specifier, "==1.26.0");
    }
}
