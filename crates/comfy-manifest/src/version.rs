//! Version parsing and PEP 440-style constraint checking.
//!
//! Python package versions are mapped onto `semver::Version` so ordering can
//! reuse semver's comparison rules:
//!
//! - the release is padded to `major.minor.patch` (`"1.24"` -> `1.24.0`),
//!   extra release components are dropped
//! - pre-releases become semver pre-release identifiers: `a`, `b` and `rc`
//!   keep their tag, `.devN` becomes the numeric identifier `0.N` so it sorts
//!   before any alpha
//! - local version labels (`+cu121`) and post releases are ignored for
//!   comparison
//!
//! # Examples
//!
//! ```
//! use comfy_manifest::version::VersionConstraint;
//!
//! let constraint = VersionConstraint::parse(">=1.25.0").unwrap();
//! assert!(constraint.satisfies("1.26.4"));
//! assert!(!constraint.satisfies("1.23.0"));
//!
//! let constraint = VersionConstraint::parse("~=2.1").unwrap();
//! assert!(constraint.satisfies("2.9.0"));
//! assert!(!constraint.satisfies("3.0.0"));
//! ```

use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};

use crate::error::{Error, Result};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^v?
        (?:\d+!)?
        (?P<release>\d+(?:\.\d+)*)
        (?:[-_.]?(?P<pre>alpha|beta|preview|pre|rc|a|b|c)[-_.]?(?P<pre_n>\d*))?
        (?:[-_.]?(?:post|rev|r)[-_.]?\d*)?
        (?:[-_.]?(?P<dev>dev)[-_.]?(?P<dev_n>\d*))?
        $",
    )
    .unwrap()
});

/// Parse a Python-style version string into a comparable `semver::Version`.
///
/// Returns `None` when the string is not a recognizable version.
pub fn parse_version(raw: &str) -> Option<Version> {
    parse_release(raw).map(|(version, _)| version)
}

/// Parse a version and also return its explicit release components.
fn parse_release(raw: &str) -> Option<(Version, Vec<u64>)> {
    let trimmed = raw.trim();
    let public = trimmed.split('+').next().unwrap_or(trimmed);
    let caps = VERSION_PATTERN.captures(public)?;

    let release: Vec<u64> = caps["release"]
        .split('.')
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    let component = |i: usize| release.get(i).copied().unwrap_or(0);

    let mut version = Version::new(component(0), component(1), component(2));

    let pre = match (caps.name("pre"), caps.name("dev")) {
        (Some(tag), _) => {
            let tag = match tag.as_str().to_ascii_lowercase().as_str() {
                "a" | "alpha" => "a",
                "b" | "beta" => "b",
                _ => "rc",
            };
            let n = caps.name("pre_n").map_or("", |m| m.as_str());
            Some(format!("{tag}.{}", if n.is_empty() { "0" } else { n }))
        }
        (None, Some(_)) => {
            let n = caps.name("dev_n").map_or("", |m| m.as_str());
            Some(format!("0.{}", if n.is_empty() { "0" } else { n }))
        }
        (None, None) => None,
    };
    if let Some(pre) = pre {
        version.pre = Prerelease::new(&pre).ok()?;
    }
    version.build = BuildMetadata::EMPTY;

    Some((version, release))
}

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: Version,
    /// Release components as written, used for `~=` and `.*` prefix matching.
    release: Vec<u64>,
    wildcard: bool,
    raw_version: String,
}

impl Specifier {
    fn matches(&self, candidate: &Version, raw_candidate: &str) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq if self.wildcard => prefix_matches(candidate, &self.release),
            CompareOp::Ne if self.wildcard => !prefix_matches(candidate, &self.release),
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
            CompareOp::Compatible => {
                let prefix_len = self.release.len().saturating_sub(1).max(1);
                candidate >= &self.version
                    && prefix_matches(candidate, &self.release[..prefix_len])
            }
            CompareOp::Arbitrary => raw_candidate.trim() == self.raw_version,
        }
    }
}

fn prefix_matches(candidate: &Version, prefix: &[u64]) -> bool {
    let parts = [candidate.major, candidate.minor, candidate.patch];
    prefix
        .iter()
        .enumerate()
        .all(|(i, want)| parts.get(i).is_some_and(|have| have == want))
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// Supports comma-separated compound constraints (all must match).
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a version constraint string such as `>=1.2,<2` or `==3.0.*`.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.trim().to_string();
        let mut specifiers = Vec::new();

        for part in raw.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            specifiers.push(parse_specifier(part)?);
        }

        if specifiers.is_empty() {
            return Err(Error::VersionConstraintParse {
                constraint: raw,
                reason: "empty constraint".to_string(),
            });
        }

        Ok(Self { specifiers, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        let Some(parsed) = parse_version(version) else {
            return false;
        };
        self.specifiers
            .iter()
            .all(|spec| spec.matches(&parsed, version))
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The version pinned by a lone `==` specifier, if that is all this is.
    pub fn pinned_version(&self) -> Option<&str> {
        match self.specifiers.as_slice() {
            [spec] if matches!(spec.op, CompareOp::Eq | CompareOp::Arbitrary) && !spec.wildcard => {
                Some(spec.raw_version.as_str())
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Check an installed version against a raw specifier string.
///
/// An empty specifier is unconstrained and always satisfied. Returns `None`
/// when either side cannot be parsed, so callers can decide how to report it.
pub fn specifier_satisfied(installed: &str, specifier: &str) -> Option<bool> {
    if specifier.trim().is_empty() {
        return Some(true);
    }
    let constraint = VersionConstraint::parse(specifier).ok()?;
    parse_version(installed)?;
    Some(constraint.satisfies(installed))
}

/// Parse a single specifier like `>=3.12` or `==1.2.*`.
fn parse_specifier(s: &str) -> Result<Specifier> {
    const OPERATORS: [(&str, CompareOp); 8] = [
        ("===", CompareOp::Arbitrary),
        ("~=", CompareOp::Compatible),
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ];

    let (op, version_str) = OPERATORS
        .iter()
        .find_map(|(prefix, op)| s.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((CompareOp::Eq, s));
    let version_str = version_str.trim();

    let parse_err = |reason: String| Error::VersionConstraintParse {
        constraint: s.to_string(),
        reason,
    };

    if op == CompareOp::Arbitrary {
        return Ok(Specifier {
            op,
            version: parse_version(version_str).unwrap_or_else(|| Version::new(0, 0, 0)),
            release: Vec::new(),
            wildcard: false,
            raw_version: version_str.to_string(),
        });
    }

    let (wildcard, to_parse) = match version_str.strip_suffix(".*") {
        Some(prefix) if matches!(op, CompareOp::Eq | CompareOp::Ne) => (true, prefix),
        Some(_) => return Err(parse_err(format!("wildcard not allowed with '{s}'"))),
        None => (false, version_str),
    };

    let (version, release) =
        parse_release(to_parse).ok_or_else(|| parse_err(format!("invalid version: {version_str}")))?;

    if op == CompareOp::Compatible && release.len() < 2 {
        return Err(parse_err("'~=' requires at least two release components".into()));
    }

    Ok(Specifier {
        op,
        version,
        release,
        wildcard,
        raw_version: version_str.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_version ---

    #[test]
    fn test_pads_release() {
        assert_eq!(parse_version("1.24").unwrap(), Version::new(1, 24, 0));
        assert_eq!(parse_version("3").unwrap(), Version::new(3, 0, 0));
    }

    #[test]
    fn test_strips_local_label() {
        assert_eq!(parse_version("2.1.0+cu121").unwrap(), Version::new(2, 1, 0));
    }

    #[test]
    fn test_leading_v() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
    }

    #[test]
    fn test_prerelease_ordering() {
        let dev = parse_version("1.0.0.dev1").unwrap();
        let alpha = parse_version("1.0.0a1").unwrap();
        let beta = parse_version("1.0.0b2").unwrap();
        let rc = parse_version("1.0.0rc1").unwrap();
        let final_release = parse_version("1.0.0").unwrap();
        assert!(dev < alpha);
        assert!(alpha < beta);
        assert!(beta < rc);
        assert!(rc < final_release);
    }

    #[test]
    fn test_garbage_is_none() {
        assert!(parse_version("not-a-version").is_none());
        assert!(parse_version("").is_none());
    }

    // --- constraints ---

    #[test]
    fn test_satisfies_compound() {
        let c = VersionConstraint::parse(">=1.10,<1.13").unwrap();
        assert!(c.satisfies("1.10.0"));
        assert!(c.satisfies("1.12.5"));
        assert!(!c.satisfies("1.9.0"));
        assert!(!c.satisfies("1.13.0"));
    }

    #[test]
    fn test_eq_ignores_zero_padding_and_local() {
        let c = VersionConstraint::parse("==2.1.0").unwrap();
        assert!(c.satisfies("2.1"));
        assert!(c.satisfies("2.1.0+cu118"));
        assert!(!c.satisfies("2.1.1"));
    }

    #[test]
    fn test_wildcard() {
        let c = VersionConstraint::parse("==1.2.*").unwrap();
        assert!(c.satisfies("1.2.9"));
        assert!(!c.satisfies("1.3.0"));

        let c = VersionConstraint::parse("!=1.2.*").unwrap();
        assert!(!c.satisfies("1.2.0"));
        assert!(c.satisfies("1.3.0"));
    }

    #[test]
    fn test_compatible_release() {
        let c = VersionConstraint::parse("~=1.4.5").unwrap();
        assert!(c.satisfies("1.4.9"));
        assert!(!c.satisfies("1.5.0"));
        assert!(!c.satisfies("1.4.4"));
    }

    #[test]
    fn test_compatible_requires_two_components() {
        assert!(VersionConstraint::parse("~=1").is_err());
    }

    #[test]
    fn test_arbitrary_equality_is_textual() {
        let c = VersionConstraint::parse("===1.0-custom").unwrap();
        assert!(c.satisfies("1.0-custom"));
        assert!(!c.satisfies("1.0"));
    }

    #[test]
    fn test_bare_version_means_eq() {
        let c = VersionConstraint::parse("1.26.0").unwrap();
        assert!(c.satisfies("1.26.0"));
        assert_eq!(c.pinned_version(), Some("1.26.0"));
    }

    #[test]
    fn test_pinned_version_only_for_single_eq() {
        assert_eq!(
            VersionConstraint::parse("==3.0").unwrap().pinned_version(),
            Some("3.0")
        );
        assert_eq!(VersionConstraint::parse(">=3.0").unwrap().pinned_version(), None);
        assert_eq!(
            VersionConstraint::parse("==3.0,!=3.0.1").unwrap().pinned_version(),
            None
        );
    }

    #[test]
    fn test_specifier_satisfied() {
        assert_eq!(specifier_satisfied("1.23.0", ""), Some(true));
        assert_eq!(specifier_satisfied("1.23.0", "==1.24.0"), Some(false));
        assert_eq!(specifier_satisfied("1.23.0", ">=1.20"), Some(true));
        assert_eq!(specifier_satisfied("1.23.0", ">=banana"), None);
        assert_eq!(specifier_satisfied("weird", ">=1.0"), None);
    }

    #[test]
    fn test_display() {
        let c = VersionConstraint::parse(">=1.10, <1.13").unwrap();
        assert_eq!(format!("{c}"), ">=1.10, <1.13");
    }
}
