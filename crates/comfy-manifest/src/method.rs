//! Install method tag for custom nodes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// How a custom node is materialized on the target host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    /// Download an archive and extract it.
    Archive,
    /// Clone a version-control repository.
    Git,
    /// Already present on the target; nothing to fetch.
    Local,
}

impl InstallMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Git => "git",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstallMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(Self::Archive),
            "git" => Ok(Self::Git),
            "local" => Ok(Self::Local),
            other => Err(Error::InvalidInstallMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("GIT".parse::<InstallMethod>().unwrap(), InstallMethod::Git);
        assert_eq!(" archive ".parse::<InstallMethod>().unwrap(), InstallMethod::Archive);
        assert!("registry".parse::<InstallMethod>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&InstallMethod::Local).unwrap(), "\"local\"");
    }
}
