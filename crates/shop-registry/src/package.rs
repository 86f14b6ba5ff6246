//! Package records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timestamp::UnixTimestamp;
use crate::validate::check_package_name;
use crate::version::{Record, API_VERSION};

/// A named package. The name doubles as its storage prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub api_version: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Secondary repository holding this package's blobs. `None` means the
    /// root repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub updated_at: UnixTimestamp,
}

impl Package {
    pub fn new(name: &str, description: Option<String>, repo: Option<String>) -> Result<Self> {
        check_package_name(name)?;
        Ok(Package {
            api_version: API_VERSION.to_string(),
            name: name.to_string(),
            description: description.filter(|d| !d.is_empty()),
            repo: repo.filter(|r| !r.is_empty()),
            updated_at: UnixTimestamp::now(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.name)
    }

    /// Name of the secondary repository, treating an empty name as root.
    pub fn repo_name(&self) -> Option<&str> {
        self.repo.as_deref().filter(|r| !r.is_empty())
    }
}

impl Record for Package {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            write!(f, "\t{description}")?;
        }
        if let Some(repo) = self.repo_name() {
            write!(f, "\trepo={repo}")?;
        }
        Ok(())
    }
}

/// Result of listing a package prefix: either a package or a prefix that
/// contains further packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageOrPrefix {
    Package(Package),
    Prefix { name: String },
}

impl fmt::Display for PackageOrPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageOrPrefix::Package(package) => write!(f, "{package}"),
            PackageOrPrefix::Prefix { name } => write!(f, "{name}/"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_name() {
        assert!(Package::new("tools/clang", None, None).is_ok());
        assert!(Package::new("tools/", None, None).is_err());
    }

    #[test]
    fn empty_optionals_are_omitted() {
        let package = Package::new("tools/clang", Some(String::new()), None).unwrap();
        let json = serde_json::to_value(&package).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("repo").is_none());
        assert!(json["updated_at"].is_i64());
    }

    #[test]
    fn display() {
        let package = Package::new("tools/clang", Some("C compiler".into()), Some("blobs".into()))
            .unwrap();
        assert_eq!(package.to_string(), "tools/clang\tC compiler\trepo=blobs");

        let prefix = PackageOrPrefix::Prefix { name: "tools".into() };
        assert_eq!(prefix.to_string(), "tools/");
    }
}
