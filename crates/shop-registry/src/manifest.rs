//! Registry and repository manifests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::timestamp::UnixTimestamp;
use crate::version::{Record, API_VERSION};

/// Identity of one storage location, stored as `shop-repository.json` at
/// the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryManifest {
    pub api_version: String,
    pub url: String,
    pub name: String,
    /// Read-only mirror serving the same content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly_url: Option<String>,
    pub updated_at: UnixTimestamp,
}

impl RepositoryManifest {
    pub fn new(name: &str, url: &str, readonly_url: Option<String>) -> Self {
        RepositoryManifest {
            api_version: API_VERSION.to_string(),
            url: url.to_string(),
            name: name.to_string(),
            readonly_url,
            updated_at: UnixTimestamp::now(),
        }
    }
}

impl Record for RepositoryManifest {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl std::fmt::Display for RepositoryManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.name, self.url)?;
        if let Some(mirror) = &self.readonly_url {
            write!(f, "\tro={mirror}")?;
        }
        Ok(())
    }
}

/// Root record of a registry, stored as `shop.json` in the root repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryManifest {
    pub api_version: String,
    pub name: String,
    pub root_repo: RepositoryManifest,
    /// Secondary repositories by name.
    #[serde(default)]
    pub repos: BTreeMap<String, RepositoryManifest>,
    pub updated_at: UnixTimestamp,
}

impl RegistryManifest {
    pub fn new(name: &str, root_repo: RepositoryManifest) -> Self {
        RegistryManifest {
            api_version: API_VERSION.to_string(),
            name: name.to_string(),
            root_repo,
            repos: BTreeMap::new(),
            updated_at: UnixTimestamp::now(),
        }
    }
}

impl Record for RegistryManifest {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl std::fmt::Display for RegistryManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}", self.name, self.root_repo.url)?;
        for (name, repo) in &self.repos {
            write!(f, "\n  {name}\t{}", repo.url)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_manifest_omits_missing_mirror() {
        let manifest = RepositoryManifest::new("root", "file:///srv/acme", None);
        let json = serde_json::to_value(&manifest).unwrap();
        assert!(json.get("readonly_url").is_none());
        assert_eq!(json["api_version"], "1.0.0");
        assert!(json["updated_at"].is_i64());
    }

    #[test]
    fn registry_manifest_field_names() {
        let root = RepositoryManifest::new("root", "file:///srv/acme", None);
        let mut manifest = RegistryManifest::new("acme", root.clone());
        manifest.repos.insert("blobs".into(), root);

        let json = serde_json::to_value(&manifest).unwrap();
        for field in ["api_version", "name", "root_repo", "repos", "updated_at"] {
            assert!(json.get(field).is_some(), "{field}");
        }
        let back: RegistryManifest = serde_json::from_value(json).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn repos_default_to_empty() {
        let json = r#"{"api_version":"1.0.0","name":"acme","updated_at":1,
            "root_repo":{"api_version":"1.0.0","url":"file:///x","name":"x","updated_at":1}}"#;
        let manifest: RegistryManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.repos.is_empty());
    }
}
