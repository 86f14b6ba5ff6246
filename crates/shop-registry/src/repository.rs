//! One storage location with JSON helpers, a manifest and a permission tier.
//!
//! Reads are always allowed. Mutations require `write`; manifest updates
//! require `admin`, which implies `write`.

use std::io::{self, Read};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RepositoryConfig;
use crate::cursor::BoxCursor;
use crate::error::{RegistryError, Result};
use crate::keys;
use crate::manifest::RepositoryManifest;
use crate::storage::{BackendRegistry, Entry, StorageBackend};
use crate::timestamp::UnixTimestamp;
use crate::version::{check_api_version, Record};

pub struct Repository {
    config: RepositoryConfig,
    backend: Arc<dyn StorageBackend>,
}

impl Repository {
    /// Open the backend for `config.url` through `backends`.
    pub fn open(config: RepositoryConfig, backends: &BackendRegistry) -> Result<Self> {
        let backend = backends.open(&config.url)?;
        Ok(Repository { config, backend })
    }

    pub fn with_backend(config: RepositoryConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Repository { config, backend }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    fn require_write(&self, key: &str) -> Result<()> {
        if self.config.can_write() {
            Ok(())
        } else {
            Err(RegistryError::RepositoryWriteNotAllowed {
                url: self.config.url.clone(),
                key: key.to_string(),
            })
        }
    }

    fn require_admin(&self, key: &str) -> Result<()> {
        if self.config.admin {
            Ok(())
        } else {
            Err(RegistryError::RepositoryAdminNotAllowed {
                url: self.config.url.clone(),
                key: key.to_string(),
            })
        }
    }

    /// Open an object as a byte stream.
    pub fn get(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        self.backend.open(key)
    }

    /// Stream `body` into a new object, returning the bytes written. The
    /// object becomes visible only once the whole body is stored.
    pub fn put(&self, key: &str, body: &mut dyn Read) -> Result<u64> {
        self.require_write(key)?;
        let mut writer = self.backend.create(key)?;
        let written = io::copy(body, &mut writer)?;
        writer.commit()?;
        tracing::debug!(url = %self.config.url, key, bytes = written, "put object");
        Ok(written)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let data = self.backend.read(key)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Read a record, rejecting an incompatible `api_version`.
    pub fn get_record<T: Record>(&self, key: &str) -> Result<T> {
        let record: T = self.get_json(key)?;
        check_api_version(record.api_version())?;
        Ok(record)
    }

    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.require_write(key)?;
        let data = serde_json::to_vec(value)?;
        self.backend.write(key, &data)?;
        tracing::debug!(url = %self.config.url, key, "put json");
        Ok(())
    }

    pub fn list<'a>(&'a self, prefix: &str) -> BoxCursor<'a, Entry> {
        tracing::debug!(url = %self.config.url, prefix, "list");
        self.backend.list_dir(prefix)
    }

    pub fn ensure_prefix(&self, prefix: &str) -> Result<()> {
        self.require_write(prefix)?;
        self.backend.make_dir(prefix)
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.require_write(key)?;
        self.backend.remove(key)?;
        tracing::debug!(url = %self.config.url, key, "deleted");
        Ok(())
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key)
    }

    pub fn manifest(&self) -> Result<RepositoryManifest> {
        self.get_record(keys::REPOSITORY_MANIFEST)
    }

    /// Replace the repository manifest, stamping `updated_at`.
    pub fn put_manifest(&self, mut manifest: RepositoryManifest) -> Result<()> {
        self.require_admin(keys::REPOSITORY_MANIFEST)?;
        manifest.updated_at = UnixTimestamp::now();
        self.put_json(keys::REPOSITORY_MANIFEST, &manifest)
    }

    /// Write this repository's own manifest.
    pub fn initialize(&self, name: &str, readonly_url: Option<String>) -> Result<RepositoryManifest> {
        let manifest = RepositoryManifest::new(name, &self.config.url, readonly_url);
        self.put_manifest(manifest.clone())?;
        tracing::info!(url = %self.config.url, name, "initialized repository");
        Ok(manifest)
    }
}
