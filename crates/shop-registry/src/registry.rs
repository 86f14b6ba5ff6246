//! The registry engine.
//!
//! A [`Registry`] owns one root [`Repository`] holding all metadata and any
//! number of named secondary repositories holding archives for packages
//! that opt out of the root. Every record lives under a fixed key layout
//! (see [`crate::keys`]). Writes are independent last-writer-wins object
//! overwrites: there is no locking and no compare-and-swap between callers.
//!
//! Operations touching several objects attempt every one of them and report
//! all failures together. Nothing is rolled back, so a failed paired write
//! can leave the two halves of the tag index out of step; the error says so.

use std::collections::BTreeMap;
use std::io::Read;

use crate::config::{RegistryConfig, RepositoryConfig};
use crate::cursor::Cursor;
use crate::error::{aggregate, RegistryError, Result};
use crate::instance::Instance;
use crate::keys;
use crate::manifest::{RegistryManifest, RepositoryManifest};
use crate::package::Package;
use crate::reference::Reference;
use crate::repository::Repository;
use crate::storage::{is_http_url, BackendRegistry};
use crate::tag::Tag;
use crate::timestamp::UnixTimestamp;
use crate::validate::{check_instance_id, check_package_name, check_reference_name};
use crate::version::API_VERSION;

pub struct Registry {
    pub(crate) config: RegistryConfig,
    pub(crate) root: Repository,
    pub(crate) repositories: BTreeMap<String, Repository>,
}

impl Registry {
    /// Open the registry described by `config`.
    ///
    /// A root repository without a registry manifest is not an error: the
    /// registry is simply not initialized yet. When the root URL is plain
    /// HTTP(S), the manifest served there names the real root repository
    /// and the registry is opened against that instead.
    pub fn open(config: RegistryConfig, backends: &BackendRegistry) -> Result<Self> {
        let mut root_config = config.root_repository();
        if is_http_url(&root_config.url) {
            root_config.url = follow_mirror(&root_config, backends)?;
        }

        let root = Repository::open(root_config, backends)?;
        let mut registry = Registry::from_parts(config, root);

        match registry.try_manifest()? {
            Some(manifest) => {
                for (name, repo_manifest) in &manifest.repos {
                    let repo_config = registry
                        .config
                        .secondary_repository(name, &repo_manifest.url);
                    let repo = Repository::open(repo_config, backends)?;
                    registry.repositories.insert(name.clone(), repo);
                }
            }
            None => tracing::debug!(url = %registry.root.url(), "registry is not initialized"),
        }
        Ok(registry)
    }

    /// Assemble a registry from an already opened root repository.
    pub fn from_parts(config: RegistryConfig, root: Repository) -> Self {
        Registry {
            config,
            root,
            repositories: BTreeMap::new(),
        }
    }

    /// Attach an already opened secondary repository without touching the
    /// registry manifest.
    pub fn attach_repository(&mut self, name: &str, repository: Repository) {
        self.repositories.insert(name.to_string(), repository);
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn root(&self) -> &Repository {
        &self.root
    }

    pub fn repository(&self, name: &str) -> Option<&Repository> {
        self.repositories.get(name)
    }

    pub(crate) fn require_write(&self, action: impl FnOnce() -> String) -> Result<()> {
        if self.config.can_write() {
            Ok(())
        } else {
            Err(RegistryError::WriteNotAllowed { action: action() })
        }
    }

    pub(crate) fn require_admin(&self, action: impl FnOnce() -> String) -> Result<()> {
        if self.config.admin {
            Ok(())
        } else {
            Err(RegistryError::AdminNotAllowed { action: action() })
        }
    }

    /// Repository holding the archives of `package`.
    pub(crate) fn archive_repository(&self, package: &Package) -> Result<&Repository> {
        match package.repo_name() {
            None => Ok(&self.root),
            Some(name) => self
                .repositories
                .get(name)
                .ok_or_else(|| RegistryError::UnknownRepository(name.to_string())),
        }
    }

    // ---- manifest ----

    pub fn get_manifest(&self) -> Result<RegistryManifest> {
        self.root.get_record(keys::REGISTRY_MANIFEST)
    }

    fn try_manifest(&self) -> Result<Option<RegistryManifest>> {
        match self.get_manifest() {
            Ok(manifest) => Ok(Some(manifest)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the registry manifest, stamping `updated_at`.
    pub fn put_manifest(&self, mut manifest: RegistryManifest) -> Result<()> {
        self.require_admin(|| "put registry manifest".to_string())?;
        manifest.api_version = API_VERSION.to_string();
        manifest.updated_at = UnixTimestamp::now();
        self.root.put_json(keys::REGISTRY_MANIFEST, &manifest)
    }

    /// Write the registry manifest and the top-level prefixes.
    ///
    /// The root repository gets its own manifest first when it has none.
    /// Re-initializing overwrites the manifest, dropping any registered
    /// secondary repositories.
    pub fn initialize(&self, name: &str) -> Result<RegistryManifest> {
        self.require_admin(|| format!("initialize registry {name}"))?;

        let repo_manifest = match self.root.manifest() {
            Ok(manifest) => manifest,
            Err(e) if e.is_not_found() => self.root.initialize(name, None)?,
            Err(e) => return Err(e),
        };

        let manifest = RegistryManifest::new(name, repo_manifest);
        self.put_manifest(manifest.clone())?;
        aggregate([
            self.root.ensure_prefix(keys::PACKAGES),
            self.root.ensure_prefix(keys::CAS),
        ])?;

        tracing::info!(name, url = %self.root.url(), "initialized registry");
        Ok(manifest)
    }

    /// Register a secondary repository under `name`.
    ///
    /// The repository must already carry its own manifest; the registry
    /// manifest records it under `repos[name]`.
    pub fn add_repository(
        &mut self,
        name: &str,
        config: RepositoryConfig,
        backends: &BackendRegistry,
    ) -> Result<RepositoryManifest> {
        self.require_admin(|| format!("add repository {name}"))?;

        let repo_config = config.inherit(self.config.write, self.config.admin);
        let repository = Repository::open(repo_config, backends)?;
        let repo_manifest = repository.manifest()?;

        let mut manifest = self.get_manifest()?;
        manifest
            .repos
            .insert(name.to_string(), repo_manifest.clone());
        self.put_manifest(manifest)?;

        self.repositories.insert(name.to_string(), repository);
        tracing::info!(name, url = %repo_manifest.url, "added repository");
        Ok(repo_manifest)
    }

    // ---- packages ----

    pub fn get_package(&self, name: &str) -> Result<Package> {
        check_package_name(name)?;
        self.root.get_record(&keys::package_manifest(name))
    }

    /// Whether a package manifest exists at exactly `name`.
    pub fn is_package(&self, name: &str) -> Result<bool> {
        check_package_name(name)?;
        self.root.exists(&keys::package_manifest(name))
    }

    /// Create or replace a package, ensuring its sub-prefixes exist.
    pub fn put_package(&self, mut package: Package) -> Result<Package> {
        self.require_admin(|| format!("put package {}", package.name))?;
        package.validate()?;
        package.api_version = API_VERSION.to_string();
        package.updated_at = UnixTimestamp::now();

        let name = package.name.as_str();
        self.root.ensure_prefix(&keys::package_dir(name))?;
        self.root.put_json(&keys::package_manifest(name), &package)?;
        aggregate([
            self.root.ensure_prefix(&keys::instances_dir(name)),
            self.root.ensure_prefix(&keys::refs_dir(name)),
            self.root.ensure_prefix(&keys::tags_dir(name)),
        ])?;

        tracing::info!(package = %name, "put package");
        Ok(package)
    }

    // ---- instances ----

    /// Store an archive under `cas/<id>.tgz` in the package's repository.
    ///
    /// `id` is trusted as given; it is not checked against the bytes.
    /// Instance metadata is not written: commit it with
    /// [`Registry::put_instance_info`] once the upload succeeded.
    pub fn upload_package_instance(
        &self,
        name: &str,
        id: &str,
        body: &mut dyn Read,
    ) -> Result<Instance> {
        self.require_write(|| format!("upload {name}@{id}"))?;
        let instance = Instance::new(name, id)?;

        let package = self.get_package(name)?;
        let repository = self.archive_repository(&package)?;
        repository.ensure_prefix(keys::CAS)?;
        let bytes = repository.put(&keys::archive(id), body)?;

        tracing::info!(package = %name, id, bytes, repo = %repository.url(), "uploaded instance");
        Ok(instance)
    }

    /// Open the archive of an instance as a byte stream.
    pub fn fetch_package_instance(&self, name: &str, id: &str) -> Result<Box<dyn Read + Send>> {
        check_instance_id(id)?;
        let package = self.get_package(name)?;
        self.archive_repository(&package)?.get(&keys::archive(id))
    }

    pub fn get_instance_info(&self, name: &str, id: &str) -> Result<Instance> {
        check_package_name(name)?;
        check_instance_id(id)?;
        self.root.get_record(&keys::instance_manifest(name, id))
    }

    pub fn put_instance_info(&self, mut instance: Instance) -> Result<Instance> {
        self.require_write(|| format!("put instance {instance}"))?;
        instance.validate()?;
        instance.api_version = API_VERSION.to_string();
        instance.updated_at = UnixTimestamp::now();

        let (name, id) = (instance.package.as_str(), instance.id.as_str());
        self.root.ensure_prefix(&keys::instance_dir(name, id))?;
        aggregate([
            self.root.put_json(&keys::instance_manifest(name, id), &instance),
            self.root.ensure_prefix(&keys::instance_tags_dir(name, id)),
        ])?;

        tracing::debug!(instance = %instance, "put instance info");
        Ok(instance)
    }

    /// Remove an instance's metadata. The archive is left in place.
    ///
    /// Fails while the instance still carries tags: delete them first.
    pub fn delete_instance_info(&self, instance: &Instance) -> Result<()> {
        self.require_admin(|| format!("delete instance {instance}"))?;
        instance.validate()?;

        let (name, id) = (instance.package.as_str(), instance.id.as_str());
        aggregate([
            self.root.delete(&keys::instance_manifest(name, id)),
            self.root.delete(&keys::instance_tags_dir(name, id)),
            self.root.delete(&keys::instance_dir(name, id)),
        ])
    }

    // ---- references ----

    pub fn get_reference(&self, name: &str, reference: &str) -> Result<Reference> {
        check_package_name(name)?;
        check_reference_name(reference)?;
        self.root.get_record(&keys::reference(name, reference))
    }

    /// Point a reference at an instance, replacing any previous target.
    pub fn put_reference(&self, mut reference: Reference) -> Result<Reference> {
        self.require_write(|| format!("put reference {reference}"))?;
        reference.validate()?;
        reference.api_version = API_VERSION.to_string();
        reference.updated_at = UnixTimestamp::now();

        self.root.ensure_prefix(&keys::refs_dir(&reference.package))?;
        self.root
            .put_json(&keys::reference(&reference.package, &reference.name), &reference)?;
        tracing::debug!(reference = %reference, "put reference");
        Ok(reference)
    }

    pub fn delete_reference(&self, reference: &Reference) -> Result<()> {
        self.require_admin(|| format!("delete reference {reference}"))?;
        check_package_name(&reference.package)?;
        check_reference_name(&reference.name)?;
        self.root
            .delete(&keys::reference(&reference.package, &reference.name))
    }

    // ---- tags ----

    /// Write both halves of the tag index.
    ///
    /// The reverse half (under the instance) is written first, then the
    /// forward half (under the package). Both writes are always attempted.
    pub fn put_tag(&self, mut tag: Tag) -> Result<Tag> {
        self.require_write(|| format!("put tag {tag}"))?;
        tag.validate()?;
        tag.api_version = API_VERSION.to_string();
        tag.updated_at = UnixTimestamp::now();

        let reverse = keys::instance_tag(&tag.package, &tag.id, &tag.key, &tag.value);
        let forward = keys::tag(&tag.package, &tag.key, &tag.value, &tag.id);

        aggregate([
            self.root.ensure_prefix(keys::parent(&reverse)),
            self.root.ensure_prefix(keys::parent(&forward)),
        ])?;

        let result = aggregate([
            self.root.put_json(&reverse, &tag),
            self.root.put_json(&forward, &tag),
        ]);
        match &result {
            Ok(()) => tracing::debug!(tag = %tag, "put tag"),
            Err(e) => tracing::warn!(tag = %tag, error = %e, "tag index write incomplete"),
        }
        result.map(|()| tag)
    }

    /// Remove both halves of the tag index, forward half first.
    ///
    /// Directories left empty by the removal (the value and key levels of
    /// the forward index, the key level under the instance) are removed
    /// too, so the pair stops showing up in tag listings.
    pub fn delete_tag(&self, tag: &Tag) -> Result<()> {
        self.require_admin(|| format!("delete tag {tag}"))?;
        tag.validate()?;

        let result = aggregate([
            self.root
                .delete(&keys::tag(&tag.package, &tag.key, &tag.value, &tag.id)),
            self.root
                .delete(&keys::instance_tag(&tag.package, &tag.id, &tag.key, &tag.value)),
        ]);
        match &result {
            Ok(()) => self.remove_empty_prefixes(&[
                keys::tag_value_dir(&tag.package, &tag.key, &tag.value),
                keys::tag_key_dir(&tag.package, &tag.key),
                keys::instance_tag_key_dir(&tag.package, &tag.id, &tag.key),
            ]),
            Err(e) => tracing::warn!(tag = %tag, error = %e, "tag index delete incomplete"),
        }
        result
    }

    /// Delete each prefix that currently lists no entries. Prefixes still
    /// in use, or that cannot be listed, are left alone.
    fn remove_empty_prefixes(&self, prefixes: &[String]) {
        for prefix in prefixes {
            let empty = matches!(self.root.list(prefix).next_item(), Ok(None));
            if !empty {
                continue;
            }
            if let Err(e) = self.root.delete(prefix) {
                tracing::debug!(prefix = %prefix, error = %e, "left empty prefix in place");
            }
        }
    }
}

/// Resolve the root repository URL advertised by an HTTP mirror.
fn follow_mirror(config: &RepositoryConfig, backends: &BackendRegistry) -> Result<String> {
    let mirror = Repository::open(config.clone(), backends)?;
    let manifest: RegistryManifest = mirror.get_record(keys::REGISTRY_MANIFEST)?;
    let target = manifest.root_repo.url;
    if is_http_url(&target) {
        return Err(RegistryError::InvalidUrl {
            url: target,
            detail: "a registry manifest served over HTTP must name a non-HTTP root repository"
                .to_string(),
        });
    }
    tracing::info!(mirror = %config.url, root = %target, "following registry mirror");
    Ok(target)
}
