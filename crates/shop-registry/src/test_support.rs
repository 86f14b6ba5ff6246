//! Registry fixtures shared by unit tests.

use std::path::Path;
use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::registry::Registry;
use crate::repository::Repository;
use crate::storage::{BackendRegistry, MemoryFs};

pub const ID_A: &str = "0123456789abcdef0123456789abcdef01234567";
pub const ID_B: &str = "89abcdef0123456789abcdef0123456789abcdef";

pub fn file_url(dir: &Path) -> String {
    url::Url::from_directory_path(dir)
        .expect("absolute path")
        .to_string()
}

/// A registry rooted at `dir` through the default backends.
pub fn file_registry(dir: &Path, admin: bool) -> Registry {
    let mut config = RegistryConfig::new(&file_url(dir));
    config.admin = admin;
    Registry::open(config, &BackendRegistry::with_defaults()).expect("open file registry")
}

/// A registry over a fresh in-memory root, with the backing store.
pub fn memory_registry(write: bool, admin: bool) -> (Registry, MemoryFs) {
    let fs = MemoryFs::new("memory://root");
    let mut config = RegistryConfig::new("memory://root");
    config.write = write;
    config.admin = admin;
    let root = Repository::with_backend(config.root_repository(), Arc::new(fs.clone()));
    (Registry::from_parts(config, root), fs)
}
