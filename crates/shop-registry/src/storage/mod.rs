//! Storage backends.
//!
//! A backend exposes byte-level access to one URL-addressed location. Keys
//! are slash-separated and relative to the location root. Backends are
//! chosen by URL scheme through a [`BackendRegistry`] built by the caller.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;

use url::Url;

use crate::cursor::BoxCursor;
use crate::error::{RegistryError, Result};

pub mod file;
pub mod http;
pub mod memory;
pub mod webdav;

pub use file::FileFs;
pub use http::HttpFs;
pub use memory::MemoryFs;
pub use webdav::WebDavFs;

/// One child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Name relative to the listed prefix (a single segment).
    pub key: String,
    /// Whether the child is itself a prefix rather than an object.
    pub is_prefix: bool,
}

impl Entry {
    pub fn object(key: impl Into<String>) -> Self {
        Entry {
            key: key.into(),
            is_prefix: false,
        }
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        Entry {
            key: key.into(),
            is_prefix: true,
        }
    }
}

/// Streaming writer for a new object. Nothing is visible under the key
/// until [`ObjectWriter::commit`] succeeds; dropping the writer abandons it.
pub trait ObjectWriter: Write + Send {
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Byte-level capability interface consumed by [`crate::Repository`].
pub trait StorageBackend: Send + Sync {
    /// URL of the location, for messages.
    fn url(&self) -> &str;

    fn read(&self, key: &str) -> Result<Vec<u8>>;

    fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>>;

    fn create(&self, key: &str) -> Result<Box<dyn ObjectWriter>>;

    /// Ensure a prefix exists. A no-op for stores without directories.
    fn make_dir(&self, key: &str) -> Result<()>;

    /// Immediate children of a prefix.
    fn list_dir<'a>(&'a self, key: &str) -> BoxCursor<'a, Entry>;

    /// Remove an object or an empty prefix.
    fn remove(&self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;
}

/// Builds a backend for a parsed URL.
pub type BackendFactory = Box<dyn Fn(&Url) -> Result<Arc<dyn StorageBackend>> + Send + Sync>;

/// Explicit `scheme -> factory` table.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with every built-in driver registered.
    pub fn with_defaults() -> Self {
        let mut backends = BackendRegistry::new();
        backends.register("file", |url| Ok(Arc::new(FileFs::from_url(url)?)));
        backends.register("http", |url| Ok(Arc::new(HttpFs::new(url)?)));
        backends.register("https", |url| Ok(Arc::new(HttpFs::new(url)?)));
        backends.register("webdav", |url| Ok(Arc::new(WebDavFs::new(url)?)));
        backends.register("https+webdav", |url| Ok(Arc::new(WebDavFs::new(url)?)));
        backends
    }

    pub fn register<F>(&mut self, scheme: &str, factory: F)
    where
        F: Fn(&Url) -> Result<Arc<dyn StorageBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(scheme.to_string(), Box::new(factory));
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Open the backend for `url`.
    pub fn open(&self, url: &str) -> Result<Arc<dyn StorageBackend>> {
        let parsed = parse_url(url)?;
        match self.factories.get(parsed.scheme()) {
            Some(factory) => {
                tracing::debug!(url, scheme = parsed.scheme(), "opening storage backend");
                factory(&parsed)
            }
            None if parsed.scheme() == "s3" => {
                Err(RegistryError::Unsupported("s3 storage backend".to_string()))
            }
            None => Err(RegistryError::UnknownScheme(parsed.scheme().to_string())),
        }
    }
}

pub(crate) fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| RegistryError::InvalidUrl {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

/// Whether `url` is served over plain HTTP(S).
pub fn is_http_url(url: &str) -> bool {
    parse_url(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
