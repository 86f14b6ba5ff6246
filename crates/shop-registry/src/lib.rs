//! Serverless package registry over dumb storage.
//!
//! A registry is a set of JSON records and content-addressed archives laid
//! out under fixed keys in one or more storage locations. No server-side
//! logic runs: every operation is a sequence of object reads, writes and
//! directory listings performed by the client.
//!
//! # Architecture
//!
//! - **Storage backends** give byte-level access to a URL-addressed location
//!   (`file://`, read-only `http(s)://`, `webdav://`), chosen by scheme
//! - **Repositories** wrap one backend with JSON helpers, a manifest and a
//!   read / write / admin permission tier
//! - **The registry** composes a root repository, holding all metadata,
//!   with named secondary repositories that may hold a package's archives
//!
//! Listings are returned as fused [`Cursor`]s. Archives are built and
//! hashed by the `shop-archive` crate.

pub mod config;
pub mod cursor;
pub mod error;
pub mod instance;
pub mod keys;
mod listing;
pub mod manifest;
pub mod package;
pub mod publish;
pub mod reference;
pub mod registry;
pub mod repository;
pub mod storage;
pub mod tag;
pub mod timestamp;
pub mod validate;
pub mod version;

#[cfg(test)]
mod test_support;

// Re-exports for convenience.
pub use config::{Config, RegistryConfig, RepositoryConfig, DEFAULT_REGISTRY};
pub use cursor::{BoxCursor, CancelToken, Cursor, CursorExt};
pub use error::{aggregate, RegistryError, Result};
pub use instance::Instance;
pub use manifest::{RegistryManifest, RepositoryManifest};
pub use package::{Package, PackageOrPrefix};
pub use publish::{install_package_instance, publish_directory, PublishOptions, Published};
pub use reference::Reference;
pub use registry::Registry;
pub use repository::Repository;
pub use storage::{BackendRegistry, Entry, ObjectWriter, StorageBackend};
pub use tag::{PackageTag, PackageTagValue, Tag};
pub use timestamp::UnixTimestamp;
pub use version::{Record, Version, API_VERSION};
