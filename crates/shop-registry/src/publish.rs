//! Directory publishing and installation.
//!
//! Publishing packs a directory into a deterministic archive, names it by
//! the digest of the archive bytes, uploads it and commits the instance
//! metadata together with any requested tags and references. Installing
//! reverses that, checking the digest of the downloaded bytes.

use std::io::{Seek, SeekFrom};
use std::path::Path;

use shop_archive::{extract_archive, make_archive};

use crate::error::{RegistryError, Result};
use crate::instance::Instance;
use crate::reference::Reference;
use crate::registry::Registry;
use crate::tag::Tag;

/// Options for the publish operation.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// `(key, value)` tags applied to the new instance.
    pub tags: Vec<(String, String)>,
    /// References pointed at the new instance.
    pub references: Vec<String>,
}

/// What a publish committed.
#[derive(Debug, Clone)]
pub struct Published {
    pub instance: Instance,
    pub tags: Vec<Tag>,
    pub references: Vec<Reference>,
}

/// Publish the contents of `dir` as a new instance of `name`.
///
/// Tags and references are validated before anything is written. The
/// archive is staged in a temporary file so its id is known before upload.
pub fn publish_directory(
    registry: &Registry,
    name: &str,
    dir: &Path,
    options: &PublishOptions,
) -> Result<Published> {
    // Validate everything with a placeholder id first.
    let placeholder = "0".repeat(shop_archive::DIGEST_HEX_LEN);
    for (key, value) in &options.tags {
        Tag::new(name, key, value, &placeholder)?;
    }
    for reference in &options.references {
        Reference::new(name, reference, &placeholder)?;
    }

    let mut staging = tempfile::tempfile()?;
    let id = make_archive(&mut staging, dir)?.into_string();
    staging.seek(SeekFrom::Start(0))?;
    tracing::info!(package = %name, %id, dir = %dir.display(), "built archive");

    let instance = registry.upload_package_instance(name, &id, &mut staging)?;
    let instance = registry.put_instance_info(instance)?;

    let mut tags = Vec::with_capacity(options.tags.len());
    for (key, value) in &options.tags {
        tags.push(registry.put_tag(Tag::new(name, key, value, &id)?)?);
    }
    let mut references = Vec::with_capacity(options.references.len());
    for reference in &options.references {
        references.push(registry.put_reference(Reference::new(name, reference, &id)?)?);
    }

    Ok(Published {
        instance,
        tags,
        references,
    })
}

/// Download instance `id` of `name` and unpack it into `dest`.
///
/// The digest is only known once the whole archive has been read, so on
/// `IntegrityFailure` the extracted files are already in `dest`.
pub fn install_package_instance(
    registry: &Registry,
    name: &str,
    id: &str,
    dest: &Path,
) -> Result<()> {
    let reader = registry.fetch_package_instance(name, id)?;
    let actual = extract_archive(reader, dest)?;
    if !actual.matches(id) {
        return Err(RegistryError::IntegrityFailure {
            package: name.to_string(),
            expected: id.to_string(),
            actual: actual.into_string(),
        });
    }
    tracing::info!(package = %name, id, dest = %dest.display(), "installed instance");
    Ok(())
}
