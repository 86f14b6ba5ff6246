//! Storage key layout.
//!
//! ```text
//! shop.json                                          registry manifest
//! shop-repository.json                               repository manifest
//! packages/<name>/package.json
//! packages/<name>/instances/<id>/instance.json
//! packages/<name>/instances/<id>/tags/<key>/<value>  reverse tag index
//! packages/<name>/tags/<key>/<value>/<id>            forward tag index
//! packages/<name>/refs/<ref>
//! cas/<id>.tgz                                       instance archives
//! ```
//!
//! Keys are relative to the repository root and never start with `/`.

pub const REGISTRY_MANIFEST: &str = "shop.json";
pub const REPOSITORY_MANIFEST: &str = "shop-repository.json";
pub const PACKAGES: &str = "packages";
pub const CAS: &str = "cas";

const PACKAGE_MANIFEST: &str = "package.json";
const INSTANCE_MANIFEST: &str = "instance.json";
const INSTANCES: &str = "instances";
const TAGS: &str = "tags";
const REFS: &str = "refs";
const ARCHIVE_EXTENSION: &str = ".tgz";

/// Join key segments with `/`, skipping empty ones.
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parent of a key, empty for top-level keys.
pub fn parent(key: &str) -> &str {
    let key = key.trim_end_matches('/');
    key.rsplit_once('/').map_or("", |(parent, _)| parent)
}

pub fn package_dir(name: &str) -> String {
    join(&[PACKAGES, name])
}

pub fn package_manifest(name: &str) -> String {
    join(&[PACKAGES, name, PACKAGE_MANIFEST])
}

pub fn instances_dir(name: &str) -> String {
    join(&[PACKAGES, name, INSTANCES])
}

pub fn refs_dir(name: &str) -> String {
    join(&[PACKAGES, name, REFS])
}

pub fn tags_dir(name: &str) -> String {
    join(&[PACKAGES, name, TAGS])
}

pub fn instance_dir(name: &str, id: &str) -> String {
    join(&[PACKAGES, name, INSTANCES, id])
}

pub fn instance_manifest(name: &str, id: &str) -> String {
    join(&[PACKAGES, name, INSTANCES, id, INSTANCE_MANIFEST])
}

pub fn instance_tags_dir(name: &str, id: &str) -> String {
    join(&[PACKAGES, name, INSTANCES, id, TAGS])
}

pub fn instance_tag_key_dir(name: &str, id: &str, key: &str) -> String {
    join(&[PACKAGES, name, INSTANCES, id, TAGS, key])
}

/// Reverse half of the tag index.
pub fn instance_tag(name: &str, id: &str, key: &str, value: &str) -> String {
    join(&[PACKAGES, name, INSTANCES, id, TAGS, key, value])
}

pub fn tag_key_dir(name: &str, key: &str) -> String {
    join(&[PACKAGES, name, TAGS, key])
}

pub fn tag_value_dir(name: &str, key: &str, value: &str) -> String {
    join(&[PACKAGES, name, TAGS, key, value])
}

/// Forward half of the tag index.
pub fn tag(name: &str, key: &str, value: &str, id: &str) -> String {
    join(&[PACKAGES, name, TAGS, key, value, id])
}

pub fn reference(name: &str, reference: &str) -> String {
    join(&[PACKAGES, name, REFS, reference])
}

pub fn archive(id: &str) -> String {
    format!("{CAS}/{id}{ARCHIVE_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn layout() {
        assert_eq!(package_manifest("tools/clang"), "packages/tools/clang/package.json");
        assert_eq!(
            instance_manifest("tools/clang", ID),
            format!("packages/tools/clang/instances/{ID}/instance.json")
        );
        assert_eq!(
            tag("tools/clang", "git_revision", "deadbeef", ID),
            format!("packages/tools/clang/tags/git_revision/deadbeef/{ID}")
        );
        assert_eq!(
            instance_tag("tools/clang", ID, "git_revision", "deadbeef"),
            format!("packages/tools/clang/instances/{ID}/tags/git_revision/deadbeef")
        );
        assert_eq!(reference("tools/clang", "latest"), "packages/tools/clang/refs/latest");
        assert_eq!(archive(ID), format!("cas/{ID}.tgz"));
    }

    #[test]
    fn join_and_split() {
        assert_eq!(join(&["packages", "", "/a/"]), "packages/a");
        assert_eq!(join(&[PACKAGES, ""]), "packages");
        assert_eq!(parent("packages/tools/clang"), "packages/tools");
        assert_eq!(parent("clang"), "");
    }
}
