//! Cursor-returning registry queries.
//!
//! Each listing is a chain over one or more directory listings of the root
//! repository. Raw entries that do not look like what the listing expects
//! (stray objects, names failing validation) are skipped; each surviving
//! entry is resolved into a typed record with a further read. Every cursor
//! borrows the registry for its lifetime and is fused.

use crate::cursor::{BoxCursor, Cursor, CursorExt, ErrorCursor, SliceCursor};
use crate::error::Result;
use crate::instance::Instance;
use crate::keys;
use crate::package::PackageOrPrefix;
use crate::reference::Reference;
use crate::registry::Registry;
use crate::storage::Entry;
use crate::tag::{PackageTag, PackageTagValue, Tag};
use crate::validate::{
    check_instance_id, check_package_name, is_valid_instance_id, is_valid_package_name,
    is_valid_reference_name, is_valid_tag_name, is_valid_tag_value,
};

fn failed<'a, T: 'a>(result: Result<()>) -> Option<BoxCursor<'a, T>> {
    result.err().map(|e| ErrorCursor::new(e).boxed())
}

impl Registry {
    /// Packages and sub-prefixes directly under `prefix`.
    ///
    /// An empty prefix lists the top level. A prefix that is itself a
    /// package yields just that package, even when it also has
    /// sub-packages.
    pub fn list_packages<'a>(&'a self, prefix: &str) -> BoxCursor<'a, PackageOrPrefix> {
        let prefix = prefix.trim_matches('/');
        if !prefix.is_empty() {
            if let Some(cursor) = failed(check_package_name(prefix)) {
                return cursor;
            }
            match self.is_package(prefix) {
                Ok(true) => {
                    return match self.get_package(prefix) {
                        Ok(package) => SliceCursor::new(vec![PackageOrPrefix::Package(package)])
                            .fuse()
                            .boxed(),
                        Err(e) => ErrorCursor::new(e).boxed(),
                    }
                }
                Ok(false) => {}
                Err(e) => return ErrorCursor::new(e).boxed(),
            }
        }

        let parent = prefix.to_string();
        self.root
            .list(&keys::package_dir(prefix))
            .try_filter_map(move |entry: Entry| {
                if !entry.is_prefix {
                    return Ok(None);
                }
                let name = keys::join(&[&parent, &entry.key]);
                if !is_valid_package_name(&name) {
                    return Ok(None);
                }
                if self.is_package(&name)? {
                    Ok(Some(PackageOrPrefix::Package(self.get_package(&name)?)))
                } else {
                    Ok(Some(PackageOrPrefix::Prefix { name }))
                }
            })
            .fuse()
            .boxed()
    }

    /// Committed instances of a package.
    ///
    /// An instance directory without `instance.json` (an upload whose
    /// metadata commit never happened, or a concurrent delete) is skipped.
    pub fn list_instances<'a>(&'a self, name: &str) -> BoxCursor<'a, Instance> {
        if let Some(cursor) = failed(check_package_name(name)) {
            return cursor;
        }
        let name = name.to_string();
        self.root
            .list(&keys::instances_dir(&name))
            .try_filter_map(move |entry: Entry| {
                if !entry.is_prefix || !is_valid_instance_id(&entry.key) {
                    return Ok(None);
                }
                match self.get_instance_info(&name, &entry.key) {
                    Ok(instance) => Ok(Some(instance)),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(package = %name, id = %entry.key, "skipping uncommitted instance");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .fuse()
            .boxed()
    }

    /// Every tag carried by one instance, read from the reverse index.
    pub fn list_instance_tags<'a>(&'a self, name: &str, id: &str) -> BoxCursor<'a, Tag> {
        if let Some(cursor) = failed(check_package_name(name).and_then(|()| check_instance_id(id))) {
            return cursor;
        }
        InstanceTags {
            registry: self,
            package: name.to_string(),
            id: id.to_string(),
            keys: self.root.list(&keys::instance_tags_dir(name, id)),
            current: None,
        }
        .fuse()
        .boxed()
    }

    pub fn list_references<'a>(&'a self, name: &str) -> BoxCursor<'a, Reference> {
        if let Some(cursor) = failed(check_package_name(name)) {
            return cursor;
        }
        let name = name.to_string();
        self.root
            .list(&keys::refs_dir(&name))
            .try_filter_map(move |entry: Entry| {
                if entry.is_prefix || !is_valid_reference_name(&entry.key) {
                    return Ok(None);
                }
                self.root
                    .get_record(&keys::reference(&name, &entry.key))
                    .map(Some)
            })
            .fuse()
            .boxed()
    }

    /// Tag keys used by any instance of a package.
    pub fn list_package_tags<'a>(&'a self, name: &str) -> BoxCursor<'a, PackageTag> {
        if let Some(cursor) = failed(check_package_name(name)) {
            return cursor;
        }
        let name = name.to_string();
        self.root
            .list(&keys::tags_dir(&name))
            .try_filter_map(move |entry: Entry| {
                if !entry.is_prefix || !is_valid_tag_name(&entry.key) {
                    return Ok(None);
                }
                PackageTag::new(&name, &entry.key).map(Some)
            })
            .fuse()
            .boxed()
    }

    /// Values recorded for one tag key.
    pub fn list_tag_values<'a>(&'a self, tag: &PackageTag) -> BoxCursor<'a, PackageTagValue> {
        if let Some(cursor) = failed(tag.validate()) {
            return cursor;
        }
        let PackageTag { package, key } = tag.clone();
        self.root
            .list(&keys::tag_key_dir(&package, &key))
            .try_filter_map(move |entry: Entry| {
                if !entry.is_prefix || !is_valid_tag_value(&entry.key) {
                    return Ok(None);
                }
                PackageTagValue::new(&package, &key, &entry.key).map(Some)
            })
            .fuse()
            .boxed()
    }

    /// Instances tagged `key:value`, read from the forward index.
    pub fn list_instances_by_tag<'a>(&'a self, tag: &PackageTagValue) -> BoxCursor<'a, Tag> {
        if let Some(cursor) = failed(tag.validate()) {
            return cursor;
        }
        let PackageTagValue {
            package,
            key,
            value,
        } = tag.clone();
        self.root
            .list(&keys::tag_value_dir(&package, &key, &value))
            .try_filter_map(move |entry: Entry| {
                if entry.is_prefix || !is_valid_instance_id(&entry.key) {
                    return Ok(None);
                }
                self.root
                    .get_record(&keys::tag(&package, &key, &value, &entry.key))
                    .map(Some)
            })
            .fuse()
            .boxed()
    }
}

/// Walks `tags/{key}/{value}` under one instance: the outer listing yields
/// key prefixes, the inner one value objects.
struct InstanceTags<'a> {
    registry: &'a Registry,
    package: String,
    id: String,
    keys: BoxCursor<'a, Entry>,
    current: Option<(String, BoxCursor<'a, Entry>)>,
}

impl Cursor for InstanceTags<'_> {
    type Item = Tag;

    fn next_item(&mut self) -> Result<Option<Tag>> {
        loop {
            if let Some((key, values)) = self.current.as_mut() {
                match values.next_item()? {
                    Some(entry) if !entry.is_prefix && is_valid_tag_value(&entry.key) => {
                        let object =
                            keys::instance_tag(&self.package, &self.id, key, &entry.key);
                        return self.registry.root.get_record(&object).map(Some);
                    }
                    Some(_) => continue,
                    None => self.current = None,
                }
            }

            match self.keys.next_item()? {
                Some(entry) if entry.is_prefix && is_valid_tag_name(&entry.key) => {
                    let dir = keys::instance_tag_key_dir(&self.package, &self.id, &entry.key);
                    let values = self.registry.root.list(&dir);
                    self.current = Some((entry.key, values));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::RegistryError;
    use crate::package::Package;
    use crate::storage::StorageBackend;
    use crate::test_support::{file_registry, memory_registry, ID_A, ID_B};

    fn seeded() -> (Registry, crate::storage::MemoryFs) {
        let (registry, fs) = memory_registry(true, true);
        registry.initialize("acme").unwrap();
        for name in ["tools", "tools/clang", "tools/gcc", "docs/manual"] {
            registry.put_package(Package::new(name, None, None).unwrap()).unwrap();
        }
        for id in [ID_A, ID_B] {
            registry
                .put_instance_info(Instance::new("tools/clang", id).unwrap())
                .unwrap();
        }
        (registry, fs)
    }

    fn names(items: Vec<PackageOrPrefix>) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn top_level_mixes_packages_and_prefixes() {
        let (registry, _) = seeded();
        let top = registry.list_packages("").collect_vec().unwrap();
        assert_eq!(names(top), vec!["docs/", "tools"]);

        let docs = registry.list_packages("docs").collect_vec().unwrap();
        assert_eq!(names(docs), vec!["docs/manual"]);
    }

    #[test]
    fn package_prefix_yields_only_itself() {
        let (registry, _) = seeded();
        let items = registry.list_packages("tools").collect_vec().unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], PackageOrPrefix::Package(p) if p.name == "tools"));
    }

    #[test]
    fn invalid_prefix_fails_the_cursor() {
        let (registry, _) = seeded();
        let mut cursor = registry.list_packages("a//b");
        assert!(cursor.next_item().is_err());
        assert!(cursor.next_item().is_err());
    }

    #[test]
    fn instances_skip_uncommitted_and_junk() {
        let (registry, fs) = seeded();
        // An upload without a metadata commit, and a stray object.
        let dangling = "fedcba9876543210fedcba9876543210fedcba98";
        fs.write(&format!("{}/tags/k/v", keys::instance_dir("tools/clang", dangling)), b"{}")
            .unwrap();
        fs.write(&format!("{}/README", keys::instances_dir("tools/clang")), b"hi")
            .unwrap();

        let ids: Vec<_> = registry
            .list_instances("tools/clang")
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![ID_A.to_string(), ID_B.to_string()]);
    }

    #[test]
    fn corrupt_instance_stops_listing() {
        let (registry, fs) = seeded();
        fs.write(&keys::instance_manifest("tools/clang", ID_A), b"{oops").unwrap();

        let mut cursor = registry.list_instances("tools/clang");
        assert!(cursor.next_item().is_err());
        assert!(cursor.next_item().is_err());
    }

    #[test]
    fn instance_tags_walk_both_levels() {
        let (registry, _) = seeded();
        for (key, value) in [("git_revision", "deadbeef"), ("os", "linux"), ("os", "mac")] {
            registry
                .put_tag(Tag::new("tools/clang", key, value, ID_A).unwrap())
                .unwrap();
        }
        registry
            .put_tag(Tag::new("tools/clang", "os", "linux", ID_B).unwrap())
            .unwrap();

        let tags: Vec<_> = registry
            .list_instance_tags("tools/clang", ID_A)
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|t| format!("{}:{}", t.key, t.value))
            .collect();
        assert_eq!(tags, vec!["git_revision:deadbeef", "os:linux", "os:mac"]);

        let keys: Vec<_> = registry
            .list_package_tags("tools/clang")
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, vec!["git_revision", "os"]);

        let os = PackageTag::new("tools/clang", "os").unwrap();
        let values: Vec<_> = registry
            .list_tag_values(&os)
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|v| v.value)
            .collect();
        assert_eq!(values, vec!["linux", "mac"]);

        let linux = PackageTagValue::new("tools/clang", "os", "linux").unwrap();
        let ids: Vec<_> = registry
            .list_instances_by_tag(&linux)
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![ID_A.to_string(), ID_B.to_string()]);
    }

    #[test]
    fn tag_listings_reject_invalid_names_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let registry = file_registry(dir.path(), true);

        let traversal = PackageTag {
            package: "..".into(),
            key: "..".into(),
        };
        assert!(matches!(
            registry.list_tag_values(&traversal).next_item(),
            Err(RegistryError::InvalidPackageName(_))
        ));
        let bad_key = PackageTag {
            package: "tools/clang".into(),
            key: "9os".into(),
        };
        assert!(matches!(
            registry.list_tag_values(&bad_key).next_item(),
            Err(RegistryError::InvalidTagName(_))
        ));

        let bad_value = PackageTagValue {
            package: "x".into(),
            key: "os".into(),
            value: "../../../../outside".into(),
        };
        assert!(matches!(
            registry.list_instances_by_tag(&bad_value).next_item(),
            Err(RegistryError::InvalidTagValue(_))
        ));
        let dotted_key = PackageTagValue {
            key: "..".into(),
            ..bad_value.clone()
        };
        assert!(matches!(
            registry.list_instances_by_tag(&dotted_key).next_item(),
            Err(RegistryError::InvalidTagName(_))
        ));
        let bad_package = PackageTagValue {
            package: "/x".into(),
            ..bad_value
        };
        assert!(matches!(
            registry.list_instances_by_tag(&bad_package).next_item(),
            Err(RegistryError::InvalidPackageName(_))
        ));
    }

    #[test]
    fn references_on_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = file_registry(dir.path(), true);
        registry.initialize("acme").unwrap();
        registry
            .put_package(Package::new("tools/clang", None, None).unwrap())
            .unwrap();
        for (name, id) in [("latest", ID_B), ("stable", ID_A)] {
            registry
                .put_reference(Reference::new("tools/clang", name, id).unwrap())
                .unwrap();
        }

        let mut refs: Vec<_> = registry
            .list_references("tools/clang")
            .collect_vec()
            .unwrap()
            .into_iter()
            .map(|r| r.to_string())
            .collect();
        refs.sort();
        assert_eq!(
            refs,
            vec![
                format!("tools/clang@latest -> {ID_B}"),
                format!("tools/clang@stable -> {ID_A}"),
            ]
        );
        assert!(registry.list_instances("tools/clang").collect_vec().unwrap().is_empty());
    }

    #[test]
    fn missing_package_directory_is_an_error_on_files() {
        let dir = tempfile::tempdir().unwrap();
        let registry = file_registry(dir.path(), true);
        registry.initialize("acme").unwrap();
        let err = registry.list_references("nope").collect_vec().unwrap_err();
        assert!(err.is_not_found());
    }
}
