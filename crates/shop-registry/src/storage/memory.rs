//! Flat in-memory key store.
//!
//! There are no directories: `make_dir` does nothing and listings are
//! derived from the keys present. Writes to keys under an injected failure
//! prefix fail, which lets callers exercise partial-failure paths.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor as IoCursor, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Entry, ObjectWriter, StorageBackend};
use crate::cursor::{BoxCursor, CursorExt, SliceCursor};
use crate::error::{RegistryError, Result};

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Vec<u8>>,
    failing: BTreeSet<String>,
}

#[derive(Clone)]
pub struct MemoryFs {
    url: String,
    state: Arc<Mutex<State>>,
}

fn normalize(key: &str) -> String {
    key.trim_matches('/').to_string()
}

impl MemoryFs {
    pub fn new(url: &str) -> Self {
        MemoryFs {
            url: url.to_string(),
            state: Arc::default(),
        }
    }

    /// Make every mutation of a key under `prefix` fail.
    pub fn fail_writes_under(&self, prefix: &str) {
        self.state.lock().failing.insert(normalize(prefix));
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        let state = self.state.lock();
        let blocked = state
            .failing
            .iter()
            .any(|prefix| key == prefix || key.starts_with(&format!("{prefix}/")));
        if blocked {
            Err(io::Error::other(format!("injected failure writing {key}")).into())
        } else {
            Ok(())
        }
    }

    fn store(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let key = normalize(key);
        self.check_writable(&key)?;
        self.state.lock().objects.insert(key, data);
        Ok(())
    }
}

impl StorageBackend for MemoryFs {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.state
            .lock()
            .objects
            .get(&normalize(key))
            .cloned()
            .ok_or_else(|| RegistryError::not_found(key))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.store(key, data.to_vec())
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(IoCursor::new(self.read(key)?)))
    }

    fn create(&self, key: &str) -> Result<Box<dyn ObjectWriter>> {
        Ok(Box::new(MemoryWriter {
            fs: self.clone(),
            key: key.to_string(),
            buf: Vec::new(),
        }))
    }

    fn make_dir(&self, key: &str) -> Result<()> {
        self.check_writable(&normalize(key))
    }

    fn list_dir<'a>(&'a self, key: &str) -> BoxCursor<'a, Entry> {
        let prefix = normalize(key);
        let start = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let state = self.state.lock();
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        for full in state.objects.keys() {
            let Some(rest) = full.strip_prefix(&start) else {
                continue;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    children.insert(child.to_string(), true);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(false);
                }
            }
        }

        let entries = children
            .into_iter()
            .map(|(key, is_prefix)| Entry { key, is_prefix })
            .collect();
        SliceCursor::new(entries).boxed()
    }

    /// Removes an object. A key holding no object is treated as an empty
    /// prefix unless other keys live under it.
    fn remove(&self, key: &str) -> Result<()> {
        let key = normalize(key);
        self.check_writable(&key)?;
        let mut state = self.state.lock();
        if state.objects.remove(&key).is_some() {
            return Ok(());
        }
        let child = format!("{key}/");
        if state.objects.keys().any(|k| k.starts_with(&child)) {
            return Err(io::Error::other(format!("prefix {key} is not empty")).into());
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let key = normalize(key);
        let child = format!("{key}/");
        let state = self.state.lock();
        Ok(state.objects.contains_key(&key) || state.objects.keys().any(|k| k.starts_with(&child)))
    }
}

struct MemoryWriter {
    fs: MemoryFs,
    key: String,
    buf: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryWriter { fs, key, buf } = *self;
        fs.store(&key, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_derives_children_from_keys() {
        let fs = MemoryFs::new("memory://test");
        fs.write("packages/tools/package.json", b"{}").unwrap();
        fs.write("packages/tools/clang/package.json", b"{}").unwrap();
        fs.write("packages/tools/clang/refs/latest", b"{}").unwrap();

        let entries = fs.list_dir("packages/tools").collect_vec().unwrap();
        assert_eq!(entries, vec![Entry::prefix("clang"), Entry::object("package.json")]);
        assert_eq!(fs.list_dir("").collect_vec().unwrap(), vec![Entry::prefix("packages")]);
        assert!(fs.list_dir("nothing").collect_vec().unwrap().is_empty());
    }

    #[test]
    fn make_dir_is_a_no_op() {
        let fs = MemoryFs::new("memory://test");
        fs.make_dir("packages/a/instances").unwrap();
        assert!(fs.keys().is_empty());
        assert!(!fs.exists("packages/a").unwrap());
    }

    #[test]
    fn injected_failures() {
        let fs = MemoryFs::new("memory://test");
        fs.fail_writes_under("packages/a/tags");

        assert!(fs.write("packages/a/tags/k/v/id", b"{}").is_err());
        assert!(fs.write("packages/a/tagsx", b"{}").is_ok());
        fs.clear_failures();
        assert!(fs.write("packages/a/tags/k/v/id", b"{}").is_ok());
    }

    #[test]
    fn remove_semantics() {
        let fs = MemoryFs::new("memory://test");
        fs.write("a/b", b"x").unwrap();
        assert!(fs.remove("a").is_err());
        fs.remove("a/b").unwrap();
        fs.remove("a").unwrap();
        assert!(fs.read("a/b").unwrap_err().is_not_found());
    }

    #[test]
    fn writer_commits_on_commit() {
        let fs = MemoryFs::new("memory://test");
        let mut writer = fs.create("cas/x.tgz").unwrap();
        writer.write_all(b"abc").unwrap();
        assert!(!fs.exists("cas/x.tgz").unwrap());
        writer.commit().unwrap();

        let mut data = String::new();
        fs.open("cas/x.tgz").unwrap().read_to_string(&mut data).unwrap();
        assert_eq!(data, "abc");
    }
}
