//! `file://` backend over a local directory tree.
//!
//! Objects are written to a temporary file next to their destination and
//! renamed into place, so readers never observe a partial object and
//! concurrent writers resolve as last-writer-wins.

use std::fs::{self, File, ReadDir};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use url::Url;

use super::{Entry, ObjectWriter, StorageBackend};
use crate::cursor::{BoxCursor, Cursor, CursorExt, ErrorCursor};
use crate::error::{RegistryError, Result};

pub struct FileFs {
    root: PathBuf,
    url: String,
}

impl FileFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let url = Url::from_directory_path(&root)
            .map(String::from)
            .unwrap_or_else(|()| format!("file://{}", root.display()));
        FileFs { root, url }
    }

    pub fn from_url(url: &Url) -> Result<Self> {
        let root = url.to_file_path().map_err(|()| RegistryError::InvalidUrl {
            url: url.to_string(),
            detail: "not a local file path".to_string(),
        })?;
        Ok(FileFs {
            root,
            url: url.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    fn temp_in(&self, path: &Path) -> Result<NamedTempFile> {
        let dir = path.parent().unwrap_or(&self.root);
        Ok(NamedTempFile::new_in(dir)?)
    }
}

/// Error mapping for reads and listings, where a missing path means a
/// missing key. Writes report their I/O errors unchanged.
fn map_io(err: io::Error, key: &str) -> RegistryError {
    if err.kind() == io::ErrorKind::NotFound {
        RegistryError::not_found(key)
    } else {
        err.into()
    }
}

impl StorageBackend for FileFs {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.path(key)).map_err(|e| map_io(e, key))
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path(key);
        let mut tmp = self.temp_in(&path)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| RegistryError::from(e.error))?;
        tracing::debug!(key, bytes = data.len(), "wrote object");
        Ok(())
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(self.path(key)).map_err(|e| map_io(e, key))?;
        Ok(Box::new(file))
    }

    fn create(&self, key: &str) -> Result<Box<dyn ObjectWriter>> {
        let path = self.path(key);
        let tmp = self.temp_in(&path)?;
        Ok(Box::new(FileObjectWriter {
            tmp,
            path,
            key: key.to_string(),
        }))
    }

    fn make_dir(&self, key: &str) -> Result<()> {
        fs::create_dir_all(self.path(key))?;
        Ok(())
    }

    fn list_dir<'a>(&'a self, key: &str) -> BoxCursor<'a, Entry> {
        match fs::read_dir(self.path(key)) {
            Ok(entries) => DirCursor {
                entries,
                key: key.to_string(),
            }
            .fuse()
            .boxed(),
            Err(e) => ErrorCursor::new(map_io(e, key)).boxed(),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        let meta = fs::symlink_metadata(&path).map_err(|e| map_io(e, key))?;
        if meta.is_dir() {
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        tracing::debug!(key, "removed object");
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path(key).try_exists()?)
    }
}

struct FileObjectWriter {
    tmp: NamedTempFile,
    path: PathBuf,
    key: String,
}

impl Write for FileObjectWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

impl ObjectWriter for FileObjectWriter {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.tmp.flush()?;
        let FileObjectWriter { tmp, path, key } = *self;
        tmp.persist(&path).map_err(|e| RegistryError::from(e.error))?;
        tracing::debug!(key = %key, "committed object");
        Ok(())
    }
}

/// Holds one open directory handle until exhausted or dropped.
struct DirCursor {
    entries: ReadDir,
    key: String,
}

impl Cursor for DirCursor {
    type Item = Entry;

    fn next_item(&mut self) -> Result<Option<Entry>> {
        for entry in self.entries.by_ref() {
            let entry = entry.map_err(|e| map_io(e, &self.key))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::debug!(prefix = %self.key, "skipping non UTF-8 entry");
                continue;
            };
            // In-flight temporary files and other hidden entries.
            if name.starts_with('.') {
                continue;
            }
            let is_prefix = entry.file_type()?.is_dir();
            return Ok(Some(Entry { key: name, is_prefix }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(fs: &FileFs, key: &str) -> Vec<Entry> {
        let mut entries = fs.list_dir(key).collect_vec().unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    #[test]
    fn write_read_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());

        fs.make_dir("packages/a").unwrap();
        fs.write("packages/a/package.json", b"{}").unwrap();
        assert_eq!(fs.read("packages/a/package.json").unwrap(), b"{}");
        assert!(fs.exists("packages/a").unwrap());
        assert!(!fs.exists("packages/b").unwrap());
        assert!(fs.read("packages/b/package.json").unwrap_err().is_not_found());
    }

    #[test]
    fn overwrite_is_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());

        fs.write("ref", b"first").unwrap();
        fs.write("ref", b"second").unwrap();
        assert_eq!(fs.read("ref").unwrap(), b"second");
    }

    #[test]
    fn created_object_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());
        fs.make_dir("cas").unwrap();

        let mut writer = fs.create("cas/blob.tgz").unwrap();
        writer.write_all(b"payload").unwrap();
        assert!(!fs.exists("cas/blob.tgz").unwrap());
        assert!(sorted(&fs, "cas").is_empty());
        writer.commit().unwrap();

        let mut data = Vec::new();
        fs.open("cas/blob.tgz").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"payload");
    }

    #[test]
    fn abandoned_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());

        let mut writer = fs.create("blob").unwrap();
        writer.write_all(b"partial").unwrap();
        drop(writer);
        assert!(!fs.exists("blob").unwrap());
        assert!(sorted(&fs, "").is_empty());
    }

    #[test]
    fn list_classifies_children() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());
        fs.make_dir("packages/tools/clang").unwrap();
        fs.write("packages/tools/package.json", b"{}").unwrap();

        assert_eq!(
            sorted(&fs, "packages/tools"),
            vec![Entry::prefix("clang"), Entry::object("package.json")]
        );
        assert!(fs
            .list_dir("packages/missing")
            .next_item()
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn remove_file_and_empty_dir_only() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());
        fs.make_dir("a/b").unwrap();
        fs.write("a/b/c", b"x").unwrap();

        assert!(fs.remove("a/b").is_err());
        fs.remove("a/b/c").unwrap();
        fs.remove("a/b").unwrap();
        assert!(!fs.exists("a/b").unwrap());
        assert!(fs.remove("a/b").unwrap_err().is_not_found());
    }

    #[test]
    fn write_without_parent_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileFs::new(dir.path());

        let err = fs.write("packages/missing/package.json", b"{}").unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)), "{err}");
        assert!(!err.is_not_found());

        let err = fs.create("cas/blob.tgz").err().unwrap();
        assert!(matches!(err, RegistryError::Io(_)), "{err}");
    }

    #[test]
    fn url_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_directory_path(dir.path()).unwrap();
        let fs = FileFs::from_url(&url).unwrap();
        assert_eq!(fs.root(), dir.path());
    }
}
