//! Deterministic tar+gzip archives of directory trees.
//!
//! The archive is produced in a single pass: the gzip stream is duplicated
//! into the caller's destination and a SHA-1 hasher through a
//! [`FanOutWriter`], so the returned [`ContentHash`] always describes exactly
//! the bytes the destination received.
//!
//! # Determinism
//!
//! Entries are emitted in byte-wise sorted path order and every header
//! passes through [`strip_owner`] before it reaches the tar encoder. Two
//! trees with identical names, contents, entry types and executable bits
//! produce byte-identical archives regardless of who owns the files, when
//! they were touched, or which umask created them.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use tar::{Builder, Header, HeaderMode};
use walkdir::WalkDir;

use crate::digest::{ContentHash, HashingReader};
use crate::error::{ArchiveError, Result};
use crate::fanout::FanOutWriter;

/// Modification time stamped on every entry.
pub const NORMALIZED_MTIME: u64 = 1_153_704_088;

/// Remove owner and machine-specific metadata from an entry header.
///
/// Clears uid/gid and user/group names, pins the mtime and collapses the
/// permission bits to `0o755` (directories and executables) or `0o644`.
pub fn strip_owner(header: &mut Header) -> io::Result<()> {
    header.set_uid(0);
    header.set_gid(0);
    header.set_username("")?;
    header.set_groupname("")?;
    header.set_mtime(NORMALIZED_MTIME);

    let executable = header.mode()? & 0o100 != 0;
    let mode = if header.entry_type().is_dir() || executable {
        0o755
    } else {
        0o644
    };
    header.set_mode(mode);
    Ok(())
}

/// Archive the tree under `root` into `dst`, returning the SHA-1 of the
/// compressed bytes written.
pub fn make_archive(dst: &mut (dyn Write + Send), root: &Path) -> Result<ContentHash> {
    if !root.is_dir() {
        return Err(ArchiveError::NotADirectory(root.to_path_buf()));
    }

    let mut hasher = Sha1::new();
    let entries = {
        let tee = FanOutWriter::new().with(dst).with(&mut hasher);
        let encoder = GzEncoder::new(tee, Compression::default());
        let mut builder = Builder::new(encoder);
        builder.follow_symlinks(false);

        let entries = append_tree(&mut builder, root)?;
        let encoder = builder.into_inner()?;
        encoder.finish()?;
        entries
    };

    let hash = ContentHash::from_hasher(hasher);
    tracing::debug!(root = %root.display(), entries, id = %hash, "archive complete");
    Ok(hash)
}

fn append_tree<W: Write>(builder: &mut Builder<W>, root: &Path) -> Result<usize> {
    let mut count = 0;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        let name = path
            .strip_prefix(root)
            .map_err(|_| ArchiveError::OutsideRoot(path.to_path_buf()))?;

        let meta = fs::symlink_metadata(path)?;
        let mut header = Header::new_gnu();
        header.set_metadata_in_mode(&meta, HeaderMode::Deterministic);
        strip_owner(&mut header)?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            header.set_size(0);
            builder.append_data(&mut header, name, io::empty())?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            header.set_size(0);
            builder.append_link(&mut header, name, target)?;
        } else if file_type.is_file() {
            let file = File::open(path)?;
            builder.append_data(&mut header, name, file)?;
        } else {
            tracing::debug!(path = %path.display(), "skipping special file");
            continue;
        }
        count += 1;
    }

    Ok(count)
}

/// Unpack an archive produced by [`make_archive`] into `dest`, returning the
/// SHA-1 of every compressed byte read from `reader`.
pub fn extract_archive<R: Read>(reader: R, dest: &Path) -> Result<ContentHash> {
    fs::create_dir_all(dest)?;

    let mut archive = tar::Archive::new(GzDecoder::new(HashingReader::new(reader)));
    archive.set_overwrite(true);
    archive.unpack(dest)?;

    let hashing = archive.into_inner().into_inner();
    Ok(hashing.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("README"), b"clang toolchain\n").unwrap();
        fs::write(root.join("bin/clang"), b"\x7fELF fake binary").unwrap();
    }

    fn archive_bytes(root: &Path) -> (Vec<u8>, ContentHash) {
        let mut out = Vec::new();
        let hash = make_archive(&mut out, root).unwrap();
        (out, hash)
    }

    /// Fails every write.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("storage unavailable"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn identical_trees_produce_identical_archives() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_tree(&first.path().join("a"));
        write_tree(&second.path().join("somewhere-else"));

        let (bytes_a, hash_a) = archive_bytes(&first.path().join("a"));
        let (bytes_b, hash_b) = archive_bytes(&second.path().join("somewhere-else"));

        assert_eq!(bytes_a, bytes_b);
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn returned_hash_matches_written_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let (bytes, hash) = archive_bytes(dir.path());
        assert!(hash.verify(&bytes));
    }

    #[cfg(unix)]
    #[test]
    fn permission_bits_outside_exec_are_ignored() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let (before, hash_before) = archive_bytes(dir.path());

        fs::set_permissions(dir.path().join("README"), fs::Permissions::from_mode(0o600)).unwrap();
        fs::set_permissions(dir.path().join("bin"), fs::Permissions::from_mode(0o700)).unwrap();
        let (after, hash_after) = archive_bytes(dir.path());

        assert_eq!(before, after);
        assert_eq!(hash_before, hash_after);
    }

    #[test]
    fn content_change_changes_hash() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let (_, before) = archive_bytes(dir.path());

        fs::write(dir.path().join("README"), b"clang toolchain v2\n").unwrap();
        let (_, after) = archive_bytes(dir.path());

        assert_ne!(before, after);
    }

    #[test]
    fn headers_carry_no_owner() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());
        let (bytes, _) = archive_bytes(dir.path());

        let mut archive = tar::Archive::new(GzDecoder::new(&bytes[..]));
        let mut names = Vec::new();
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let header = entry.header();
            assert_eq!(header.uid().unwrap(), 0);
            assert_eq!(header.gid().unwrap(), 0);
            assert_eq!(header.mtime().unwrap(), NORMALIZED_MTIME);
            assert_eq!(header.username().unwrap(), Some(""));
            names.push(entry.path().unwrap().into_owned());
        }

        assert_eq!(
            names,
            vec![
                PathBuf::from("README"),
                PathBuf::from("bin"),
                PathBuf::from("bin/clang"),
            ]
        );
    }

    #[test]
    fn extract_round_trip_reports_same_hash() {
        let src = tempfile::tempdir().unwrap();
        write_tree(src.path());
        let (bytes, hash) = archive_bytes(src.path());

        let dest = tempfile::tempdir().unwrap();
        let extracted = extract_archive(&bytes[..], dest.path()).unwrap();

        assert_eq!(extracted, hash);
        assert_eq!(
            fs::read(dest.path().join("bin/clang")).unwrap(),
            b"\x7fELF fake binary"
        );
    }

    #[test]
    fn destination_failure_surfaces_as_fan_out_error() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let err = make_archive(&mut Broken, dir.path()).unwrap_err();
        match err {
            ArchiveError::FanOut(fan_out) => {
                assert_eq!(fan_out.accepted, 0);
                assert!(fan_out.io_failures().any(|f| f.index == 0));
            }
            other => panic!("expected fan-out error, got {other}"),
        }
    }

    #[test]
    fn rejects_non_directory_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();

        let mut out = Vec::new();
        assert!(matches!(
            make_archive(&mut out, &file),
            Err(ArchiveError::NotADirectory(_))
        ));
    }
}
