//! Content digests used as instance ids.
//!
//! Every archive stored in the registry is addressed by the SHA-1 digest of
//! its compressed bytes, rendered as 40 lowercase hex characters.

use std::io::{self, Read};

use sha1::{Digest, Sha1};

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 40;

/// A content hash (SHA-1 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Compute the SHA-1 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(data);
        Self::from_hasher(hasher)
    }

    /// Finish a running hasher.
    pub fn from_hasher(hasher: Sha1) -> Self {
        ContentHash(hex_encode(&hasher.finalize()))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the hash, returning the hex string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Verify that the given data matches this hash.
    pub fn verify(&self, data: &[u8]) -> bool {
        ContentHash::compute(data) == *self
    }

    /// Whether this hash equals a hex id. Comparison is exact, so an
    /// uppercase id never matches.
    pub fn matches(&self, id: &str) -> bool {
        self.0 == id
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A reader that hashes every byte it hands out.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha1,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        HashingReader {
            inner,
            hasher: Sha1::new(),
        }
    }

    /// Drain whatever is left in the inner reader and return the digest of
    /// everything read.
    pub fn finish(mut self) -> io::Result<ContentHash> {
        io::copy(&mut self, &mut io::sink())?;
        Ok(ContentHash::from_hasher(self.hasher))
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
