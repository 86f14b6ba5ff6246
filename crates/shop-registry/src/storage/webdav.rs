//! WebDAV backend: `webdav://` maps to `http://`, `https+webdav://` to
//! `https://`.

use std::io::{self, Read, Write};

use reqwest::blocking::Client;
use reqwest::Method;
use url::Url;

use super::http::{check_status, directory_url, head_exists, object_url};
use super::{Entry, ObjectWriter, StorageBackend};
use crate::cursor::{BoxCursor, CursorExt, ErrorCursor};
use crate::error::{RegistryError, Result};

pub struct WebDavFs {
    base: Url,
    url: String,
    client: Client,
}

/// Translate a WebDAV URL into the HTTP URL that serves it.
pub fn http_url(url: &Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "webdav" => "http",
        "https+webdav" => "https",
        other => return Err(RegistryError::UnknownScheme(other.to_string())),
    };
    let rest = &url.as_str()[url.scheme().len()..];
    Url::parse(&format!("{scheme}{rest}")).map_err(|e| RegistryError::InvalidUrl {
        url: url.to_string(),
        detail: e.to_string(),
    })
}

impl WebDavFs {
    pub fn new(url: &Url) -> Result<Self> {
        Ok(WebDavFs {
            base: directory_url(&http_url(url)?),
            url: url.to_string(),
            client: Client::builder().build()?,
        })
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let url = object_url(&self.base, key)?;
        tracing::debug!(%url, bytes = data.len(), "PUT");
        check_status(self.client.put(url).body(data).send()?, key)?;
        Ok(())
    }
}

fn mkcol() -> Result<Method> {
    Method::from_bytes(b"MKCOL").map_err(|e| RegistryError::Unsupported(e.to_string()))
}

impl StorageBackend for WebDavFs {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let url = object_url(&self.base, key)?;
        let response = check_status(self.client.get(url).send()?, key)?;
        Ok(response.bytes()?.to_vec())
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.put(key, data.to_vec())
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let url = object_url(&self.base, key)?;
        let response = check_status(self.client.get(url).send()?, key)?;
        Ok(Box::new(response))
    }

    /// The body is buffered and sent with a single PUT on commit.
    fn create(&self, key: &str) -> Result<Box<dyn ObjectWriter>> {
        Ok(Box::new(BufferedPut {
            fs: WebDavFs {
                base: self.base.clone(),
                url: self.url.clone(),
                client: self.client.clone(),
            },
            key: key.to_string(),
            buf: Vec::new(),
        }))
    }

    fn make_dir(&self, key: &str) -> Result<()> {
        // MKCOL only creates one level; walk down from the top.
        let mut prefix = String::new();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            prefix.push_str(segment);
            prefix.push('/');
            let url = object_url(&self.base, &prefix)?;
            let response = self.client.request(mkcol()?, url).send()?;
            let status = response.status();
            // 405: the collection already exists.
            if !status.is_success() && status.as_u16() != 405 {
                check_status(response, &prefix)?;
            }
        }
        Ok(())
    }

    fn list_dir<'a>(&'a self, key: &str) -> BoxCursor<'a, Entry> {
        // TODO: parse PROPFIND multistatus responses to support listing.
        ErrorCursor::new(RegistryError::Unsupported(format!(
            "listing {key} over WebDAV"
        )))
        .boxed()
    }

    fn remove(&self, key: &str) -> Result<()> {
        let url = object_url(&self.base, key)?;
        check_status(self.client.delete(url).send()?, key)?;
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        head_exists(&self.client, object_url(&self.base, key)?, key)
    }
}

struct BufferedPut {
    fs: WebDavFs,
    key: String,
    buf: Vec<u8>,
}

impl Write for BufferedPut {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ObjectWriter for BufferedPut {
    fn commit(self: Box<Self>) -> Result<()> {
        let BufferedPut { fs, key, buf } = *self;
        fs.put(&key, buf)
    }
}
