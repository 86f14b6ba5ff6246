//! Read-only `http://` / `https://` backend.
//!
//! Serves objects from a static mirror with GET and HEAD. Listing is not
//! possible over plain HTTP.

use std::io::Read;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use url::Url;

use super::{Entry, ObjectWriter, StorageBackend};
use crate::cursor::{BoxCursor, CursorExt, ErrorCursor};
use crate::error::{RegistryError, Result};

pub struct HttpFs {
    base: Url,
    url: String,
    client: Client,
}

impl HttpFs {
    pub fn new(url: &Url) -> Result<Self> {
        Ok(HttpFs {
            base: directory_url(url),
            url: url.to_string(),
            client: Client::builder().build()?,
        })
    }

    fn read_only(&self) -> RegistryError {
        RegistryError::ReadOnlyBackend {
            url: self.url.clone(),
        }
    }
}

/// Make sure relative joins extend the path instead of replacing its last
/// segment.
pub(crate) fn directory_url(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) fn object_url(base: &Url, key: &str) -> Result<Url> {
    base.join(key.trim_start_matches('/'))
        .map_err(|e| RegistryError::InvalidUrl {
            url: format!("{base}{key}"),
            detail: e.to_string(),
        })
}

/// Map a response to `NotFound` or `Http` unless it succeeded.
pub(crate) fn check_status(response: Response, key: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::NOT_FOUND {
        Err(RegistryError::not_found(key))
    } else {
        Err(RegistryError::Http {
            url: response.url().to_string(),
            status: status.as_u16(),
        })
    }
}

pub(crate) fn head_exists(client: &Client, url: Url, key: &str) -> Result<bool> {
    let response = client.head(url).send()?;
    match check_status(response, key) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

impl StorageBackend for HttpFs {
    fn url(&self) -> &str {
        &self.url
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let url = object_url(&self.base, key)?;
        tracing::debug!(%url, "GET");
        let response = check_status(self.client.get(url).send()?, key)?;
        Ok(response.bytes()?.to_vec())
    }

    fn write(&self, _key: &str, _data: &[u8]) -> Result<()> {
        Err(self.read_only())
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let url = object_url(&self.base, key)?;
        tracing::debug!(%url, "GET stream");
        let response = check_status(self.client.get(url).send()?, key)?;
        Ok(Box::new(response))
    }

    fn create(&self, _key: &str) -> Result<Box<dyn ObjectWriter>> {
        Err(self.read_only())
    }

    fn make_dir(&self, _key: &str) -> Result<()> {
        Err(self.read_only())
    }

    fn list_dir<'a>(&'a self, key: &str) -> BoxCursor<'a, Entry> {
        ErrorCursor::new(RegistryError::Unsupported(format!(
            "listing {key} over plain HTTP"
        )))
        .boxed()
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Err(self.read_only())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        head_exists(&self.client, object_url(&self.base, key)?, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_extend_the_base_path() {
        let base = directory_url(&Url::parse("https://mirror.example.com/acme").unwrap());
        assert_eq!(
            object_url(&base, "packages/tools/clang/package.json").unwrap().as_str(),
            "https://mirror.example.com/acme/packages/tools/clang/package.json"
        );
        assert_eq!(
            object_url(&base, "/shop.json").unwrap().as_str(),
            "https://mirror.example.com/acme/shop.json"
        );
    }

    #[test]
    fn mutations_are_rejected_without_network() {
        let fs = HttpFs::new(&Url::parse("http://127.0.0.1:9/acme").unwrap()).unwrap();
        assert!(matches!(fs.write("a", b"x"), Err(RegistryError::ReadOnlyBackend { .. })));
        assert!(matches!(fs.make_dir("a"), Err(RegistryError::ReadOnlyBackend { .. })));
        assert!(matches!(fs.remove("a"), Err(RegistryError::ReadOnlyBackend { .. })));
        assert!(fs.create("a").is_err());
        assert!(matches!(
            fs.list_dir("packages").next_item(),
            Err(RegistryError::Unsupported(_))
        ));
    }
}
