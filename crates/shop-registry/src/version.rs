//! Schema versioning of stored records.
//!
//! Every JSON record carries an `api_version`. Records are written with
//! [`API_VERSION`] and accepted on read when the major version matches.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RegistryError, Result};

/// Schema version stamped on every record written.
pub const API_VERSION: &str = "1.0.0";

/// A parsed semantic version.
pub type Version = semver::Version;

/// A JSON record stored in a repository.
pub trait Record: Serialize + DeserializeOwned {
    fn api_version(&self) -> &str;
}

/// Reject records written by an incompatible schema.
pub fn check_api_version(found: &str) -> Result<()> {
    let unsupported = || RegistryError::UnsupportedApiVersion {
        found: found.to_string(),
        expected: API_VERSION.to_string(),
    };

    let found_version = Version::parse(found).map_err(|_| unsupported())?;
    let current = Version::parse(API_VERSION).map_err(|_| unsupported())?;
    if found_version.major == current.major {
        Ok(())
    } else {
        Err(unsupported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_major_is_accepted() {
        assert!(check_api_version("1.0.0").is_ok());
        assert!(check_api_version("1.4.2").is_ok());
    }

    #[test]
    fn other_major_or_garbage_is_rejected() {
        assert!(matches!(
            check_api_version("2.0.0"),
            Err(RegistryError::UnsupportedApiVersion { .. })
        ));
        assert!(check_api_version("latest").is_err());
        assert!(check_api_version("").is_err());
    }
}
