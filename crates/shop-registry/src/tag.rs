//! Instance tags and the derived tag listings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timestamp::UnixTimestamp;
use crate::validate::{check_instance_id, check_package_name, check_tag_name, check_tag_value};
use crate::version::{Record, API_VERSION};

/// A key/value label attached to an instance.
///
/// Stored twice with identical payload: under the package's tag index and
/// under the instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub api_version: String,
    pub package: String,
    pub key: String,
    pub value: String,
    pub id: String,
    pub updated_at: UnixTimestamp,
}

impl Tag {
    pub fn new(package: &str, key: &str, value: &str, id: &str) -> Result<Self> {
        let tag = Tag {
            api_version: API_VERSION.to_string(),
            package: package.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            id: id.to_string(),
            updated_at: UnixTimestamp::now(),
        };
        tag.validate()?;
        Ok(tag)
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.package)?;
        check_tag_name(&self.key)?;
        check_tag_value(&self.value)?;
        check_instance_id(&self.id)
    }
}

impl Record for Tag {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{} -> {}", self.package, self.key, self.value, self.id)
    }
}

/// A tag key in use by some instance of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageTag {
    pub package: String,
    pub key: String,
}

impl PackageTag {
    pub fn new(package: &str, key: &str) -> Result<Self> {
        let tag = PackageTag {
            package: package.to_string(),
            key: key.to_string(),
        };
        tag.validate()?;
        Ok(tag)
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.package)?;
        check_tag_name(&self.key)
    }
}

impl fmt::Display for PackageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.key)
    }
}

/// A concrete `key:value` pair in use by some instance of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageTagValue {
    pub package: String,
    pub key: String,
    pub value: String,
}

impl PackageTagValue {
    pub fn new(package: &str, key: &str, value: &str) -> Result<Self> {
        let tag = PackageTagValue {
            package: package.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        tag.validate()?;
        Ok(tag)
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.package)?;
        check_tag_name(&self.key)?;
        check_tag_value(&self.value)
    }
}

impl fmt::Display for PackageTagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.package, self.key, self.value)
    }
}
