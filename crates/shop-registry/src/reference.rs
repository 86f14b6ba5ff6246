use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timestamp::UnixTimestamp;
use crate::validate::{check_instance_id, check_package_name, check_reference_name};
use crate::version::{Record, API_VERSION};

/// A mutable named pointer to one instance of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub api_version: String,
    pub package: String,
    pub name: String,
    pub id: String,
    pub updated_at: UnixTimestamp,
}

impl Reference {
    pub fn new(package: &str, name: &str, id: &str) -> Result<Self> {
        let reference = Reference {
            api_version: API_VERSION.to_string(),
            package: package.to_string(),
            name: name.to_string(),
            id: id.to_string(),
            updated_at: UnixTimestamp::now(),
        };
        reference.validate()?;
        Ok(reference)
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.package)?;
        check_reference_name(&self.name)?;
        check_instance_id(&self.id)
    }
}

impl Record for Reference {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} -> {}", self.package, self.name, self.id)
    }
}
