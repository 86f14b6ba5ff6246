//! Package instances.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::timestamp::UnixTimestamp;
use crate::validate::{check_instance_id, check_package_name};
use crate::version::{Record, API_VERSION};

/// One content-addressed upload of a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub api_version: String,
    pub package: String,
    /// SHA-1 of the instance archive, 40 lowercase hex characters.
    pub id: String,
    pub uploaded_at: UnixTimestamp,
    pub updated_at: UnixTimestamp,
}

impl Instance {
    pub fn new(package: &str, id: &str) -> Result<Self> {
        check_package_name(package)?;
        check_instance_id(id)?;
        let now = UnixTimestamp::now();
        Ok(Instance {
            api_version: API_VERSION.to_string(),
            package: package.to_string(),
            id: id.to_string(),
            uploaded_at: now,
            updated_at: now,
        })
    }

    pub fn validate(&self) -> Result<()> {
        check_package_name(&self.package)?;
        check_instance_id(&self.id)
    }
}

impl Record for Instance {
    fn api_version(&self) -> &str {
        &self.api_version
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.package, self.id)
    }
}
