use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Whole seconds since the Unix epoch, encoded in JSON as a bare integer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UnixTimestamp(pub i64);

impl UnixTimestamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        UnixTimestamp(secs)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UnixTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_integer() {
        assert_eq!(serde_json::to_string(&UnixTimestamp(1_700_000_000)).unwrap(), "1700000000");
        let back: UnixTimestamp = serde_json::from_str("42").unwrap();
        assert_eq!(back.as_secs(), 42);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(UnixTimestamp::now().as_secs() > 1_577_836_800);
    }
}
