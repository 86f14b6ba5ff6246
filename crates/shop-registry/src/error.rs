//! Registry error types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use shop_archive::ArchiveError;

/// Errors that can occur during registry operations.
///
/// The type is `Clone` so a finished cursor can hand back the same error on
/// every later call. Sources that are not `Clone` are shared through `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Write action on a registry whose configuration does not enable writes.
    #[error("write action on the registry is not enabled in configuration: {action}")]
    WriteNotAllowed { action: String },

    /// Admin action on a registry whose configuration does not enable admin.
    #[error("admin action on the registry is not enabled in configuration: {action}")]
    AdminNotAllowed { action: String },

    #[error("write to repository {url} is not enabled in configuration: {key}")]
    RepositoryWriteNotAllowed { url: String, key: String },

    #[error("admin action on repository {url} is not enabled in configuration: {key}")]
    RepositoryAdminNotAllowed { url: String, key: String },

    #[error("invalid package name: {0:?}")]
    InvalidPackageName(String),

    #[error("invalid instance id: {0:?}")]
    InvalidInstanceId(String),

    #[error("invalid tag name: {0:?}")]
    InvalidTagName(String),

    #[error("invalid tag value: {0:?}")]
    InvalidTagValue(String),

    #[error("invalid reference name: {0:?}")]
    InvalidReferenceName(String),

    /// Requested object does not exist.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// A package names a secondary repository the registry does not have.
    #[error("registry does not have repository '{0}'")]
    UnknownRepository(String),

    /// Several independent sub-operations failed.
    #[error("{}", AggregateDisplay(.0))]
    Aggregate(Vec<RegistryError>),

    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// Unexpected HTTP status from a remote backend.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    #[error("transport error: {0}")]
    Transport(Arc<reqwest::Error>),

    #[error("unknown URL scheme '{0}'")]
    UnknownScheme(String),

    #[error("invalid URL '{url}': {detail}")]
    InvalidUrl { url: String, detail: String },

    /// Mutation attempted on a backend that only serves reads.
    #[error("backend for {url} is read-only")]
    ReadOnlyBackend { url: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Stored record was written by an incompatible schema version.
    #[error("unsupported api version {found} (expected {expected})")]
    UnsupportedApiVersion { found: String, expected: String },

    /// Downloaded bytes do not hash to the instance id.
    #[error("integrity check failed for '{package}': expected {expected}, got {actual}")]
    IntegrityFailure {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("config error at {}: {detail}", path.display())]
    Config { path: PathBuf, detail: String },

    #[error("registry '{0}' already exists in configuration")]
    RegistryConfigExists(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("archive error: {0}")]
    Archive(Arc<ArchiveError>),
}

impl RegistryError {
    /// Whether the error means the requested object is absent, as opposed to
    /// unreadable or corrupt.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            RegistryError::WriteNotAllowed { .. }
                | RegistryError::AdminNotAllowed { .. }
                | RegistryError::RepositoryWriteNotAllowed { .. }
                | RegistryError::RepositoryAdminNotAllowed { .. }
        )
    }

    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        RegistryError::NotFound { key: key.into() }
    }
}

struct AggregateDisplay<'a>(&'a [RegistryError]);

impl fmt::Display for AggregateDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.0.len())?;
        for err in self.0 {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

/// Collapse the results of independent sub-operations into one.
///
/// Succeeds when every sub-operation succeeded. A single failure is returned
/// unchanged; several are returned as [`RegistryError::Aggregate`].
pub fn aggregate<I>(results: I) -> Result<()>
where
    I: IntoIterator<Item = Result<()>>,
{
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(()) => {}
            Err(RegistryError::Aggregate(nested)) => errors.extend(nested),
            Err(e) => errors.push(e),
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(RegistryError::Aggregate(errors)),
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Json(Arc::new(err))
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        RegistryError::Transport(Arc::new(err))
    }
}

impl From<ArchiveError> for RegistryError {
    fn from(err: ArchiveError) -> Self {
        RegistryError::Archive(Arc::new(err))
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_all_ok() {
        assert!(aggregate(vec![Ok(()), Ok(())]).is_ok());
    }

    #[test]
    fn aggregate_single_failure_is_unwrapped() {
        let err = aggregate(vec![Ok(()), Err(RegistryError::not_found("a"))]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn aggregate_collects_every_failure() {
        let err = aggregate(vec![
            Err(RegistryError::not_found("a")),
            Ok(()),
            Err(RegistryError::Cancelled),
        ])
        .unwrap_err();

        match &err {
            RegistryError::Aggregate(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected aggregate, got {other}"),
        }
        let text = err.to_string();
        assert!(text.contains("not found: a"), "{text}");
        assert!(text.contains("operation cancelled"), "{text}");
    }

    #[test]
    fn aggregate_flattens_nested() {
        let nested = RegistryError::Aggregate(vec![
            RegistryError::not_found("a"),
            RegistryError::not_found("b"),
        ]);
        let err = aggregate(vec![Err(nested), Err(RegistryError::Cancelled)]).unwrap_err();
        match err {
            RegistryError::Aggregate(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected aggregate, got {other}"),
        }
    }
}
