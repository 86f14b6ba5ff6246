use std::io;
use std::path::PathBuf;

use crate::fanout::FanOutError;

/// Errors produced while building or unpacking archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The archive root is missing or not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A walked path did not live under the archive root.
    #[error("path escapes archive root: {}", .0.display())]
    OutsideRoot(PathBuf),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// One or more archive destinations failed.
    #[error(transparent)]
    FanOut(FanOutError),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        if FanOutError::from_io(&err).is_none() {
            return ArchiveError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<FanOutError>()) {
            Some(Ok(fan_out)) => ArchiveError::FanOut(*fan_out),
            Some(Err(other)) => ArchiveError::Io(io::Error::other(other)),
            None => ArchiveError::Io(io::Error::other("fan-out write failed")),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
