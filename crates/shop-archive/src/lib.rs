//! Content-addressed archives for the shop package registry.
//!
//! - **digest**: SHA-1 content hashes used as instance ids
//! - **fanout**: a writer duplicating one stream into many destinations
//! - **archive**: deterministic tar+gzip packing and unpacking

pub mod archive;
pub mod digest;
pub mod error;
pub mod fanout;

pub use archive::{extract_archive, make_archive, strip_owner};
pub use digest::{ContentHash, HashingReader, DIGEST_HEX_LEN};
pub use error::{ArchiveError, Result};
pub use fanout::{DestinationFailure, FailureKind, FanOutError, FanOutWriter};
