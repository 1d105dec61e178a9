//! Collaborator traits
//!
//! These are the seams the engine is driven through: metadata extraction,
//! optional online enrichment, and filesystem removal or linking (which the
//! engine itself never performs).

use crate::error::Result;
use crate::types::{ContentId, TrackMetadata};
use async_trait::async_trait;
use std::io::{Read, Seek};
use std::path::Path;

/// Byte stream an extractor can read and rewind
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// Reads container/tag data and produces canonical metadata.
///
/// Implementations must be pure reads. Failures are per-file:
/// `UnsupportedFormat`, `CorruptData` or `ReadError`.
pub trait MetadataExtractor: Send + Sync {
    /// Extract normalized metadata from `reader`; `path` is used for format
    /// hints and diagnostics only.
    fn extract(&self, path: &Path, reader: &mut dyn ReadSeek) -> Result<TrackMetadata>;
}

/// Optional external metadata service used to fill unknown fields.
///
/// Errors are logged by the caller and never block indexing.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Look up enriched metadata; `Ok(None)` means not found.
    async fn lookup(
        &self,
        identity: &ContentId,
        local: &TrackMetadata,
    ) -> Result<Option<TrackMetadata>>;
}

/// Applies a removal plan to the filesystem. Supplied by the front end after
/// explicit confirmation.
pub trait FileRemover: Send + Sync {
    /// Delete `path`
    fn remove(&self, path: &Path) -> Result<()>;

    /// Replace `path` with a hard link to `keep`, so both names share one
    /// copy of the data
    fn replace_with_link(&self, path: &Path, keep: &Path) -> Result<()>;
}
