//! Muman Core
//!
//! Platform-agnostic core types, traits, and error handling for the Muman
//! library indexing engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `ContentId`, `TrackRecord`, `PathEntry`, `DuplicateGroup`, ...
//! - **Collaborator Traits**: `MetadataExtractor`, `MetadataLookup`, `FileRemover`
//! - **Storage Seam**: the `IndexStore` trait the Library Index persists through
//! - **Error Handling**: Unified `MumanError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use muman_core::types::{Field, TrackMetadata, AudioFormat};
//!
//! let mut meta = TrackMetadata::unknown(AudioFormat::Flac);
//! meta.title = Field::from_text(Some("  Blue in Green "));
//! assert_eq!(meta.title.as_known().map(String::as_str), Some("Blue in Green"));
//! assert!(meta.artist.is_unknown());
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{MumanError, Result};
pub use storage::{IndexCounts, IndexStore, WriteBatch, WriteOp};
pub use traits::{FileRemover, MetadataExtractor, MetadataLookup, ReadSeek};

pub use types::{
    AudioFormat, ContentId, DuplicateGroup, Field, FileStat, GroupResolution, LibraryConfig,
    PathEntry, RemovalPlan, ResolutionPolicy, ScanMarker, ScanReport, ScanStatus, TrackMetadata,
    TrackRecord,
};
