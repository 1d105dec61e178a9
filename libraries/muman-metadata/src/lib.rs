//! Muman Metadata
//!
//! Per-file work for the library index: tag extraction and content identity.
//!
//! This crate provides:
//! - [`LoftyExtractor`], the default [`muman_core::MetadataExtractor`]
//! - [`ContentIdentifier`], a streaming SHA-256 over the audio payload only
//! - Normalization helpers for positions, years and ISRCs
//!
//! # Example
//!
//! ```rust,no_run
//! use muman_metadata::{ContentIdentifier, LoftyExtractor};
//! use std::fs::File;
//! use std::io::BufReader;
//! use std::path::Path;
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let path = Path::new("/music/song.flac");
//! let identity = ContentIdentifier::new().identify_file(path)?;
//!
//! let mut reader = BufReader::new(File::open(path)?);
//! let metadata = LoftyExtractor::new().read(path, &mut reader)?;
//! println!("{identity}: {}", metadata.title);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod container;
mod error;
mod extractor;
mod identity;
pub mod normalize;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use container::Container;
pub use error::{ExtractError, Result};
pub use extractor::LoftyExtractor;
pub use identity::ContentIdentifier;
