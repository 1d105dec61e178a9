//! Muman Scanner
//!
//! Keeps a [`muman_storage::LibraryIndex`] in line with the filesystem.
//!
//! This crate provides:
//! - [`AudioWalker`], a restartable traversal yielding audio files
//! - [`LibraryScanner`], the reconciler: incremental re-identification,
//!   rename detection and removal of vanished files
//! - [`DuplicateResolver`], which turns duplicate groups into a removal plan
//!
//! # Example
//!
//! ```rust,no_run
//! use muman_core::{LibraryConfig, ResolutionPolicy};
//! use muman_scanner::{DuplicateResolver, LibraryScanner};
//! use muman_storage::LibraryIndex;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = Arc::new(LibraryIndex::open_sqlite("sqlite://muman.db").await?);
//! let scanner = LibraryScanner::new(Arc::clone(&index), LibraryConfig::default());
//!
//! let report = scanner.scan(Path::new("/music")).await?;
//! println!("{}", report.summary_text());
//!
//! let plan = DuplicateResolver::new(ResolutionPolicy::KeepShortestPath)
//!     .plan(&index)
//!     .await?;
//! for path in plan.removals() {
//!     println!("would remove {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod enrich;
mod error;
mod resolver;
mod scanner;
mod state;
mod walker;

pub use enrich::Enricher;
pub use error::{Result, ScanError};
pub use resolver::DuplicateResolver;
pub use scanner::{LibraryScanner, ProgressCallback};
pub use state::{FileAction, ScanState};
pub use walker::{AudioFile, AudioWalker};
