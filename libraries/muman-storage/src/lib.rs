//! Muman Storage
//!
//! The persistent library index.
//!
//! This crate provides:
//! - [`LibraryIndex`], the locked, invariant-checked index the scanner writes
//!   through
//! - [`SqliteStore`], the `SQLite` implementation of
//!   [`muman_core::IndexStore`] (WAL, one transaction per batch)
//! - [`MemoryStore`], the in-memory implementation used by tests
//! - [`ActiveScans`], the per-index registry allowing one scan per root
//!
//! # Example
//!
//! ```rust,no_run
//! use muman_storage::LibraryIndex;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = LibraryIndex::open_sqlite("sqlite://muman.db").await?;
//!
//! if let Some(entry) = index.lookup_by_path(Path::new("/music/a.flac")).await? {
//!     println!("{:?}", entry.identity);
//! }
//! # Ok(())
//! # }
//! ```

mod active;
mod error;
mod index;
mod locks;
mod memory;
mod rows;
mod sqlite;

// Table slices
pub mod paths;
pub mod scan_markers;
pub mod tracks;

pub use active::{ActiveScans, ScanGuard};
pub use error::{Result, StorageError};
pub use index::{LibraryIndex, UpsertOutcome};
pub use locks::{KeyGuard, KeyedLocks, LockKey};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// This should be called once when the application starts to ensure
/// the database schema is up to date.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://muman.db>`)
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    debug!(url = database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
