//! Storage trait for the library index
//!
//! The Library Index persists through an [`IndexStore`]: a key-value store
//! with two key spaces (content identity -> `TrackRecord`, path ->
//! `PathEntry`) and an atomic multi-key commit. Locking lives above the
//! store, in the index.

use crate::error::Result;
use crate::types::{ContentId, PathEntry, ScanMarker, TrackRecord};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A single keyed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    PutTrack(TrackRecord),
    DeleteTrack(ContentId),
    PutPath(PathEntry),
    DeletePath(PathBuf),
}

/// Mutations applied all-or-nothing by [`IndexStore::commit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_track(&mut self, record: TrackRecord) -> &mut Self {
        self.ops.push(WriteOp::PutTrack(record));
        self
    }

    pub fn delete_track(&mut self, identity: ContentId) -> &mut Self {
        self.ops.push(WriteOp::DeleteTrack(identity));
        self
    }

    pub fn put_path(&mut self, entry: PathEntry) -> &mut Self {
        self.ops.push(WriteOp::PutPath(entry));
        self
    }

    pub fn delete_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.ops.push(WriteOp::DeletePath(path.into()));
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Row counts of an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCounts {
    pub tracks: u64,
    pub paths: u64,
    pub pending_paths: u64,
}

/// Persistent key-value storage behind the library index
///
/// This trait abstracts storage so tests can substitute an in-memory store
/// for the `SQLite` one.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Get a track record by identity
    async fn get_track(&self, identity: &ContentId) -> Result<Option<TrackRecord>>;

    /// Get a path entry by path
    async fn get_path(&self, path: &Path) -> Result<Option<PathEntry>>;

    /// Apply every op of `batch` atomically, in order
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Every track record, ordered by identity
    async fn all_tracks(&self) -> Result<Vec<TrackRecord>>;

    /// Every path entry, ordered by path
    async fn all_paths(&self) -> Result<Vec<PathEntry>>;

    /// Path entries located below `root`, ordered by path
    async fn paths_under(&self, root: &Path) -> Result<Vec<PathEntry>>;

    /// Identities currently resolved by more than one path
    async fn duplicate_identities(&self) -> Result<Vec<ContentId>>;

    /// Row counts
    async fn counts(&self) -> Result<IndexCounts>;

    /// Persist the completion marker of a scan
    async fn put_scan_marker(&self, marker: &ScanMarker) -> Result<()>;

    /// Latest completion marker for `root`
    async fn get_scan_marker(&self, root: &Path) -> Result<Option<ScanMarker>>;
}
