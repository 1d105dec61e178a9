use crate::{paths, scan_markers, tracks};
use async_trait::async_trait;
use muman_core::storage::{IndexCounts, IndexStore, WriteBatch, WriteOp};
use muman_core::{ContentId, PathEntry, Result, ScanMarker, TrackRecord};
use sqlx::SqlitePool;
use std::path::Path;

/// Index store backed by `SQLite`
///
/// Each [`WriteBatch`] runs inside one transaction, so a crash leaves either
/// every op of the batch applied or none.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn apply(&self, batch: WriteBatch) -> crate::Result<()> {
        let mut tx = self.pool.begin().await?;
        for op in batch.ops() {
            match op {
                WriteOp::PutTrack(record) => tracks::put(&mut tx, record).await?,
                WriteOp::DeleteTrack(identity) => tracks::delete(&mut tx, identity).await?,
                WriteOp::PutPath(entry) => paths::put(&mut tx, entry).await?,
                WriteOp::DeletePath(path) => paths::delete(&mut tx, path).await?,
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn get_track(&self, identity: &ContentId) -> Result<Option<TrackRecord>> {
        Ok(tracks::get(&self.pool, identity).await?)
    }

    async fn get_path(&self, path: &Path) -> Result<Option<PathEntry>> {
        Ok(paths::get(&self.pool, path).await?)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        Ok(self.apply(batch).await?)
    }

    async fn all_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(tracks::get_all(&self.pool).await?)
    }

    async fn all_paths(&self) -> Result<Vec<PathEntry>> {
        Ok(paths::get_all(&self.pool).await?)
    }

    async fn paths_under(&self, root: &Path) -> Result<Vec<PathEntry>> {
        Ok(paths::get_under(&self.pool, root).await?)
    }

    async fn duplicate_identities(&self) -> Result<Vec<ContentId>> {
        Ok(paths::duplicate_identities(&self.pool).await?)
    }

    async fn counts(&self) -> Result<IndexCounts> {
        let tracks = tracks::count(&self.pool).await?;
        let (paths, pending_paths) = paths::counts(&self.pool).await?;
        Ok(IndexCounts {
            tracks,
            paths,
            pending_paths,
        })
    }

    async fn put_scan_marker(&self, marker: &ScanMarker) -> Result<()> {
        Ok(scan_markers::put(&self.pool, marker).await?)
    }

    async fn get_scan_marker(&self, root: &Path) -> Result<Option<ScanMarker>> {
        Ok(scan_markers::get(&self.pool, root).await?)
    }
}
