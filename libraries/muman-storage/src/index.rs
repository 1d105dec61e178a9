//! The library index
//!
//! [`LibraryIndex`] is the system of record: content identities to track
//! records, paths to path entries. It owns the invariant that no path ever
//! resolves to an identity without a track record, and that every track
//! record has a non-empty path set. Each operation commits one
//! [`WriteBatch`], atomically.

use crate::active::ActiveScans;
use crate::locks::{KeyedLocks, LockKey};
use crate::{create_pool, run_migrations, MemoryStore, SqliteStore};
use chrono::Utc;
use futures_util::stream::{self, BoxStream, StreamExt};
use muman_core::storage::{IndexCounts, IndexStore, WriteBatch};
use muman_core::{
    ContentId, DuplicateGroup, FileStat, MumanError, PathEntry, Result, ScanMarker, ScanReport,
    TrackMetadata, TrackRecord,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// What an upsert changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The path had no entry before
    pub new_path: bool,
    /// A track record was created for the identity
    pub new_track: bool,
    /// Identity the path resolved to before, when it differs
    pub previous: Option<ContentId>,
}

/// Persistent index over an injected [`IndexStore`]
pub struct LibraryIndex {
    store: Arc<dyn IndexStore>,
    locks: KeyedLocks,
    active_scans: Arc<ActiveScans>,
}

impl std::fmt::Debug for LibraryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryIndex")
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl LibraryIndex {
    /// Open an index over `store`, verifying its invariants.
    ///
    /// Fails with `IndexCorruption` if the persisted state violates them;
    /// nothing is repaired.
    pub async fn open(store: Arc<dyn IndexStore>) -> Result<Self> {
        let index = Self {
            store,
            locks: KeyedLocks::new(),
            active_scans: Arc::new(ActiveScans::new()),
        };
        index.verify().await?;
        Ok(index)
    }

    /// Open (creating if missing) a `SQLite` index at `database_url`
    pub async fn open_sqlite(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Self::open(Arc::new(SqliteStore::new(pool))).await
    }

    /// Empty index held in memory
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            locks: KeyedLocks::new(),
            active_scans: Arc::new(ActiveScans::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Roots currently being scanned into this index
    pub fn active_scans(&self) -> &Arc<ActiveScans> {
        &self.active_scans
    }

    /// Check every structural invariant of the persisted state
    pub async fn verify(&self) -> Result<()> {
        let tracks: BTreeMap<ContentId, TrackRecord> = self
            .store
            .all_tracks()
            .await?
            .into_iter()
            .map(|record| (record.identity, record))
            .collect();
        let paths: BTreeMap<PathBuf, PathEntry> = self
            .store
            .all_paths()
            .await?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();

        for entry in paths.values() {
            let Some(identity) = entry.identity else {
                continue;
            };
            let record = tracks.get(&identity).ok_or_else(|| {
                MumanError::corruption(format!(
                    "{} resolves to {identity} which has no track record",
                    entry.path.display()
                ))
            })?;
            if !record.contains(&entry.path) {
                return Err(MumanError::corruption(format!(
                    "{} resolves to {identity} but is missing from its path set",
                    entry.path.display()
                )));
            }
        }

        for record in tracks.values() {
            if record.paths.is_empty() {
                return Err(MumanError::corruption(format!(
                    "track record {} has an empty path set",
                    record.identity
                )));
            }
            for path in &record.paths {
                let resolves_here = paths
                    .get(path)
                    .is_some_and(|entry| entry.identity == Some(record.identity));
                if !resolves_here {
                    return Err(MumanError::corruption(format!(
                        "track record {} lists {} which does not resolve to it",
                        record.identity,
                        path.display()
                    )));
                }
            }
        }

        debug!(
            tracks = tracks.len(),
            paths = paths.len(),
            "Index invariants verified"
        );
        Ok(())
    }

    /// Resolve `path` to `identity` with `metadata` as the latest snapshot.
    ///
    /// If the path resolved to another identity before, it is detached from
    /// that record, which is deleted once its path set is empty.
    pub async fn upsert(
        &self,
        identity: ContentId,
        metadata: TrackMetadata,
        path: &Path,
        stat: FileStat,
    ) -> Result<UpsertOutcome> {
        let _path_guard = self.locks.lock([LockKey::Path(path.to_path_buf())]).await;
        let existing = self.store.get_path(path).await?;
        let previous = existing
            .as_ref()
            .and_then(|entry| entry.identity)
            .filter(|prev| *prev != identity);

        let mut keys = vec![LockKey::Track(identity)];
        keys.extend(previous.map(LockKey::Track));
        let _track_guard = self.locks.lock(keys).await;

        let mut batch = WriteBatch::new();
        if let Some(prev) = previous {
            self.detach(&mut batch, prev, path).await?;
        }

        let (record, new_track) = match self.store.get_track(&identity).await? {
            Some(mut record) => {
                record.metadata = metadata;
                record.paths.insert(path.to_path_buf());
                record.last_verified = Utc::now();
                (record, false)
            }
            None => (TrackRecord::new(identity, metadata, path), true),
        };
        batch
            .put_track(record)
            .put_path(PathEntry::resolved(path, stat, identity));
        self.store.commit(batch).await?;

        debug!(path = %path.display(), identity = %identity.short(), new_track, "Upserted path");
        Ok(UpsertOutcome {
            new_path: existing.is_none(),
            new_track,
            previous,
        })
    }

    /// Track record for `identity`
    pub async fn lookup_by_identity(&self, identity: &ContentId) -> Result<Option<TrackRecord>> {
        self.store.get_track(identity).await
    }

    /// Path entry for `path`
    pub async fn lookup_by_path(&self, path: &Path) -> Result<Option<PathEntry>> {
        self.store.get_path(path).await
    }

    /// Remove `path` from the index; returns whether it was known
    pub async fn remove_path(&self, path: &Path) -> Result<bool> {
        let _path_guard = self.locks.lock([LockKey::Path(path.to_path_buf())]).await;
        let Some(entry) = self.store.get_path(path).await? else {
            return Ok(false);
        };
        let _track_guard = self
            .locks
            .lock(entry.identity.map(LockKey::Track))
            .await;

        let mut batch = WriteBatch::new();
        if let Some(identity) = entry.identity {
            self.detach(&mut batch, identity, path).await?;
        }
        batch.delete_path(path);
        self.store.commit(batch).await?;

        debug!(path = %path.display(), "Removed path");
        Ok(true)
    }

    /// Re-point the entry at `from` to `to` under the same identity, keeping
    /// the metadata snapshot. Returns `false` if `from` no longer resolves.
    pub async fn move_path(&self, from: &Path, to: &Path, stat: FileStat) -> Result<bool> {
        if from == to {
            return self.touch(to, stat).await;
        }
        let _path_guard = self
            .locks
            .lock([
                LockKey::Path(from.to_path_buf()),
                LockKey::Path(to.to_path_buf()),
            ])
            .await;

        let Some(identity) = self.store.get_path(from).await?.and_then(|e| e.identity) else {
            return Ok(false);
        };
        let displaced = self
            .store
            .get_path(to)
            .await?
            .and_then(|e| e.identity)
            .filter(|other| *other != identity);

        let mut keys = vec![LockKey::Track(identity)];
        keys.extend(displaced.map(LockKey::Track));
        let _track_guard = self.locks.lock(keys).await;

        let mut record = self.store.get_track(&identity).await?.ok_or_else(|| {
            MumanError::corruption(format!(
                "{} resolves to {identity} which has no track record",
                from.display()
            ))
        })?;

        let mut batch = WriteBatch::new();
        if let Some(other) = displaced {
            self.detach(&mut batch, other, to).await?;
        }
        record.paths.remove(from);
        record.paths.insert(to.to_path_buf());
        record.last_verified = Utc::now();
        batch
            .put_track(record)
            .delete_path(from)
            .put_path(PathEntry::resolved(to, stat, identity));
        self.store.commit(batch).await?;

        info!(from = %from.display(), to = %to.display(), "Moved path");
        Ok(true)
    }

    /// Detach `path` from its identity and leave it pending
    pub async fn mark_pending(&self, path: &Path, stat: FileStat) -> Result<()> {
        let _path_guard = self.locks.lock([LockKey::Path(path.to_path_buf())]).await;
        let identity = self.store.get_path(path).await?.and_then(|e| e.identity);
        let _track_guard = self.locks.lock(identity.map(LockKey::Track)).await;

        let mut batch = WriteBatch::new();
        if let Some(identity) = identity {
            self.detach(&mut batch, identity, path).await?;
        }
        batch.put_path(PathEntry::pending(path, stat));
        self.store.commit(batch).await?;

        debug!(path = %path.display(), "Marked path pending");
        Ok(())
    }

    /// Refresh the stat of a resolved entry and its record's last-verified
    /// time, leaving metadata alone. Returns `false` if the path is unknown
    /// or pending.
    pub async fn touch(&self, path: &Path, stat: FileStat) -> Result<bool> {
        let _path_guard = self.locks.lock([LockKey::Path(path.to_path_buf())]).await;
        let Some(identity) = self.store.get_path(path).await?.and_then(|e| e.identity) else {
            return Ok(false);
        };
        let _track_guard = self.locks.lock([LockKey::Track(identity)]).await;

        let Some(mut record) = self.store.get_track(&identity).await? else {
            return Err(MumanError::corruption(format!(
                "{} resolves to {identity} which has no track record",
                path.display()
            )));
        };
        record.last_verified = Utc::now();

        let mut batch = WriteBatch::new();
        batch
            .put_track(record)
            .put_path(PathEntry::resolved(path, stat, identity));
        self.store.commit(batch).await?;
        Ok(true)
    }

    /// Every path entry below `root`, ordered by path
    pub async fn paths_under(&self, root: &Path) -> Result<Vec<PathEntry>> {
        self.store.paths_under(root).await
    }

    /// Lazily produce every duplicate group.
    ///
    /// The stream is finite and each call recomputes from current state; an
    /// identity whose group shrank below two paths in the meantime is
    /// skipped.
    pub fn duplicate_groups(&self) -> BoxStream<'static, Result<DuplicateGroup>> {
        let store = Arc::clone(&self.store);
        stream::unfold(
            (store, None::<std::vec::IntoIter<ContentId>>),
            |(store, pending)| async move {
                let mut ids = match pending {
                    Some(ids) => ids,
                    None => match store.duplicate_identities().await {
                        Ok(ids) => ids.into_iter(),
                        Err(e) => return Some((Err(e), (store, Some(Vec::new().into_iter())))),
                    },
                };
                loop {
                    let identity = ids.next()?;
                    match duplicate_group(store.as_ref(), identity).await {
                        Ok(Some(group)) => return Some((Ok(group), (store, Some(ids)))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (store, Some(ids)))),
                    }
                }
            },
        )
        .boxed()
    }

    /// Persist the completion marker of a finished scan, bumping the per-root
    /// scan count
    pub async fn record_scan(&self, report: ScanReport) -> Result<ScanMarker> {
        let _guard = self
            .locks
            .lock([LockKey::Path(report.root.clone())])
            .await;
        let previous = self.store.get_scan_marker(&report.root).await?;
        let marker = ScanMarker {
            report,
            scan_count: previous.map_or(0, |m| m.scan_count) + 1,
        };
        self.store.put_scan_marker(&marker).await?;
        Ok(marker)
    }

    /// Completion marker of the latest scan of `root`
    pub async fn last_scan(&self, root: &Path) -> Result<Option<ScanMarker>> {
        self.store.get_scan_marker(root).await
    }

    /// Row counts
    pub async fn counts(&self) -> Result<IndexCounts> {
        self.store.counts().await
    }

    /// Queue removal of `path` from `identity`'s record. Caller holds both
    /// locks.
    async fn detach(&self, batch: &mut WriteBatch, identity: ContentId, path: &Path) -> Result<()> {
        let Some(mut record) = self.store.get_track(&identity).await? else {
            return Ok(());
        };
        record.paths.remove(path);
        if record.paths.is_empty() {
            debug!(identity = %identity.short(), "Deleting orphaned track record");
            batch.delete_track(identity);
        } else {
            batch.put_track(record);
        }
        Ok(())
    }
}

async fn duplicate_group(
    store: &dyn IndexStore,
    identity: ContentId,
) -> Result<Option<DuplicateGroup>> {
    let Some(record) = store.get_track(&identity).await? else {
        return Ok(None);
    };
    let mut entries = Vec::with_capacity(record.paths.len());
    for path in &record.paths {
        if let Some(entry) = store.get_path(path).await? {
            if entry.identity == Some(identity) {
                entries.push(entry);
            }
        }
    }
    if entries.len() < 2 {
        return Ok(None);
    }
    Ok(Some(DuplicateGroup {
        identity,
        metadata: record.metadata,
        entries,
    }))
}
