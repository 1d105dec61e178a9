//! In-memory index store
use async_trait::async_trait;
use muman_core::storage::{IndexCounts, IndexStore, WriteBatch, WriteOp};
use muman_core::{ContentId, MumanError, PathEntry, Result, ScanMarker, TrackRecord};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    tracks: BTreeMap<ContentId, TrackRecord>,
    paths: BTreeMap<PathBuf, PathEntry>,
    markers: BTreeMap<PathBuf, ScanMarker>,
}

/// Index store held in process memory
///
/// Nothing survives the process; used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| MumanError::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| MumanError::storage("memory store lock poisoned"))
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn get_track(&self, identity: &ContentId) -> Result<Option<TrackRecord>> {
        Ok(self.read()?.tracks.get(identity).cloned())
    }

    async fn get_path(&self, path: &Path) -> Result<Option<PathEntry>> {
        Ok(self.read()?.paths.get(path).cloned())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        let mut state = self.write()?;
        for op in batch.into_ops() {
            match op {
                WriteOp::PutTrack(record) => {
                    state.tracks.insert(record.identity, record);
                }
                WriteOp::DeleteTrack(identity) => {
                    state.tracks.remove(&identity);
                }
                WriteOp::PutPath(entry) => {
                    state.paths.insert(entry.path.clone(), entry);
                }
                WriteOp::DeletePath(path) => {
                    state.paths.remove(&path);
                }
            }
        }
        Ok(())
    }

    async fn all_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.read()?.tracks.values().cloned().collect())
    }

    async fn all_paths(&self) -> Result<Vec<PathEntry>> {
        Ok(self.read()?.paths.values().cloned().collect())
    }

    async fn paths_under(&self, root: &Path) -> Result<Vec<PathEntry>> {
        Ok(self
            .read()?
            .paths
            .values()
            .filter(|entry| entry.path.starts_with(root))
            .cloned()
            .collect())
    }

    async fn duplicate_identities(&self) -> Result<Vec<ContentId>> {
        let state = self.read()?;
        let mut seen = HashSet::new();
        let mut duplicated = HashSet::new();
        for identity in state.paths.values().filter_map(|entry| entry.identity) {
            if !seen.insert(identity) {
                duplicated.insert(identity);
            }
        }
        let mut ids: Vec<_> = duplicated.into_iter().collect();
        ids.sort();
        Ok(ids)
    }

    async fn counts(&self) -> Result<IndexCounts> {
        let state = self.read()?;
        Ok(IndexCounts {
            tracks: state.tracks.len() as u64,
            paths: state.paths.len() as u64,
            pending_paths: state.paths.values().filter(|e| e.is_pending()).count() as u64,
        })
    }

    async fn put_scan_marker(&self, marker: &ScanMarker) -> Result<()> {
        self.write()?
            .markers
            .insert(marker.report.root.clone(), marker.clone());
        Ok(())
    }

    async fn get_scan_marker(&self, root: &Path) -> Result<Option<ScanMarker>> {
        Ok(self.read()?.markers.get(root).cloned())
    }
}
