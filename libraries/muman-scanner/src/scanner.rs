//! Library scanner
//!
//! Walks one root, brings the index in line with what is on disk and
//! reports what changed. Traversal runs on the blocking pool and feeds a
//! bounded queue drained by a fixed set of workers; a single coordinator
//! owns the [`ScanState`] and reconciles deletions once the workers finish.

use crate::enrich::Enricher;
use crate::error::{Result, ScanError};
use crate::state::{FileAction, ScanState};
use crate::walker::{AudioFile, AudioWalker};
use muman_core::{
    ContentId, LibraryConfig, MetadataExtractor, MetadataLookup, MumanError, PathEntry,
    ScanReport, ScanStatus,
};
use muman_metadata::{ContentIdentifier, LoftyExtractor};
use muman_storage::LibraryIndex;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Callback for scan progress updates
pub type ProgressCallback = Arc<dyn Fn(&ScanReport) + Send + Sync>;

/// Queue slots per worker
const QUEUE_DEPTH_PER_WORKER: usize = 4;

/// Reconciles filesystem roots against a [`LibraryIndex`]
pub struct LibraryScanner {
    index: Arc<LibraryIndex>,
    extractor: Arc<dyn MetadataExtractor>,
    identifier: ContentIdentifier,
    enricher: Option<Enricher>,
    config: LibraryConfig,
    force_refresh: bool,
    progress: Option<ProgressCallback>,
}

enum ScanEvent {
    Discovered(PathBuf),
    TraversalError(MumanError),
    Processed(FileAction),
}

impl LibraryScanner {
    /// Scanner writing to `index`, using the lofty extractor and no lookup
    pub fn new(index: Arc<LibraryIndex>, config: LibraryConfig) -> Self {
        Self {
            index,
            extractor: Arc::new(LoftyExtractor::new()),
            identifier: ContentIdentifier::new(),
            enricher: None,
            config,
            force_refresh: false,
            progress: None,
        }
    }

    /// Replace the metadata extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Fill unknown fields from an external lookup after extraction.
    ///
    /// Each lookup is bounded by the configured lookup timeout.
    pub fn with_lookup(mut self, lookup: Arc<dyn MetadataLookup>) -> Self {
        self.enricher = Some(Enricher::new(lookup).with_timeout(self.config.lookup_timeout()));
        self
    }

    /// Re-identify and re-extract files even when their stat is unchanged
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Set progress callback
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn index(&self) -> &Arc<LibraryIndex> {
        &self.index
    }

    /// Whether a scan of `root` into this scanner's index is running
    pub async fn is_scanning(&self, root: &Path) -> bool {
        let root = tokio::fs::canonicalize(root)
            .await
            .unwrap_or_else(|_| root.to_path_buf());
        self.index.active_scans().is_active(&root)
    }

    /// Scan every configured root in turn
    pub async fn scan_all(&self) -> Result<Vec<ScanReport>> {
        let mut reports = Vec::with_capacity(self.config.roots.len());
        for root in &self.config.roots {
            reports.push(self.scan(root).await?);
        }
        Ok(reports)
    }

    /// Scan `root` to completion
    pub async fn scan(&self, root: &Path) -> Result<ScanReport> {
        self.scan_with_cancel(root, CancellationToken::new()).await
    }

    /// Scan `root`, stopping between files once `cancel` fires.
    ///
    /// A cancelled scan keeps everything indexed so far, skips deletion
    /// reconciliation and reports [`ScanStatus::Cancelled`].
    pub async fn scan_with_cancel(
        &self,
        root: &Path,
        cancel: CancellationToken,
    ) -> Result<ScanReport> {
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| ScanError::invalid_root(root, e.to_string()))?;
        let meta = tokio::fs::metadata(&root)
            .await
            .map_err(|e| ScanError::invalid_root(&root, e.to_string()))?;
        if !meta.is_dir() {
            return Err(ScanError::invalid_root(&root, "not a directory"));
        }

        let _guard = self.index.active_scans().try_acquire(&root)?;
        info!(root = %root.display(), workers = self.config.worker_count(), "Starting scan");

        let known: HashMap<PathBuf, PathEntry> = self
            .index
            .paths_under(&root)
            .await?
            .into_iter()
            .map(|entry| (entry.path.clone(), entry))
            .collect();
        debug!(known = known.len(), "Loaded indexed paths");

        let stop = cancel.child_token();
        let processor = Arc::new(FileProcessor {
            index: Arc::clone(&self.index),
            extractor: Arc::clone(&self.extractor),
            identifier: self.identifier.clone(),
            enricher: self.enricher.clone(),
            root: root.clone(),
            force_refresh: self.force_refresh,
            known,
            claimed: StdMutex::new(HashSet::new()),
        });

        let workers = self.config.worker_count();
        let (work_tx, work_rx) = mpsc::channel::<AudioFile>(workers * QUEUE_DEPTH_PER_WORKER);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let traversal = spawn_traversal(
            AudioWalker::from_config(&root, &self.config),
            work_tx,
            event_tx.clone(),
            stop.clone(),
        );

        let work_rx = Arc::new(Mutex::new(work_rx));
        let handles: Vec<JoinHandle<Result<()>>> = (0..workers)
            .map(|worker_id| {
                let processor = Arc::clone(&processor);
                let work_rx = Arc::clone(&work_rx);
                let event_tx = event_tx.clone();
                let stop = stop.clone();
                tokio::spawn(async move {
                    let result = processor
                        .worker_loop(worker_id, work_rx, event_tx, stop.clone())
                        .await;
                    if result.is_err() {
                        stop.cancel();
                    }
                    result
                })
            })
            .collect();
        drop(work_rx);
        drop(event_tx);

        let mut state = ScanState::new(&root);
        while let Some(event) = event_rx.recv().await {
            match event {
                ScanEvent::Discovered(path) => state.visit(path),
                ScanEvent::TraversalError(err) => {
                    warn!("Skipping unreadable subtree: {}", err);
                    let path = match err {
                        MumanError::Io { path, .. } => path,
                        _ => root.clone(),
                    };
                    state.record_traversal_error(path);
                }
                ScanEvent::Processed(action) => state.record(action),
            }
            if let Some(ref callback) = self.progress {
                callback(state.report());
            }
        }

        traversal.await?;
        let mut failure = None;
        for handle in handles {
            if let Err(e) = handle.await? {
                failure.get_or_insert(e);
            }
        }
        if let Some(e) = failure {
            error!(root = %root.display(), "Scan aborted: {}", e);
            return Err(e);
        }

        let status = if cancel.is_cancelled() {
            info!(root = %root.display(), "Scan cancelled; skipping removal of missing files");
            ScanStatus::Cancelled
        } else {
            let stale: Vec<PathBuf> = processor
                .known
                .keys()
                .filter(|path| state.is_stale(path))
                .cloned()
                .collect();
            for path in stale {
                if self.index.remove_path(&path).await? {
                    debug!(path = %path.display(), "Removed missing file");
                    state.record_removed(path);
                }
            }
            ScanStatus::Completed
        };

        let report = state.finish(status);
        let marker = self.index.record_scan(report.clone()).await?;
        info!(scan_count = marker.scan_count, "{}", report.summary_text());
        Ok(report)
    }
}

/// A panic while reading one file counts against that file only
fn per_file_panic<T>(path: &Path, err: JoinError) -> Result<muman_core::Result<T>> {
    if !err.is_panic() {
        return Err(err.into());
    }
    error!(path = %path.display(), "Reader panicked: {}", err);
    Ok(Err(MumanError::CorruptData(format!(
        "reader panicked on {}",
        path.display()
    ))))
}

impl std::fmt::Debug for LibraryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryScanner")
            .field("config", &self.config)
            .field("force_refresh", &self.force_refresh)
            .finish_non_exhaustive()
    }
}

/// Run the walker on the blocking pool, feeding the work queue
fn spawn_traversal(
    walker: AudioWalker,
    work_tx: mpsc::Sender<AudioFile>,
    event_tx: mpsc::UnboundedSender<ScanEvent>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        for item in walker.walk() {
            if stop.is_cancelled() {
                debug!("Traversal stopped");
                break;
            }
            match item {
                Ok(file) => {
                    if event_tx
                        .send(ScanEvent::Discovered(file.path.clone()))
                        .is_err()
                        || work_tx.blocking_send(file).is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    if event_tx.send(ScanEvent::TraversalError(err)).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

/// Per-scan file processing shared by the workers
struct FileProcessor {
    index: Arc<LibraryIndex>,
    extractor: Arc<dyn MetadataExtractor>,
    identifier: ContentIdentifier,
    enricher: Option<Enricher>,
    root: PathBuf,
    force_refresh: bool,
    known: HashMap<PathBuf, PathEntry>,
    // Vanished paths already taken over by a rename
    claimed: StdMutex<HashSet<PathBuf>>,
}

impl FileProcessor {
    async fn worker_loop(
        &self,
        worker_id: usize,
        queue: Arc<Mutex<mpsc::Receiver<AudioFile>>>,
        events: mpsc::UnboundedSender<ScanEvent>,
        stop: CancellationToken,
    ) -> Result<()> {
        debug!(worker_id, "Scan worker started");
        loop {
            let next = {
                let mut queue = queue.lock().await;
                tokio::select! {
                    () = stop.cancelled() => None,
                    file = queue.recv() => file,
                }
            };
            let Some(file) = next else {
                break;
            };
            if stop.is_cancelled() {
                break;
            }

            let action = self.process(file).await?;
            if events.send(ScanEvent::Processed(action)).is_err() {
                break;
            }
        }
        debug!(worker_id, "Scan worker finished");
        Ok(())
    }

    /// Bring one file's index entries up to date.
    ///
    /// Per-file failures are logged and reported as `Errored`; only index
    /// failures are returned.
    async fn process(&self, file: AudioFile) -> Result<FileAction> {
        let known = self.known.get(&file.path);
        if let Some(entry) = known {
            if !self.force_refresh && !entry.needs_refresh(&file.stat) {
                return Ok(FileAction::Unchanged);
            }
        }

        let identifier = self.identifier.clone();
        let path = file.path.clone();
        let identified = tokio::task::spawn_blocking(move || {
            identifier.identify_file(&path).map_err(MumanError::from)
        })
        .await
        .or_else(|e| per_file_panic(&file.path, e))?;
        let identity = match identified {
            Ok(identity) => identity,
            Err(e) => return self.skip(&file, known, e).await,
        };

        if known.is_none() && !self.force_refresh {
            if let Some(action) = self.try_move(&file, &identity).await? {
                return Ok(action);
            }
        }

        let extractor = Arc::clone(&self.extractor);
        let path = file.path.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            let reader = File::open(&path).map_err(MumanError::ReadError)?;
            extractor.extract(&path, &mut BufReader::new(reader))
        })
        .await
        .or_else(|e| per_file_panic(&file.path, e))?;
        let mut metadata = match extracted {
            Ok(metadata) => metadata,
            Err(e) => return self.skip(&file, known, e).await,
        };

        if let Some(ref enricher) = self.enricher {
            enricher.enrich(&identity, &mut metadata).await;
        }

        let outcome = self
            .index
            .upsert(identity, metadata, &file.path, file.stat)
            .await?;
        debug!(
            path = %file.path.display(),
            identity = %identity.short(),
            new_track = outcome.new_track,
            "Indexed file"
        );
        Ok(if outcome.new_path {
            FileAction::Added
        } else {
            FileAction::Updated
        })
    }

    /// Re-point a vanished path of the same identity at this new file
    async fn try_move(
        &self,
        file: &AudioFile,
        identity: &ContentId,
    ) -> Result<Option<FileAction>> {
        let Some(record) = self.index.lookup_by_identity(identity).await? else {
            return Ok(None);
        };

        for candidate in record
            .paths
            .iter()
            .filter(|p| p.starts_with(&self.root) && **p != file.path)
        {
            if tokio::fs::try_exists(candidate).await.unwrap_or(true) {
                continue;
            }
            if !self.claim(candidate) {
                continue;
            }
            if self
                .index
                .move_path(candidate, &file.path, file.stat)
                .await?
            {
                return Ok(Some(FileAction::Moved));
            }
        }
        Ok(None)
    }

    fn claim(&self, path: &Path) -> bool {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf())
    }

    /// Count a per-file failure. A previously resolved path is left pending
    /// so the next scan retries it.
    async fn skip(
        &self,
        file: &AudioFile,
        known: Option<&PathEntry>,
        err: MumanError,
    ) -> Result<FileAction> {
        if !err.is_per_file() && !matches!(err, MumanError::Io { .. }) {
            return Err(ScanError::Index(err));
        }
        warn!(path = %file.path.display(), "Skipping file: {}", err);
        if known.is_some() {
            self.index.mark_pending(&file.path, file.stat).await?;
        }
        Ok(FileAction::Errored)
    }
}
