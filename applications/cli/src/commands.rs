//! Subcommand implementations
//!
//! Each command writes its human-readable output to the given writer so the
//! binary can pass stdout and tests can pass a buffer.

use crate::config::MumanConfig;
use anyhow::{bail, Context as _};
use muman_core::{
    ContentId, FileRemover, FileStat, RemovalPlan, ResolutionPolicy, ScanReport, ScanStatus,
};
use muman_metadata::ContentIdentifier;
use muman_scanner::{DuplicateResolver, LibraryScanner};
use muman_storage::LibraryIndex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Loaded configuration plus the opened index
pub struct App {
    pub config: MumanConfig,
    pub index: Arc<LibraryIndex>,
}

/// What `dupes` does with the copies a plan proposes to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupesAction {
    /// Print the plan only
    Report,
    /// Delete the copies
    Remove,
    /// Replace each copy with a hard link to the kept file
    HardLink,
}

/// Result of `dupes`
#[derive(Debug)]
pub struct DupesOutcome {
    pub plan: RemovalPlan,
    /// Files deleted and dropped from the index
    pub removed: usize,
    /// Files replaced by a hard link to the kept copy
    pub linked: usize,
    /// Files skipped because they changed since the last scan, or that the
    /// remover could not handle
    pub failed: usize,
}

impl App {
    /// Validate `config` and open its index
    pub async fn open(config: MumanConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let index = LibraryIndex::open_sqlite(&config.storage.database_url)
            .await
            .with_context(|| format!("failed to open index at {}", config.storage.database_url))?;
        Ok(Self::new(config, Arc::new(index)))
    }

    pub fn new(config: MumanConfig, index: Arc<LibraryIndex>) -> Self {
        Self { config, index }
    }

    /// Given roots, or the configured ones
    fn roots(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        if roots.is_empty() {
            self.config.library.roots.clone()
        } else {
            roots.to_vec()
        }
    }

    /// Scan each root in turn; stops after a cancelled scan
    pub async fn scan(
        &self,
        roots: &[PathBuf],
        force: bool,
        cancel: CancellationToken,
        out: &mut dyn Write,
    ) -> anyhow::Result<Vec<ScanReport>> {
        let roots = self.roots(roots);
        if roots.is_empty() {
            bail!("no scan roots given (pass ROOT or set library.roots)");
        }

        let scanner = LibraryScanner::new(Arc::clone(&self.index), self.config.library.clone())
            .force_refresh(force);

        let mut reports = Vec::with_capacity(roots.len());
        for root in &roots {
            let report = scanner.scan_with_cancel(root, cancel.clone()).await?;
            writeln!(out, "{}", report.summary_text())?;
            if report.traversal_errors > 0 {
                writeln!(
                    out,
                    "  {} unreadable subtree(s) skipped; their files were kept",
                    report.traversal_errors
                )?;
            }
            let cancelled = report.status == ScanStatus::Cancelled;
            reports.push(report);
            if cancelled {
                break;
            }
        }
        Ok(reports)
    }

    /// Print duplicate groups and apply `action` to the proposed files
    /// through `remover`.
    ///
    /// Every file is re-identified first; a copy or kept file whose content
    /// changed since the last scan is skipped and counted as failed.
    pub async fn dupes(
        &self,
        policy: Option<ResolutionPolicy>,
        action: DupesAction,
        remover: &dyn FileRemover,
        out: &mut dyn Write,
    ) -> anyhow::Result<DupesOutcome> {
        let policy = policy.unwrap_or(self.config.library.policy);
        let plan = DuplicateResolver::new(policy).plan(&self.index).await?;

        if plan.is_empty() {
            writeln!(out, "No duplicates found")?;
        }
        for resolution in &plan.groups {
            writeln!(
                out,
                "{} ({} copies): {} - {}",
                resolution.group.identity.short(),
                resolution.group.len(),
                resolution.group.metadata.artist,
                resolution.group.metadata.title
            )?;
            for entry in &resolution.group.entries {
                let marker = if resolution.keep.as_ref() == Some(&entry.path) {
                    "keep"
                } else if resolution.remove.contains(&entry.path) {
                    "remove"
                } else {
                    "-"
                };
                writeln!(out, "  [{marker}] {}", entry.path.display())?;
            }
        }

        let mut removed = 0;
        let mut linked = 0;
        let mut failed = 0;
        if action != DupesAction::Report {
            for resolution in &plan.groups {
                let Some(keep) = resolution.keep.as_ref() else {
                    continue;
                };
                if resolution.remove.is_empty() {
                    continue;
                }
                let identity = resolution.group.identity;
                if !still_holds(keep, identity).await {
                    warn!(
                        keep = %keep.display(),
                        "Kept file changed since the last scan; skipping its group"
                    );
                    failed += resolution.remove.len();
                    continue;
                }

                for path in &resolution.remove {
                    if !still_holds(path, identity).await {
                        warn!(path = %path.display(), "File changed since the last scan; not touching it");
                        failed += 1;
                        continue;
                    }
                    let applied = match action {
                        DupesAction::HardLink => remover.replace_with_link(path, keep),
                        _ => remover.remove(path),
                    };
                    if let Err(e) = applied {
                        warn!(path = %path.display(), "Failed to apply plan: {}", e);
                        failed += 1;
                        continue;
                    }
                    if action == DupesAction::HardLink {
                        let stat = std::fs::metadata(path).and_then(|m| FileStat::from_metadata(&m))?;
                        self.index.touch(path, stat).await?;
                        linked += 1;
                    } else {
                        self.index.remove_path(path).await?;
                        removed += 1;
                    }
                }
            }
            if action == DupesAction::HardLink {
                writeln!(out, "Linked {linked} file(s), {failed} failed")?;
            } else {
                writeln!(out, "Removed {removed} file(s), {failed} failed")?;
            }
        } else if plan.removal_count() > 0 {
            writeln!(
                out,
                "{} file(s) would be removed under {policy}; rerun with --apply",
                plan.removal_count()
            )?;
        }

        Ok(DupesOutcome {
            plan,
            removed,
            linked,
            failed,
        })
    }

    /// Print what the index knows about `path`; returns whether it is indexed
    pub async fn show(&self, path: &Path, out: &mut dyn Write) -> anyhow::Result<bool> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let Some(entry) = self.index.lookup_by_path(&path).await? else {
            writeln!(out, "{} is not indexed", path.display())?;
            return Ok(false);
        };

        writeln!(out, "{}", path.display())?;
        writeln!(out, "  modified: {}", entry.stat.modified.to_rfc3339())?;
        writeln!(out, "  size:     {}", entry.stat.size)?;
        let Some(identity) = entry.identity else {
            writeln!(out, "  pending:  last identification failed")?;
            return Ok(true);
        };
        writeln!(out, "  identity: {identity}")?;

        if let Some(record) = self.index.lookup_by_identity(&identity).await? {
            let meta = &record.metadata;
            writeln!(out, "  format:   {}", meta.format.as_str())?;
            writeln!(out, "  title:    {}", meta.title)?;
            writeln!(out, "  artist:   {}", meta.artist)?;
            writeln!(out, "  album:    {}", meta.album)?;
            writeln!(out, "  album artist: {}", meta.album_artist)?;
            writeln!(out, "  genre:    {}", meta.genre)?;
            writeln!(out, "  year:     {}", meta.year)?;
            writeln!(out, "  track:    {}", meta.track_number)?;
            writeln!(out, "  disc:     {}", meta.disc_number)?;
            writeln!(out, "  isrc:     {}", meta.isrc)?;
            writeln!(out, "  duration: {} ms", meta.duration_ms)?;
            for other in record.paths.iter().filter(|p| **p != path) {
                writeln!(out, "  also at:  {}", other.display())?;
            }
        }
        Ok(true)
    }

    /// Print index totals and the last scan of each root
    pub async fn status(&self, roots: &[PathBuf], out: &mut dyn Write) -> anyhow::Result<()> {
        let counts = self.index.counts().await?;
        writeln!(
            out,
            "{} track(s), {} path(s), {} pending",
            counts.tracks, counts.paths, counts.pending_paths
        )?;

        for root in self.roots(roots) {
            let root = std::fs::canonicalize(&root).unwrap_or(root);
            match self.index.last_scan(&root).await? {
                Some(marker) => writeln!(
                    out,
                    "{}: {} scan(s), last {} at {}",
                    root.display(),
                    marker.scan_count,
                    marker.report.status.as_str(),
                    marker.report.finished_at.to_rfc3339()
                )?,
                None => writeln!(out, "{}: never scanned", root.display())?,
            }
        }
        Ok(())
    }
}

/// Whether `path` still holds the audio payload `identity`
async fn still_holds(path: &Path, identity: ContentId) -> bool {
    let owned = path.to_path_buf();
    let identified =
        tokio::task::spawn_blocking(move || ContentIdentifier::new().identify_file(&owned)).await;
    match identified {
        Ok(Ok(found)) => found == identity,
        Ok(Err(e)) => {
            warn!(path = %path.display(), "Cannot re-identify file: {}", e);
            false
        }
        Err(e) => {
            warn!(path = %path.display(), "Re-identification failed: {}", e);
            false
        }
    }
}
