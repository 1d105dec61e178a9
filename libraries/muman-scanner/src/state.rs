//! Per-scan mutable state
use chrono::Utc;
use muman_core::{ScanReport, ScanStatus};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// What happened to one discovered file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// New path indexed
    Added,
    /// Known path re-identified or re-extracted
    Updated,
    /// New path matched a vanished one with the same identity
    Moved,
    /// Known path with unchanged stat
    Unchanged,
    /// Identification or extraction failed; file skipped
    Errored,
}

/// State of one scan, owned by the scan's coordinator for its whole run
#[derive(Debug)]
pub struct ScanState {
    report: ScanReport,
    visited: HashSet<PathBuf>,
    failed_subtrees: Vec<PathBuf>,
    removed: BTreeSet<PathBuf>,
}

impl ScanState {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            report: ScanReport::started(root),
            visited: HashSet::new(),
            failed_subtrees: Vec::new(),
            removed: BTreeSet::new(),
        }
    }

    /// Record a discovered audio file
    pub fn visit(&mut self, path: PathBuf) {
        if self.visited.insert(path) {
            self.report.discovered += 1;
        }
    }

    pub fn is_visited(&self, path: &Path) -> bool {
        self.visited.contains(path)
    }

    /// Count the outcome of one processed file
    pub fn record(&mut self, action: FileAction) {
        let counter = match action {
            FileAction::Added => &mut self.report.added,
            FileAction::Updated => &mut self.report.updated,
            FileAction::Moved => &mut self.report.moved,
            FileAction::Unchanged => &mut self.report.unchanged,
            FileAction::Errored => &mut self.report.errored,
        };
        *counter += 1;
    }

    /// Record an unreadable subtree; its indexed paths are kept
    pub fn record_traversal_error(&mut self, path: PathBuf) {
        self.report.traversal_errors += 1;
        self.failed_subtrees.push(path);
    }

    /// Whether `path` lies below a subtree that could not be read
    pub fn in_failed_subtree(&self, path: &Path) -> bool {
        self.failed_subtrees
            .iter()
            .any(|subtree| path.starts_with(subtree))
    }

    /// Whether a previously indexed path should be dropped at reconciliation
    pub fn is_stale(&self, path: &Path) -> bool {
        !self.is_visited(path) && !self.in_failed_subtree(path)
    }

    /// Record a path dropped from the index at reconciliation
    pub fn record_removed(&mut self, path: PathBuf) {
        if self.removed.insert(path) {
            self.report.removed += 1;
        }
    }

    /// Paths removed by this scan so far
    pub fn removed(&self) -> &BTreeSet<PathBuf> {
        &self.removed
    }

    /// Counters so far
    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    /// Close the scan with `status`
    pub fn finish(mut self, status: ScanStatus) -> ScanReport {
        self.report.status = status;
        self.report.finished_at = Utc::now();
        self.report
    }
}
