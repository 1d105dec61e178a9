//! Scan outcome types
//!
//! A [`ScanReport`] is what a scan hands back to its caller; a
//! [`ScanMarker`] is the completion marker persisted per root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Traversal or processing still underway
    #[default]
    Running,
    /// Every queued file was processed and reconciliation ran
    Completed,
    /// Cancelled between file boundaries; reconciliation was skipped
    Cancelled,
}

impl ScanStatus {
    /// Convert to string for database storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Counts reported by a finished scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Root that was scanned
    #[serde(with = "crate::types::path_codec")]
    pub root: PathBuf,

    /// Terminal status
    pub status: ScanStatus,

    /// Audio files seen during traversal
    pub discovered: u64,

    /// New paths indexed
    pub added: u64,

    /// Known paths whose content or stat changed
    pub updated: u64,

    /// Paths re-pointed by rename detection
    pub moved: u64,

    /// Paths dropped because the file disappeared
    pub removed: u64,

    /// Known paths skipped because their stat was unchanged
    pub unchanged: u64,

    /// Files skipped because extraction or identification failed
    pub errored: u64,

    /// Subtrees skipped because they could not be read
    pub traversal_errors: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    /// Empty report for a scan starting now
    pub fn started(root: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            root: root.into(),
            status: ScanStatus::Running,
            discovered: 0,
            added: 0,
            updated: 0,
            moved: 0,
            removed: 0,
            unchanged: 0,
            errored: 0,
            traversal_errors: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// No file or subtree was skipped. Independent of `status`.
    pub fn is_clean(&self) -> bool {
        self.errored == 0 && self.traversal_errors == 0
    }

    /// Whether the scan mutated the index
    pub fn has_changes(&self) -> bool {
        self.added + self.updated + self.moved + self.removed > 0
    }

    pub fn summary_text(&self) -> String {
        format!(
            "Scan {} for {}: {} added, {} updated, {} moved, {} removed, {} unchanged, {} errored",
            self.status.as_str(),
            self.root.display(),
            self.added,
            self.updated,
            self.moved,
            self.removed,
            self.unchanged,
            self.errored + self.traversal_errors
        )
    }
}

/// Persisted completion marker of the latest scan of a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMarker {
    /// Report of the latest scan
    pub report: ScanReport,

    /// Number of scans of this root recorded so far, including this one
    pub scan_count: u64,
}
