/// Index records: tracks keyed by content identity, paths keyed by location
use crate::types::{ContentId, TrackMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Observed modification time and size of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Last modification time
    pub modified: DateTime<Utc>,

    /// Size in bytes
    pub size: u64,
}

impl FileStat {
    pub fn new(modified: DateTime<Utc>, size: u64) -> Self {
        Self { modified, size }
    }

    /// Build from filesystem metadata
    pub fn from_metadata(meta: &std::fs::Metadata) -> std::io::Result<Self> {
        Ok(Self {
            modified: DateTime::<Utc>::from(meta.modified()?),
            size: meta.len(),
        })
    }
}

/// A file location and the identity it currently resolves to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    /// Absolute path of the file
    #[serde(with = "crate::types::path_codec")]
    pub path: PathBuf,

    /// Stat observed when the entry was last written
    pub stat: FileStat,

    /// Resolved identity; `None` while pending
    pub identity: Option<ContentId>,
}

impl PathEntry {
    /// Entry resolving to `identity`
    pub fn resolved(path: impl Into<PathBuf>, stat: FileStat, identity: ContentId) -> Self {
        Self {
            path: path.into(),
            stat,
            identity: Some(identity),
        }
    }

    /// Entry not yet identified
    pub fn pending(path: impl Into<PathBuf>, stat: FileStat) -> Self {
        Self {
            path: path.into(),
            stat,
            identity: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.identity.is_none()
    }

    /// True when the file must be identified again: it is pending or its
    /// stat differs from the one recorded.
    pub fn needs_refresh(&self, current: &FileStat) -> bool {
        self.is_pending() || self.stat != *current
    }
}

/// Canonical metadata plus every path sharing one content identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Immutable after creation
    pub identity: ContentId,

    /// Latest metadata snapshot
    pub metadata: TrackMetadata,

    /// Paths currently resolving to `identity`
    #[serde(with = "crate::types::path_codec::set")]
    pub paths: BTreeSet<PathBuf>,

    /// When a scan last confirmed one of the paths
    pub last_verified: DateTime<Utc>,
}

impl TrackRecord {
    pub fn new(identity: ContentId, metadata: TrackMetadata, path: impl Into<PathBuf>) -> Self {
        let mut paths = BTreeSet::new();
        paths.insert(path.into());
        Self {
            identity,
            metadata,
            paths,
            last_verified: Utc::now(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// More than one path shares this identity
    pub fn is_duplicated(&self) -> bool {
        self.paths.len() > 1
    }
}
