/// Configuration surface consumed by the indexing engine
use crate::types::ResolutionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Library configuration, supplied by whichever front end drives the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Directories to scan
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Duplicate resolution policy
    #[serde(default)]
    pub policy: ResolutionPolicy,

    /// Number of parallel workers per scan (default: num_cpus)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Audio file extension allow-list, lowercase without dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Whether traversal follows symbolic links
    #[serde(default)]
    pub follow_links: bool,

    /// Maximum traversal depth below each root
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Bound on one external metadata lookup, in milliseconds
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

fn default_workers() -> usize {
    num_cpus::get().max(1)
}

fn default_lookup_timeout_ms() -> u64 {
    10_000
}

fn default_extensions() -> Vec<String> {
    ["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"]
        .iter()
        .map(|ext| (*ext).to_string())
        .collect()
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            policy: ResolutionPolicy::default(),
            workers: default_workers(),
            extensions: default_extensions(),
            follow_links: false,
            max_depth: None,
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl LibraryConfig {
    /// Whether `path` carries an allow-listed extension (case-insensitive)
    pub fn is_audio_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Worker count clamped to at least one
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}
