//! Active scan registry
//!
//! Owned by [`crate::LibraryIndex`], so every scanner writing to one index
//! sees the same set of claimed roots.

use muman_core::{MumanError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Roots with a scan currently running
#[derive(Debug, Default)]
pub struct ActiveScans {
    roots: Mutex<HashSet<PathBuf>>,
}

impl ActiveScans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `root`; fails with `ScanInProgress` if it is already claimed.
    ///
    /// The claim is released when the returned guard drops.
    pub fn try_acquire(self: &Arc<Self>, root: &Path) -> Result<ScanGuard> {
        let mut roots = self.roots.lock().unwrap_or_else(PoisonError::into_inner);
        if !roots.insert(root.to_path_buf()) {
            return Err(MumanError::ScanInProgress(root.to_path_buf()));
        }
        debug!(root = %root.display(), "Scan slot acquired");
        Ok(ScanGuard {
            registry: Arc::clone(self),
            root: root.to_path_buf(),
        })
    }

    pub fn is_active(&self, root: &Path) -> bool {
        self.roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(root)
    }
}

/// Claim on one root
#[derive(Debug)]
pub struct ScanGuard {
    registry: Arc<ActiveScans>,
    root: PathBuf,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.registry
            .roots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_fails_until_release() {
        let registry = Arc::new(ActiveScans::new());
        let root = Path::new("/music");

        let guard = registry.try_acquire(root).unwrap();
        assert!(matches!(
            registry.try_acquire(root),
            Err(MumanError::ScanInProgress(_))
        ));
        assert!(registry.try_acquire(Path::new("/other")).is_ok());

        drop(guard);
        assert!(!registry.is_active(root));
        assert!(registry.try_acquire(root).is_ok());
    }
}
