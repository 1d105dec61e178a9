//! Duplicate resolution
//!
//! Turns duplicate groups into a [`RemovalPlan`]. Nothing here touches the
//! filesystem or the index; applying a plan is the caller's business.

use futures_util::TryStreamExt;
use muman_core::{DuplicateGroup, GroupResolution, PathEntry, RemovalPlan, ResolutionPolicy};
use muman_storage::LibraryIndex;
use std::cmp::{Ordering, Reverse};
use tracing::debug;

/// Applies one [`ResolutionPolicy`] to duplicate groups
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver {
    policy: ResolutionPolicy,
}

impl DuplicateResolver {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    /// Pick the canonical path of `group` and propose the rest for removal.
    ///
    /// Ties break on lexicographic path order, so the result does not depend
    /// on the order of `group.entries`.
    pub fn resolve(&self, group: DuplicateGroup) -> GroupResolution {
        let keep = match self.policy {
            ResolutionPolicy::ReportOnly => None,
            ResolutionPolicy::KeepNewestPath => group
                .entries
                .iter()
                .min_by(|a, b| newest_first(a, b))
                .map(|entry| entry.path.clone()),
            ResolutionPolicy::KeepShortestPath => group
                .entries
                .iter()
                .min_by(|a, b| shortest_first(a, b))
                .map(|entry| entry.path.clone()),
        };

        let mut remove: Vec<_> = match keep {
            Some(ref kept) => group
                .entries
                .iter()
                .filter(|entry| entry.path != *kept)
                .map(|entry| entry.path.clone())
                .collect(),
            None => Vec::new(),
        };
        remove.sort();

        GroupResolution { group, keep, remove }
    }

    /// Resolve every duplicate group currently in `index`
    pub async fn plan(&self, index: &LibraryIndex) -> muman_core::Result<RemovalPlan> {
        let groups: Vec<GroupResolution> = index
            .duplicate_groups()
            .map_ok(|group| self.resolve(group))
            .try_collect()
            .await?;

        let plan = RemovalPlan {
            policy: self.policy,
            groups,
        };
        debug!(
            policy = %self.policy,
            groups = plan.groups.len(),
            removals = plan.removal_count(),
            "Built removal plan"
        );
        Ok(plan)
    }
}

fn newest_first(a: &PathEntry, b: &PathEntry) -> Ordering {
    (Reverse(a.stat.modified), &a.path).cmp(&(Reverse(b.stat.modified), &b.path))
}

fn shortest_first(a: &PathEntry, b: &PathEntry) -> Ordering {
    (path_len(a), &a.path).cmp(&(path_len(b), &b.path))
}

fn path_len(entry: &PathEntry) -> usize {
    entry.path.to_string_lossy().chars().count()
}
