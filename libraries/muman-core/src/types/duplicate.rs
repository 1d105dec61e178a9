//! Duplicate groups and removal plans
use crate::error::MumanError;
use crate::types::{ContentId, PathEntry, TrackMetadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Derived view: one identity with more than one path. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub identity: ContentId,
    pub metadata: TrackMetadata,
    /// Sorted by path
    pub entries: Vec<PathEntry>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.iter().map(|e| &e.path)
    }
}

/// How the duplicate resolver picks the canonical path of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPolicy {
    /// Keep the most recently modified file
    KeepNewestPath,
    /// Keep the file with the shortest path
    KeepShortestPath,
    /// Select nothing, propose nothing
    #[default]
    ReportOnly,
}

impl ResolutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepNewestPath => "keep-newest-path",
            Self::KeepShortestPath => "keep-shortest-path",
            Self::ReportOnly => "report-only",
        }
    }
}

impl fmt::Display for ResolutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionPolicy {
    type Err = MumanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "keep-newest-path" => Ok(Self::KeepNewestPath),
            "keep-shortest-path" => Ok(Self::KeepShortestPath),
            "report-only" => Ok(Self::ReportOnly),
            other => Err(MumanError::invalid_input(format!(
                "unknown resolution policy {other:?} \
                 (expected keep-newest-path, keep-shortest-path or report-only)"
            ))),
        }
    }
}

/// Resolver output for one duplicate group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResolution {
    pub group: DuplicateGroup,
    /// Canonical path; `None` under `report-only`
    pub keep: Option<PathBuf>,
    /// Paths proposed for removal; empty under `report-only`
    pub remove: Vec<PathBuf>,
}

/// Removal proposal handed to an external remover. Nothing here deletes files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalPlan {
    pub policy: ResolutionPolicy,
    pub groups: Vec<GroupResolution>,
}

impl RemovalPlan {
    /// Every path proposed for removal, in group order
    pub fn removals(&self) -> impl Iterator<Item = &PathBuf> {
        self.groups.iter().flat_map(|g| g.remove.iter())
    }

    pub fn removal_count(&self) -> usize {
        self.groups.iter().map(|g| g.remove.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_parses_kebab_case() {
        assert_eq!(
            "keep-newest-path".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::KeepNewestPath
        );
        assert_eq!(
            "keep-shortest-path".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::KeepShortestPath
        );
        assert_eq!(
            "report-only".parse::<ResolutionPolicy>().unwrap(),
            ResolutionPolicy::ReportOnly
        );
        assert!("keep-everything".parse::<ResolutionPolicy>().is_err());
    }

    #[test]
    fn policy_serde_matches_display() {
        let json = serde_json::to_string(&ResolutionPolicy::KeepShortestPath).unwrap();
        assert_eq!(json, "\"keep-shortest-path\"");
    }

    #[test]
    fn default_policy_never_proposes_removal() {
        assert_eq!(ResolutionPolicy::default(), ResolutionPolicy::ReportOnly);
    }
}
