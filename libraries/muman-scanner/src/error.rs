//! Error types for the scanner

use muman_core::MumanError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `ScanError`
pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Another scan of this root is running
    #[error("Scan already in progress for {}", .0.display())]
    InProgress(PathBuf),

    /// The root does not exist or is not a directory
    #[error("Invalid scan root {}: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },

    /// Index-level failure; aborts the scan
    #[error("Index error: {0}")]
    Index(MumanError),

    /// A scan task panicked or was aborted
    #[error("Scan worker failed: {0}")]
    Worker(String),
}

impl ScanError {
    pub fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<MumanError> for ScanError {
    fn from(err: MumanError) -> Self {
        match err {
            MumanError::ScanInProgress(root) => Self::InProgress(root),
            other => Self::Index(other),
        }
    }
}

impl From<tokio::task::JoinError> for ScanError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

impl From<ScanError> for MumanError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::InProgress(root) => MumanError::ScanInProgress(root),
            ScanError::InvalidRoot { path, reason } => {
                MumanError::invalid_input(format!("{}: {reason}", path.display()))
            }
            ScanError::Index(inner) => inner,
            ScanError::Worker(msg) => MumanError::storage(msg),
        }
    }
}
