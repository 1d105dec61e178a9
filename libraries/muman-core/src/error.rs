/// Core error types for Muman
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using `MumanError`
pub type Result<T> = std::result::Result<T, MumanError>;

/// Core error type for Muman
#[derive(Error, Debug)]
pub enum MumanError {
    /// Container not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container recognized but internally inconsistent
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// The byte stream could not be fully consumed
    #[error("Read error: {0}")]
    ReadError(#[source] std::io::Error),

    /// Persisted index violates its structural invariants
    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    /// A scan of this root is already running
    #[error("Scan already in progress for {}", .0.display())]
    ScanInProgress(PathBuf),

    /// Filesystem traversal error scoped to a subtree
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// External metadata lookup errors
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl MumanError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create an index corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::IndexCorruption(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a subtree-scoped I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Per-file errors are counted and skipped; they never abort a scan.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::CorruptData(_) | Self::ReadError(_)
        )
    }

    /// Whether the caller may retry or continue after this error.
    pub fn is_recoverable(&self) -> bool {
        self.is_per_file()
            || matches!(self, Self::ScanInProgress(_) | Self::Io { .. } | Self::Lookup(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_file_errors_are_recoverable() {
        let err = MumanError::CorruptData("bad frame".to_string());
        assert!(err.is_per_file());
        assert!(err.is_recoverable());
    }

    #[test]
    fn corruption_is_fatal() {
        let err = MumanError::corruption("dangling path");
        assert!(!err.is_per_file());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn scan_in_progress_names_root() {
        let err = MumanError::ScanInProgress(PathBuf::from("/music"));
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Scan already in progress for /music");
    }
}
