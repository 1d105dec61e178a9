/// Extraction-specific errors
use lofty::error::{ErrorKind, LoftyError};
use thiserror::Error;

/// Result type alias using `ExtractError`
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Per-file extraction and identification errors
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Container not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container recognized but internally inconsistent
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// The stream could not be fully consumed
    #[error("Read error: {0}")]
    Read(#[from] std::io::Error),
}

impl From<LoftyError> for ExtractError {
    fn from(err: LoftyError) -> Self {
        match err.kind() {
            ErrorKind::UnknownFormat => Self::UnsupportedFormat(err.to_string()),
            ErrorKind::Io(io) => Self::Read(std::io::Error::new(io.kind(), err.to_string())),
            _ => Self::CorruptData(err.to_string()),
        }
    }
}

impl From<ExtractError> for muman_core::MumanError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFormat(msg) => Self::UnsupportedFormat(msg),
            ExtractError::CorruptData(msg) => Self::CorruptData(msg),
            ExtractError::Read(io) => Self::ReadError(io),
        }
    }
}
