//! Muman command-line driver
//!
//! Thin front end over the scanner and resolver: configuration loading,
//! subcommand output and the filesystem remover used by `dupes --apply`
//! (deleting copies, or hard-linking them to the kept file).

#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod error;
pub mod remover;

pub use commands::{App, DupesAction, DupesOutcome};
pub use config::MumanConfig;
pub use error::{CliError, Result};
pub use remover::FsRemover;
