//! Audio file discovery
//!
//! [`AudioWalker`] is a lazy, finite traversal of one root. Every call to
//! [`AudioWalker::walk`] starts a fresh walk, so the same walker can be
//! iterated any number of times.

use muman_core::{FileStat, LibraryConfig, MumanError};
use muman_metadata::Container;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// An audio file found by the walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub stat: FileStat,
}

/// Walks a directory tree and yields audio files
#[derive(Debug, Clone)]
pub struct AudioWalker {
    root: PathBuf,
    extensions: Vec<String>,
    follow_links: bool,
    max_depth: Option<usize>,
    sniff_unlisted: bool,
}

impl AudioWalker {
    /// Walker over `root` with the default extension allow-list
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(root, &LibraryConfig::default())
    }

    /// Walker over `root` honoring the config's allow-list, symlink and depth
    /// settings
    pub fn from_config(root: impl Into<PathBuf>, config: &LibraryConfig) -> Self {
        Self {
            root: root.into(),
            extensions: config.extensions.clone(),
            follow_links: config.follow_links,
            max_depth: config.max_depth,
            sniff_unlisted: true,
        }
    }

    /// Set whether to follow symbolic links
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Set maximum directory depth to traverse
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set whether files outside the allow-list are sniffed for a known
    /// container (default: true)
    pub fn sniff_unlisted(mut self, sniff: bool) -> Self {
        self.sniff_unlisted = sniff;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new traversal.
    ///
    /// Yields audio files and traversal errors. An unreadable directory
    /// yields one `MumanError::Io` naming it and is not descended into.
    pub fn walk(&self) -> impl Iterator<Item = Result<AudioFile, MumanError>> + '_ {
        let mut walker = WalkDir::new(&self.root)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        walker.into_iter().filter_map(move |entry| match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    return None;
                }
                let path = entry.path();
                if !self.is_audio(path) {
                    trace!(path = %path.display(), "Skipping non-audio file");
                    return None;
                }
                let stat = entry
                    .metadata()
                    .map_err(|e| walk_error(path, e))
                    .and_then(|meta| {
                        FileStat::from_metadata(&meta).map_err(|e| MumanError::io(path, e))
                    });
                Some(stat.map(|stat| AudioFile {
                    path: path.to_path_buf(),
                    stat,
                }))
            }
            Err(err) => {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                Some(Err(walk_error(&path, err)))
            }
        })
    }

    /// Allow-listed extension, or (when enabled) a sniffable container
    pub fn is_audio(&self, path: &Path) -> bool {
        let listed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            });
        listed || (self.sniff_unlisted && sniff_file(path).unwrap_or(false))
    }
}

impl<'a> IntoIterator for &'a AudioWalker {
    type Item = Result<AudioFile, MumanError>;
    type IntoIter = Box<dyn Iterator<Item = Self::Item> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.walk())
    }
}

fn walk_error(path: &Path, err: walkdir::Error) -> MumanError {
    let message = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other(message));
    MumanError::io(path, source)
}

/// Whether the first bytes of the file look like a known audio container
fn sniff_file(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 12];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let header = &header[..filled];
    Ok(header.starts_with(b"ID3") || Container::sniff(header) != Container::Unknown)
}
