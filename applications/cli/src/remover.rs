//! Filesystem side of applying a removal plan
use muman_core::{FileRemover, LibraryConfig, MumanError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Deletes files, then the parent directory once it holds no audio files.
/// Can instead replace a copy with a hard link to the kept file.
#[derive(Debug, Clone)]
pub struct FsRemover {
    config: LibraryConfig,
}

impl FsRemover {
    pub fn new(config: LibraryConfig) -> Self {
        Self { config }
    }

    fn cleanup_dir(&self, dir: &Path) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let has_audio = entries
            .filter_map(Result::ok)
            .any(|entry| self.config.is_audio_extension(&entry.path()));
        if has_audio {
            return;
        }
        // Fails, and is left alone, while other files remain
        match std::fs::remove_dir(dir) {
            Ok(()) => debug!(dir = %dir.display(), "Removed empty directory"),
            Err(e) => debug!(dir = %dir.display(), "Keeping directory: {}", e),
        }
    }
}

impl FileRemover for FsRemover {
    fn remove(&self, path: &Path) -> muman_core::Result<()> {
        std::fs::remove_file(path).map_err(|e| MumanError::io(path, e))?;
        info!(path = %path.display(), "Removed file");
        if let Some(parent) = path.parent() {
            self.cleanup_dir(parent);
        }
        Ok(())
    }

    fn replace_with_link(&self, path: &Path, keep: &Path) -> muman_core::Result<()> {
        if same_file(path, keep).map_err(|e| MumanError::io(path, e))? {
            debug!(path = %path.display(), "Already linked");
            return Ok(());
        }

        // Link beside the copy first, then rename over it, so `path` never
        // goes missing
        let staging = staging_path(path);
        std::fs::hard_link(keep, &staging).map_err(|e| MumanError::io(&staging, e))?;
        if let Err(e) = std::fs::rename(&staging, path) {
            let _ = std::fs::remove_file(&staging);
            return Err(MumanError::io(path, e));
        }
        info!(path = %path.display(), keep = %keep.display(), "Replaced copy with hard link");
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".muman-link");
    path.with_file_name(name)
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (std::fs::metadata(a)?, std::fs::metadata(b)?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> std::io::Result<bool> {
    std::fs::metadata(a)?;
    Ok(std::fs::canonicalize(a)? == std::fs::canonicalize(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_file_and_emptied_directory() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        let track = album.join("01.mp3");
        std::fs::write(&track, b"x").unwrap();

        FsRemover::new(LibraryConfig::default()).remove(&track).unwrap();
        assert!(!track.exists());
        assert!(!album.exists());
    }

    #[test]
    fn keeps_directory_with_remaining_audio() {
        let dir = tempfile::tempdir().unwrap();
        let track = dir.path().join("01.mp3");
        let other = dir.path().join("02.flac");
        std::fs::write(&track, b"x").unwrap();
        std::fs::write(&other, b"y").unwrap();

        FsRemover::new(LibraryConfig::default()).remove(&track).unwrap();
        assert!(other.exists());
    }

    #[test]
    fn keeps_directory_with_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let album = dir.path().join("album");
        std::fs::create_dir(&album).unwrap();
        let track = album.join("01.mp3");
        std::fs::write(&track, b"x").unwrap();
        std::fs::write(album.join("cover.jpg"), b"jpg").unwrap();

        FsRemover::new(LibraryConfig::default()).remove(&track).unwrap();
        assert!(album.join("cover.jpg").exists());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FsRemover::new(LibraryConfig::default())
            .remove(&dir.path().join("gone.mp3"))
            .unwrap_err();
        assert!(matches!(err, MumanError::Io { .. }));
    }

    #[test]
    fn hard_link_replaces_copy_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("a.mp3");
        let copy = dir.path().join("copies/a.mp3");
        std::fs::create_dir(dir.path().join("copies")).unwrap();
        std::fs::write(&keep, b"audio").unwrap();
        std::fs::write(&copy, b"audio").unwrap();

        let remover = FsRemover::new(LibraryConfig::default());
        remover.replace_with_link(&copy, &keep).unwrap();
        assert!(same_file(&copy, &keep).unwrap());
        assert!(!staging_path(&copy).exists());

        // Linking again is a no-op
        remover.replace_with_link(&copy, &keep).unwrap();
        assert_eq!(std::fs::read(&copy).unwrap(), b"audio");
    }

    #[test]
    fn hard_link_to_missing_file_fails_and_keeps_copy() {
        let dir = tempfile::tempdir().unwrap();
        let copy = dir.path().join("b.mp3");
        std::fs::write(&copy, b"audio").unwrap();

        let err = FsRemover::new(LibraryConfig::default())
            .replace_with_link(&copy, &dir.path().join("gone.mp3"))
            .unwrap_err();
        assert!(matches!(err, MumanError::Io { .. }));
        assert!(copy.exists());
    }
}
