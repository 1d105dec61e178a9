//! Reconciliation scenarios against real files on disk


use async_trait::async_trait;
use futures_util::TryStreamExt;
use muman_core::{
    ContentId, Field, LibraryConfig, MetadataExtractor, MetadataLookup, ReadSeek,
    ResolutionPolicy, ScanReport, ScanStatus, TrackMetadata,
};
use muman_metadata::test_utils::{flac, mp3, mpeg_frames, pcm_samples, set_mtime, wav};
use muman_metadata::LoftyExtractor;
use muman_scanner::{DuplicateResolver, LibraryScanner, ScanError};
use muman_storage::LibraryIndex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use test_helpers::{config, CountingExtractor, Library};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn rescanning_unchanged_directory_changes_nothing() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(4, 1), &[("TIT2", "One")]));
    lib.write("albums/b.flac", &flac(&mpeg_frames(4, 2), &[("TITLE", "Two")]));
    lib.write("c.wav", &wav(&pcm_samples(800, 3), &[]));
    let scanner = lib.scanner();

    let first = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(first.status, ScanStatus::Completed);
    assert_eq!(first.discovered, 3);
    assert_eq!(first.added, 3);
    assert!(first.is_clean());

    let tracks = lib.index.store().all_tracks().await.unwrap();
    let paths = lib.index.store().all_paths().await.unwrap();

    let second = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.removed, 0);
    assert_eq!(second.unchanged, 3);
    assert!(!second.has_changes());

    assert_eq!(lib.index.store().all_tracks().await.unwrap(), tracks);
    assert_eq!(lib.index.store().all_paths().await.unwrap(), paths);
}

#[tokio::test]
async fn same_audio_with_different_tags_forms_one_group() {
    let lib = Library::new();
    let audio = mpeg_frames(6, 9);
    lib.write("a.mp3", &mp3(&audio, &[("TIT2", "Take Five")]));
    lib.write("b.flac", &flac(&audio, &[("TITLE", "Take 5"), ("ARTIST", "Brubeck")]));

    let report = lib.scanner().scan(lib.root()).await.unwrap();
    assert_eq!(report.added, 2);

    let counts = lib.index.counts().await.unwrap();
    assert_eq!(counts.tracks, 1);
    assert_eq!(counts.paths, 2);

    let groups: Vec<_> = lib.index.duplicate_groups().try_collect().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}

#[tokio::test]
async fn retagging_keeps_identity_and_group() {
    let lib = Library::new();
    let audio = mpeg_frames(6, 4);
    lib.write("a.mp3", &mp3(&audio, &[("TIT2", "Old")]));
    lib.write("b.flac", &flac(&audio, &[]));
    let scanner = lib.scanner();
    scanner.scan(lib.root()).await.unwrap();
    let before = lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().unwrap();

    lib.write(
        "a.mp3",
        &mp3(&audio, &[("TIT2", "A much longer replacement title")]),
    );
    let report = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);

    let after = lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().unwrap();
    assert_eq!(before.identity, after.identity);

    let record = lib
        .index
        .lookup_by_identity(&after.identity.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.paths.len(), 2);
    assert_eq!(
        record.metadata.title,
        Field::Known("A much longer replacement title".to_string())
    );
}

#[tokio::test]
async fn touched_file_is_re_read_under_same_identity() {
    let lib = Library::new();
    let path = lib.write("a.mp3", &mp3(&mpeg_frames(3, 2), &[("TIT2", "Blue")]));
    let scanner = lib.scanner();
    scanner.scan(lib.root()).await.unwrap();
    let before = lib.index.lookup_by_path(&path).await.unwrap().unwrap();

    set_mtime(&path, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000)).unwrap();
    let report = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.added, 0);

    let after = lib.index.lookup_by_path(&path).await.unwrap().unwrap();
    assert_eq!(after.identity, before.identity);
    assert_ne!(after.stat, before.stat);
    assert_eq!(lib.index.counts().await.unwrap().tracks, 1);
}

#[tokio::test]
async fn renamed_file_is_moved_without_extraction() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(5, 7), &[("TIT2", "So What")]));
    let extractor = Arc::new(CountingExtractor::default());
    let scanner = lib.scanner().with_extractor(extractor.clone());

    scanner.scan(lib.root()).await.unwrap();
    assert_eq!(extractor.calls(), 1);
    let original = lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().unwrap();

    std::fs::create_dir_all(lib.path("sorted")).unwrap();
    std::fs::rename(lib.path("a.mp3"), lib.path("sorted/so-what.mp3")).unwrap();

    let report = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(report.moved, 1);
    assert_eq!(report.added, 0);
    assert_eq!(report.removed, 0);
    assert_eq!(extractor.calls(), 1);

    assert!(lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().is_none());
    let moved = lib
        .index
        .lookup_by_path(&lib.path("sorted/so-what.mp3"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.identity, original.identity);

    let counts = lib.index.counts().await.unwrap();
    assert_eq!(counts.tracks, 1);
    assert_eq!(counts.paths, 1);
}

#[tokio::test]
async fn deleted_files_are_removed_with_their_records() {
    let lib = Library::new();
    for seed in 0..4u8 {
        lib.write(&format!("t{seed}.mp3"), &mp3(&mpeg_frames(3, seed), &[]));
    }
    let scanner = lib.scanner();
    scanner.scan(lib.root()).await.unwrap();

    lib.remove("t1.mp3");
    lib.remove("t3.mp3");
    let report = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(report.unchanged, 2);

    let counts = lib.index.counts().await.unwrap();
    assert_eq!(counts.paths, 2);
    assert_eq!(counts.tracks, 2);
    assert!(lib.index.lookup_by_path(&lib.path("t1.mp3")).await.unwrap().is_none());
}

#[tokio::test]
async fn corrupt_file_is_counted_and_skipped() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(3, 1), &[]));
    lib.write("c.mp3", b"this is not an mpeg stream at all");

    let report = lib.scanner().scan(lib.root()).await.unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.added, 1);
    assert_eq!(report.errored, 1);
    assert!(!report.is_clean());
    assert!(lib.index.lookup_by_path(&lib.path("c.mp3")).await.unwrap().is_none());
}

#[tokio::test]
async fn oversized_mp4_atom_does_not_abort_scan() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(3, 1), &[]));
    let mut bad = Vec::new();
    bad.extend(16u32.to_be_bytes());
    bad.extend(b"ftypM4A \0\0\0\0");
    bad.extend(1u32.to_be_bytes());
    bad.extend(b"mdat");
    bad.extend(u64::MAX.to_be_bytes());
    bad.extend([0u8; 64]);
    lib.write("bad.m4a", &bad);

    let report = lib.scanner().scan(lib.root()).await.unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.discovered, 2);
    assert_eq!(report.added + report.errored, 2);
    assert!(lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().is_some());
}

/// Extractor that panics on one file name
struct Panicking;

impl MetadataExtractor for Panicking {
    fn extract(&self, path: &Path, reader: &mut dyn ReadSeek) -> muman_core::Result<TrackMetadata> {
        if path.ends_with("boom.mp3") {
            panic!("extractor blew up");
        }
        LoftyExtractor::new().extract(path, reader)
    }
}

#[tokio::test]
async fn panicking_reader_only_fails_its_file() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(3, 1), &[]));
    lib.write("boom.mp3", &mp3(&mpeg_frames(3, 2), &[]));

    let report = lib
        .scanner()
        .with_extractor(Arc::new(Panicking))
        .scan(lib.root())
        .await
        .unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.added, 1);
    assert_eq!(report.errored, 1);
    assert!(lib.index.lookup_by_path(&lib.path("boom.mp3")).await.unwrap().is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_subtree_keeps_its_entries() {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;

    let lib = Library::new();
    lib.write("open.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    lib.write("locked/a.mp3", &mp3(&mpeg_frames(2, 2), &[]));
    let scanner = lib.scanner();
    assert_eq!(scanner.scan(lib.root()).await.unwrap().added, 2);

    let locked = lib.path("locked");
    std::fs::set_permissions(&locked, Permissions::from_mode(0o000)).unwrap();
    if std::fs::read_dir(&locked).is_ok() {
        // Permission bits are not enforced for a privileged user
        std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let report = scanner.scan(lib.root()).await;
    std::fs::set_permissions(&locked, Permissions::from_mode(0o755)).unwrap();
    let report = report.unwrap();

    assert_eq!(report.traversal_errors, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(report.unchanged, 1);
    assert!(lib
        .index
        .lookup_by_path(&lib.path("locked/a.mp3"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn file_that_turns_corrupt_is_left_pending() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(3, 1), &[]));
    let scanner = lib.scanner();
    scanner.scan(lib.root()).await.unwrap();

    lib.write("a.mp3", b"overwritten by something that is not audio");
    let report = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(report.errored, 1);
    assert_eq!(report.removed, 0);

    let entry = lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().unwrap();
    assert!(entry.is_pending());
    let counts = lib.index.counts().await.unwrap();
    assert_eq!(counts.tracks, 0);
    assert_eq!(counts.pending_paths, 1);
}

#[tokio::test]
async fn second_scan_of_same_root_is_rejected() {
    let lib = Library::new();
    for seed in 0..3u8 {
        lib.write(&format!("t{seed}.mp3"), &mp3(&mpeg_frames(2, seed), &[]));
    }
    let extractor = Arc::new(CountingExtractor::slow(Duration::from_millis(200)));
    let scanner = Arc::new(lib.scanner().with_extractor(extractor));

    let running = {
        let scanner = Arc::clone(&scanner);
        let root = lib.root().to_path_buf();
        tokio::spawn(async move { scanner.scan(&root).await })
    };

    for _ in 0..400 {
        if scanner.is_scanning(lib.root()).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(scanner.is_scanning(lib.root()).await);

    let err = scanner.scan(lib.root()).await.unwrap_err();
    assert!(matches!(err, ScanError::InProgress(_)));

    let report = running.await.unwrap().unwrap();
    assert_eq!(report.added, 3);
    assert!(!scanner.is_scanning(lib.root()).await);
}

#[tokio::test]
async fn independent_scanners_share_the_root_claim() {
    let lib = Library::new();
    for seed in 0..3u8 {
        lib.write(&format!("t{seed}.mp3"), &mp3(&mpeg_frames(2, seed), &[]));
    }
    let slow = lib
        .scanner()
        .with_extractor(Arc::new(CountingExtractor::slow(Duration::from_millis(200))));
    let other = LibraryScanner::new(Arc::clone(&lib.index), config());

    let running = {
        let root = lib.root().to_path_buf();
        tokio::spawn(async move { slow.scan(&root).await })
    };
    for _ in 0..400 {
        if other.is_scanning(lib.root()).await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(other.is_scanning(lib.root()).await);

    let err = other.scan(lib.root()).await.unwrap_err();
    assert!(matches!(err, ScanError::InProgress(_)));

    assert_eq!(running.await.unwrap().unwrap().added, 3);
    assert_eq!(other.scan(lib.root()).await.unwrap().unchanged, 3);
}

#[tokio::test]
async fn cancelled_scan_skips_removal() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    lib.write("b.mp3", &mp3(&mpeg_frames(2, 2), &[]));
    let scanner = lib.scanner();
    scanner.scan(lib.root()).await.unwrap();

    lib.remove("b.mp3");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = scanner.scan_with_cancel(lib.root(), cancel).await.unwrap();

    assert_eq!(report.status, ScanStatus::Cancelled);
    assert_eq!(report.removed, 0);
    assert!(lib.index.lookup_by_path(&lib.path("b.mp3")).await.unwrap().is_some());

    let marker = lib.index.last_scan(lib.root()).await.unwrap().unwrap();
    assert_eq!(marker.scan_count, 2);
    assert_eq!(marker.report.status, ScanStatus::Cancelled);
}

#[tokio::test]
async fn force_refresh_re_extracts_unchanged_files() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    let extractor = Arc::new(CountingExtractor::default());

    lib.scanner()
        .with_extractor(extractor.clone())
        .scan(lib.root())
        .await
        .unwrap();
    let report = lib
        .scanner()
        .with_extractor(extractor.clone())
        .force_refresh(true)
        .scan(lib.root())
        .await
        .unwrap();

    assert_eq!(extractor.calls(), 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 0);
}

struct Catalogue;

#[async_trait]
impl MetadataLookup for Catalogue {
    async fn lookup(
        &self,
        _identity: &ContentId,
        local: &TrackMetadata,
    ) -> muman_core::Result<Option<TrackMetadata>> {
        let mut remote = TrackMetadata::unknown(local.format);
        remote.title = Field::Known("Catalogue title".to_string());
        remote.artist = Field::Known("Catalogue artist".to_string());
        Ok(Some(remote))
    }
}

struct Stalled;

#[async_trait]
impl MetadataLookup for Stalled {
    async fn lookup(
        &self,
        _identity: &ContentId,
        _local: &TrackMetadata,
    ) -> muman_core::Result<Option<TrackMetadata>> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn stalled_lookup_does_not_block_indexing() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    lib.write("b.mp3", &mp3(&mpeg_frames(2, 2), &[]));
    let config = LibraryConfig {
        lookup_timeout_ms: 50,
        ..config()
    };
    let scanner =
        LibraryScanner::new(Arc::clone(&lib.index), config).with_lookup(Arc::new(Stalled));

    let report = tokio::time::timeout(Duration::from_secs(10), scanner.scan(lib.root()))
        .await
        .expect("scan should finish despite the stalled lookup")
        .unwrap();
    assert_eq!(report.status, ScanStatus::Completed);
    assert_eq!(report.added, 2);
}

#[tokio::test]
async fn lookup_fills_only_unknown_fields() {
    let lib = Library::new();
    lib.write("a.mp3", &mp3(&mpeg_frames(2, 1), &[("TIT2", "Local title")]));

    lib.scanner()
        .with_lookup(Arc::new(Catalogue))
        .scan(lib.root())
        .await
        .unwrap();

    let entry = lib.index.lookup_by_path(&lib.path("a.mp3")).await.unwrap().unwrap();
    let record = lib
        .index
        .lookup_by_identity(&entry.identity.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.metadata.title, Field::Known("Local title".to_string()));
    assert_eq!(
        record.metadata.artist,
        Field::Known("Catalogue artist".to_string())
    );
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let lib = Library::new();
    for seed in 0..5u8 {
        lib.write(&format!("t{seed}.mp3"), &mp3(&mpeg_frames(2, seed), &[]));
    }
    let processed = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&processed);

    let report = lib
        .scanner()
        .on_progress(Arc::new(move |report: &ScanReport| {
            seen.store(report.added + report.errored, Ordering::SeqCst);
        }))
        .scan(lib.root())
        .await
        .unwrap();

    assert_eq!(report.added, 5);
    assert_eq!(processed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn resolver_plans_removal_of_longer_path() {
    let lib = Library::new();
    let audio = mpeg_frames(4, 3);
    lib.write("a.mp3", &mp3(&audio, &[]));
    lib.write("copies/a (1).flac", &flac(&audio, &[]));
    lib.write("unique.mp3", &mp3(&mpeg_frames(4, 4), &[]));
    lib.scanner().scan(lib.root()).await.unwrap();

    let plan = DuplicateResolver::new(ResolutionPolicy::KeepShortestPath)
        .plan(&lib.index)
        .await
        .unwrap();
    assert_eq!(plan.groups.len(), 1);
    assert_eq!(plan.groups[0].keep, Some(lib.path("a.mp3")));
    assert_eq!(
        plan.removals().cloned().collect::<Vec<_>>(),
        vec![lib.path("copies/a (1).flac")]
    );

    let report_only = DuplicateResolver::new(ResolutionPolicy::ReportOnly)
        .plan(&lib.index)
        .await
        .unwrap();
    assert_eq!(report_only.groups.len(), 1);
    assert_eq!(report_only.removal_count(), 0);
}

#[tokio::test]
async fn index_survives_restart() {
    let db_dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", db_dir.path().join("index.db").display());
    let lib = Library::with_index(LibraryIndex::open_sqlite(&url).await.unwrap());
    lib.write("a.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    lib.write("b.flac", &flac(&mpeg_frames(2, 1), &[]));
    lib.scanner().scan(lib.root()).await.unwrap();

    let reopened = Arc::new(LibraryIndex::open_sqlite(&url).await.unwrap());
    let counts = reopened.counts().await.unwrap();
    assert_eq!(counts.tracks, 1);
    assert_eq!(counts.paths, 2);

    let report = LibraryScanner::new(Arc::clone(&reopened), config())
        .scan(lib.root())
        .await
        .unwrap();
    assert_eq!(report.unchanged, 2);
    assert_eq!(reopened.last_scan(lib.root()).await.unwrap().unwrap().scan_count, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_file_names_are_indexed_losslessly() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let db_dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", db_dir.path().join("index.db").display());
    let lib = Library::with_index(LibraryIndex::open_sqlite(&url).await.unwrap());
    lib.write("ok.mp3", &mp3(&mpeg_frames(2, 1), &[]));
    let odd = lib.root().join(OsStr::from_bytes(b"caf\xe9.mp3"));
    if std::fs::write(&odd, mp3(&mpeg_frames(2, 2), &[])).is_err() {
        // Filesystem rejects names that are not UTF-8
        return;
    }
    let scanner = lib.scanner();

    let first = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(first.added, 2);
    assert_eq!(first.errored, 0);

    let second = scanner.scan(lib.root()).await.unwrap();
    assert_eq!(second.unchanged, 2);
    assert_eq!(second.removed, 0);
    assert_eq!(second.added, 0);

    let reopened = LibraryIndex::open_sqlite(&url).await.unwrap();
    let entry = reopened.lookup_by_path(&odd).await.unwrap().unwrap();
    assert_eq!(entry.path, odd);
    assert!(!entry.is_pending());
}

#[tokio::test]
async fn missing_root_is_rejected() {
    let lib = Library::new();
    let err = lib
        .scanner()
        .scan(&lib.path("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::InvalidRoot { .. }));
}
