//! Library index over the SQLite store

use futures_util::TryStreamExt;
use muman_core::{AudioFormat, Field, MumanError, ScanReport, ScanStatus};
use muman_storage::LibraryIndex;
use std::path::Path;
use test_helpers::{id, metadata, stat, TestDb};

#[tokio::test]
async fn index_survives_reopen() {
    let db = TestDb::new().await;
    {
        let index = db.index().await.unwrap();
        index
            .upsert(id(1), metadata("Blue in Green", AudioFormat::Flac), Path::new("/music/a.flac"), stat(10, 2048))
            .await
            .unwrap();
    }

    let index = LibraryIndex::open_sqlite(&db.url).await.unwrap();
    let record = index.lookup_by_identity(&id(1)).await.unwrap().unwrap();
    assert_eq!(record.metadata.title, Field::Known("Blue in Green".to_string()));
    assert_eq!(record.metadata.track_number, Field::Known(3));
    assert_eq!(record.metadata.album, Field::Unknown);

    let entry = index.lookup_by_path(Path::new("/music/a.flac")).await.unwrap().unwrap();
    assert_eq!(entry.stat, stat(10, 2048));
    assert_eq!(entry.identity, Some(id(1)));
}

#[tokio::test]
async fn duplicate_query_groups_paths_by_identity() {
    let db = TestDb::new().await;
    let index = db.index().await.unwrap();
    index.upsert(id(1), metadata("x", AudioFormat::Mp3), Path::new("/m/a.mp3"), stat(1, 1)).await.unwrap();
    index.upsert(id(1), metadata("x", AudioFormat::Flac), Path::new("/m/b.flac"), stat(2, 1)).await.unwrap();
    index.upsert(id(2), metadata("y", AudioFormat::Mp3), Path::new("/m/c.mp3"), stat(3, 1)).await.unwrap();

    let groups: Vec<_> = index.duplicate_groups().try_collect().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].identity, id(1));
    let paths: Vec<_> = groups[0].paths().cloned().collect();
    assert_eq!(paths, vec![Path::new("/m/a.mp3").to_path_buf(), Path::new("/m/b.flac").to_path_buf()]);
}

#[tokio::test]
async fn paths_under_respects_component_boundaries() {
    let db = TestDb::new().await;
    let index = db.index().await.unwrap();
    index.upsert(id(1), metadata("a", AudioFormat::Mp3), Path::new("/music/a.mp3"), stat(1, 1)).await.unwrap();
    index.upsert(id(2), metadata("b", AudioFormat::Mp3), Path::new("/music2/b.mp3"), stat(1, 1)).await.unwrap();

    let under = index.paths_under(Path::new("/music")).await.unwrap();
    assert_eq!(under.len(), 1);
    assert_eq!(under[0].path, Path::new("/music/a.mp3"));
}

#[tokio::test]
async fn pending_entries_persist_without_identity() {
    let db = TestDb::new().await;
    let index = db.index().await.unwrap();
    let path = Path::new("/music/a.mp3");
    index.upsert(id(1), metadata("a", AudioFormat::Mp3), path, stat(1, 1)).await.unwrap();
    index.mark_pending(path, stat(2, 5)).await.unwrap();

    let counts = index.counts().await.unwrap();
    assert_eq!((counts.tracks, counts.paths, counts.pending_paths), (0, 1, 1));
    drop(index);

    let reopened = db.index().await.unwrap();
    assert!(reopened.lookup_by_path(path).await.unwrap().unwrap().is_pending());
}

#[cfg(unix)]
#[tokio::test]
async fn non_utf8_paths_round_trip() {
    use std::os::unix::ffi::OsStrExt;

    let db = TestDb::new().await;
    let index = db.index().await.unwrap();
    let odd = Path::new(std::ffi::OsStr::from_bytes(b"/music/caf\xe9.mp3"));
    let lossy = Path::new("/music/caf\u{fffd}.mp3");
    index.upsert(id(1), metadata("a", AudioFormat::Mp3), odd, stat(1, 1)).await.unwrap();
    index.upsert(id(2), metadata("b", AudioFormat::Mp3), lossy, stat(1, 1)).await.unwrap();
    drop(index);

    let reopened = db.index().await.unwrap();
    assert_eq!(reopened.lookup_by_path(odd).await.unwrap().unwrap().identity, Some(id(1)));
    assert_eq!(reopened.lookup_by_path(lossy).await.unwrap().unwrap().identity, Some(id(2)));
    let record = reopened.lookup_by_identity(&id(1)).await.unwrap().unwrap();
    assert!(record.contains(odd));

    let under: Vec<_> = reopened
        .paths_under(Path::new("/music"))
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    assert!(under.iter().any(|p| p == odd));
    assert_eq!(under.len(), 2);
}

#[tokio::test]
async fn scan_markers_persist() {
    let db = TestDb::new().await;
    let index = db.index().await.unwrap();
    let mut report = ScanReport::started("/music");
    report.status = ScanStatus::Completed;
    report.added = 4;
    index.record_scan(report.clone()).await.unwrap();
    index.record_scan(report).await.unwrap();

    let marker = index.last_scan(Path::new("/music")).await.unwrap().unwrap();
    assert_eq!(marker.scan_count, 2);
    assert_eq!(marker.report.added, 4);
    assert_eq!(marker.report.status, ScanStatus::Completed);
    assert!(index.last_scan(Path::new("/other")).await.unwrap().is_none());
}

#[tokio::test]
async fn dangling_path_row_fails_open() {
    let db = TestDb::new().await;
    sqlx::query("INSERT INTO path_entries (path, content_id, modified, size) VALUES (?, ?, ?, ?)")
        .bind(b"/music/ghost.mp3".to_vec())
        .bind(id(9).to_hex())
        .bind("2024-01-01T00:00:00Z")
        .bind(10_i64)
        .execute(&db.pool)
        .await
        .unwrap();

    let err = db.index().await.unwrap_err();
    assert!(matches!(err, MumanError::IndexCorruption(_)));
}

#[tokio::test]
async fn undecodable_record_is_corruption() {
    let db = TestDb::new().await;
    sqlx::query("INSERT INTO track_records (content_id, record, last_verified) VALUES (?, ?, ?)")
        .bind(id(4).to_hex())
        .bind("{not json")
        .bind("2024-01-01T00:00:00Z")
        .execute(&db.pool)
        .await
        .unwrap();

    let err = db.index().await.unwrap_err();
    assert!(matches!(err, MumanError::IndexCorruption(_)));
}
