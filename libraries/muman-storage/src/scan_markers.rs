//! Scan completion markers, one per root
use crate::error::{Result, StorageError};
use crate::rows::{encode_time, encode_u64, path_key};
use muman_core::ScanMarker;
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Get the marker of the latest scan of `root`
pub async fn get(pool: &SqlitePool, root: &Path) -> Result<Option<ScanMarker>> {
    let row = sqlx::query("SELECT root, report, scan_count FROM scan_markers WHERE root = ?")
        .bind(path_key(root))
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let json: String = row.try_get("report")?;
    let scan_count: i64 = row.try_get("scan_count")?;
    let report = serde_json::from_str(&json)
        .map_err(|e| StorageError::corruption(format!("scan marker for {}: {e}", root.display())))?;

    Ok(Some(ScanMarker {
        report,
        scan_count: crate::rows::decode_u64(scan_count)?,
    }))
}

/// Insert or replace the marker of `marker.report.root`
pub async fn put(pool: &SqlitePool, marker: &ScanMarker) -> Result<()> {
    let report = serde_json::to_string(&marker.report)?;
    sqlx::query(
        r#"
        INSERT INTO scan_markers (root, status, finished_at, scan_count, report)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(root) DO UPDATE SET
            status = excluded.status,
            finished_at = excluded.finished_at,
            scan_count = excluded.scan_count,
            report = excluded.report
        "#,
    )
    .bind(path_key(&marker.report.root))
    .bind(marker.report.status.as_str())
    .bind(encode_time(&marker.report.finished_at))
    .bind(encode_u64(marker.scan_count)?)
    .bind(report)
    .execute(pool)
    .await?;

    Ok(())
}
