//! Path entry storage
use crate::error::Result;
use crate::rows::{decode_id, decode_time, decode_u64, encode_time, encode_u64, path_from_key, path_key};
use muman_core::{ContentId, FileStat, PathEntry};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;

fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<PathEntry> {
    let path: Vec<u8> = row.try_get("path")?;
    let content_id: Option<String> = row.try_get("content_id")?;
    let modified: String = row.try_get("modified")?;
    let size: i64 = row.try_get("size")?;

    Ok(PathEntry {
        path: path_from_key(path),
        stat: FileStat::new(decode_time(&modified)?, decode_u64(size)?),
        identity: content_id.as_deref().map(decode_id).transpose()?,
    })
}

/// Get a path entry by path
pub async fn get(pool: &SqlitePool, path: &Path) -> Result<Option<PathEntry>> {
    let row = sqlx::query(
        "SELECT path, content_id, modified, size FROM path_entries WHERE path = ?",
    )
    .bind(path_key(path))
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(decode).transpose()
}

/// Get every path entry, ordered by path
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<PathEntry>> {
    let rows = sqlx::query("SELECT path, content_id, modified, size FROM path_entries ORDER BY path")
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode).collect()
}

/// Get path entries located below `root`
///
/// The prefix match in SQL only narrows the candidates; component-wise
/// containment is decided by `Path::starts_with`.
pub async fn get_under(pool: &SqlitePool, root: &Path) -> Result<Vec<PathEntry>> {
    let prefix = path_key(root);
    let rows = sqlx::query(
        r#"
        SELECT path, content_id, modified, size
        FROM path_entries
        WHERE substr(path, 1, length(?)) = ?
        ORDER BY path
        "#,
    )
    .bind(prefix.clone())
    .bind(prefix)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in &rows {
        let entry = decode(row)?;
        if entry.path.starts_with(root) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Insert or replace a path entry
pub async fn put(conn: &mut SqliteConnection, entry: &PathEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO path_entries (path, content_id, modified, size)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(path) DO UPDATE SET
            content_id = excluded.content_id,
            modified = excluded.modified,
            size = excluded.size
        "#,
    )
    .bind(path_key(&entry.path))
    .bind(entry.identity.map(|id| id.to_hex()))
    .bind(encode_time(&entry.stat.modified))
    .bind(encode_u64(entry.stat.size)?)
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a path entry
pub async fn delete(conn: &mut SqliteConnection, path: &Path) -> Result<()> {
    sqlx::query("DELETE FROM path_entries WHERE path = ?")
        .bind(path_key(path))
        .execute(conn)
        .await?;

    Ok(())
}

/// Identities resolved by more than one path, ordered
pub async fn duplicate_identities(pool: &SqlitePool) -> Result<Vec<ContentId>> {
    let keys: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT content_id
        FROM path_entries
        WHERE content_id IS NOT NULL
        GROUP BY content_id
        HAVING COUNT(*) > 1
        ORDER BY content_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    keys.iter().map(|key| decode_id(key)).collect()
}

/// Total and pending path counts
pub async fn counts(pool: &SqlitePool) -> Result<(u64, u64)> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN content_id IS NULL THEN 1 ELSE 0 END), 0) AS pending
        FROM path_entries
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total: i64 = row.try_get("total")?;
    let pending: i64 = row.try_get("pending")?;
    Ok((decode_u64(total)?, decode_u64(pending)?))
}
