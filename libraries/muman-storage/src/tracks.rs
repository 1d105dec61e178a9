//! Track record storage
//!
//! One row per content identity. The record (metadata snapshot and path set)
//! is kept as JSON; `last_verified` is duplicated into its own column for
//! inspection.

use crate::error::{Result, StorageError};
use crate::rows::{decode_id, encode_time};
use muman_core::{ContentId, TrackRecord};
use sqlx::{Row, SqliteConnection, SqlitePool};

fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<TrackRecord> {
    let key: String = row.try_get("content_id")?;
    let json: String = row.try_get("record")?;
    let identity = decode_id(&key)?;
    let record: TrackRecord = serde_json::from_str(&json)
        .map_err(|e| StorageError::corruption(format!("track record {key}: {e}")))?;
    if record.identity != identity {
        return Err(StorageError::corruption(format!(
            "track record stored under {key} carries identity {}",
            record.identity
        )));
    }
    Ok(record)
}

/// Get a track record by identity
pub async fn get(pool: &SqlitePool, identity: &ContentId) -> Result<Option<TrackRecord>> {
    let row = sqlx::query("SELECT content_id, record FROM track_records WHERE content_id = ?")
        .bind(identity.to_hex())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(decode).transpose()
}

/// Get every track record, ordered by identity
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<TrackRecord>> {
    let rows = sqlx::query("SELECT content_id, record FROM track_records ORDER BY content_id")
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode).collect()
}

/// Insert or replace a track record
pub async fn put(conn: &mut SqliteConnection, record: &TrackRecord) -> Result<()> {
    let json = serde_json::to_string(record)?;
    sqlx::query(
        r#"
        INSERT INTO track_records (content_id, record, last_verified)
        VALUES (?, ?, ?)
        ON CONFLICT(content_id) DO UPDATE SET
            record = excluded.record,
            last_verified = excluded.last_verified
        "#,
    )
    .bind(record.identity.to_hex())
    .bind(json)
    .bind(encode_time(&record.last_verified))
    .execute(conn)
    .await?;

    Ok(())
}

/// Delete a track record
pub async fn delete(conn: &mut SqliteConnection, identity: &ContentId) -> Result<()> {
    sqlx::query("DELETE FROM track_records WHERE content_id = ?")
        .bind(identity.to_hex())
        .execute(conn)
        .await?;

    Ok(())
}

/// Number of track records
pub async fn count(pool: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM track_records")
        .fetch_one(pool)
        .await?;
    crate::rows::decode_u64(count)
}
