//! Column encodings shared by the table modules
use crate::error::{Result, StorageError};
use chrono::{DateTime, SecondsFormat, Utc};
use muman_core::types::path_codec;
use muman_core::ContentId;
use std::path::{Path, PathBuf};

/// Path columns hold the raw OS bytes, so non-UTF-8 names round-trip
pub(crate) fn path_key(path: &Path) -> Vec<u8> {
    path_codec::to_bytes(path)
}

pub(crate) fn path_from_key(key: Vec<u8>) -> PathBuf {
    path_codec::from_bytes(key)
}

pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::corruption(format!("invalid timestamp {text:?}: {e}")))
}

pub(crate) fn decode_id(text: &str) -> Result<ContentId> {
    ContentId::from_hex(text)
        .map_err(|e| StorageError::corruption(format!("invalid content id column: {e}")))
}

pub(crate) fn encode_u64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::corruption(format!("value {value} does not fit an INTEGER column")))
}

pub(crate) fn decode_u64(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| StorageError::corruption(format!("negative value {value} in unsigned column")))
}
