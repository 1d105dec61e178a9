//! Lossless path encoding
//!
//! File names are OS byte strings and need not be UTF-8. Serialized paths
//! that are valid UTF-8 stay plain strings; any other path becomes
//! `{"bytes": "<hex>"}` of its raw bytes. Storage keys use [`to_bytes`] /
//! [`from_bytes`] directly.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Encoded {
    Text(String),
    Raw { bytes: String },
}

fn encode(path: &Path) -> Encoded {
    match path.to_str() {
        Some(text) => Encoded::Text(text.to_owned()),
        None => Encoded::Raw {
            bytes: hex::encode(to_bytes(path)),
        },
    }
}

fn decode<E: serde::de::Error>(encoded: Encoded) -> Result<PathBuf, E> {
    match encoded {
        Encoded::Text(text) => Ok(PathBuf::from(text)),
        Encoded::Raw { bytes } => hex::decode(bytes).map(from_bytes).map_err(E::custom),
    }
}

/// Raw OS bytes of `path`
#[cfg(unix)]
pub fn to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

/// Path from raw OS bytes
#[cfg(unix)]
pub fn from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

// Non-Unix file names are checked UTF-16 and convert to UTF-8 in practice
#[cfg(not(unix))]
pub fn to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(unix))]
pub fn from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// `#[serde(with = "path_codec")]` for a single path
pub fn serialize<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    encode(path).serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
    decode(Encoded::deserialize(deserializer)?)
}

/// `#[serde(with = "path_codec::set")]` for an ordered path set
pub mod set {
    use super::{decode, encode, Encoded};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    pub fn serialize<S: Serializer>(
        paths: &BTreeSet<PathBuf>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(paths.iter().map(|path| encode(path)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeSet<PathBuf>, D::Error> {
        Vec::<Encoded>::deserialize(deserializer)?
            .into_iter()
            .map(decode)
            .collect()
    }
}
