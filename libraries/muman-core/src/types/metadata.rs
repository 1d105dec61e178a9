//! Canonical track metadata
//!
//! Every tag field is a [`Field`]: either a known value or the explicit
//! `Unknown` sentinel. Fields are never omitted from a record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tag value that is either known or explicitly unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field<T> {
    /// The tag was absent, empty, or malformed
    Unknown,
    /// A normalized value
    Known(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Unknown
    }
}

impl<T> Field<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        !self.is_unknown()
    }

    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Unknown => None,
        }
    }

    /// Keep `self` if known, otherwise take `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Known(_) => self,
            Self::Unknown => other,
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

impl Field<String> {
    /// Trim whitespace; an empty or missing value becomes `Unknown`.
    pub fn from_text(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(text) if !text.is_empty() => Self::Known(text.to_string()),
            _ => Self::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(value) => value.fmt(f),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Audio container formats recognized by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Opus,
    Wav,
    Aiff,
    Mp4,
    Aac,
    Ape,
    WavPack,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Wav => "wav",
            Self::Aiff => "aiff",
            Self::Mp4 => "mp4",
            Self::Aac => "aac",
            Self::Ape => "ape",
            Self::WavPack => "wavpack",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, normalized metadata of one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title
    pub title: Field<String>,

    /// Track artist
    pub artist: Field<String>,

    /// Album title
    pub album: Field<String>,

    /// Album artist (may differ from track artist)
    pub album_artist: Field<String>,

    /// Genre, as tagged
    pub genre: Field<String>,

    /// Release year
    pub year: Field<u32>,

    /// Track number (1-based)
    pub track_number: Field<u32>,

    /// Disc number (1-based)
    pub disc_number: Field<u32>,

    /// International Standard Recording Code
    pub isrc: Field<String>,

    /// Duration in milliseconds
    pub duration_ms: Field<u64>,

    /// Container format
    pub format: AudioFormat,
}

impl TrackMetadata {
    /// A record with every tag field unknown
    pub fn unknown(format: AudioFormat) -> Self {
        Self {
            title: Field::Unknown,
            artist: Field::Unknown,
            album: Field::Unknown,
            album_artist: Field::Unknown,
            genre: Field::Unknown,
            year: Field::Unknown,
            track_number: Field::Unknown,
            disc_number: Field::Unknown,
            isrc: Field::Unknown,
            duration_ms: Field::Unknown,
            format,
        }
    }

    /// Whether any tag field is still unknown
    pub fn has_unknown_fields(&self) -> bool {
        self.title.is_unknown()
            || self.artist.is_unknown()
            || self.album.is_unknown()
            || self.album_artist.is_unknown()
            || self.genre.is_unknown()
            || self.year.is_unknown()
            || self.track_number.is_unknown()
            || self.disc_number.is_unknown()
            || self.isrc.is_unknown()
            || self.duration_ms.is_unknown()
    }

    /// Fill unknown fields from `other`; known fields are never overwritten.
    ///
    /// Returns the number of fields that were filled.
    pub fn fill_unknown_from(&mut self, other: &TrackMetadata) -> usize {
        fn fill<T: Clone>(dst: &mut Field<T>, src: &Field<T>, filled: &mut usize) {
            if dst.is_unknown() && src.is_known() {
                *dst = src.clone();
                *filled += 1;
            }
        }

        let mut filled = 0;
        fill(&mut self.title, &other.title, &mut filled);
        fill(&mut self.artist, &other.artist, &mut filled);
        fill(&mut self.album, &other.album, &mut filled);
        fill(&mut self.album_artist, &other.album_artist, &mut filled);
        fill(&mut self.genre, &other.genre, &mut filled);
        fill(&mut self.year, &other.year, &mut filled);
        fill(&mut self.track_number, &other.track_number, &mut filled);
        fill(&mut self.disc_number, &other.disc_number, &mut filled);
        fill(&mut self.isrc, &other.isrc, &mut filled);
        fill(&mut self.duration_ms, &other.duration_ms, &mut filled);
        filled
    }
}
