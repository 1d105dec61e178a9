//! Content identity computation
//!
//! A [`ContentId`] is the SHA-256 digest of a file's audio payload, streamed
//! through a fixed-size buffer. Tag blocks never enter the digest, so
//! re-tagging a file keeps its identity.

use crate::container::{read_ogg_page, PayloadLayout, Probe};
use crate::error::{ExtractError, Result};
use muman_core::ContentId;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Granule value of an Ogg page on which no packet ends
const OGG_NO_GRANULE: u64 = u64::MAX;

/// Streaming payload hasher
#[derive(Debug, Clone)]
pub struct ContentIdentifier {
    buffer_size: usize,
}

impl Default for ContentIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentIdentifier {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Use a different read buffer size (minimum 512 bytes)
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(512);
        self
    }

    /// Identify the file at `path`
    pub fn identify_file(&self, path: &Path) -> Result<ContentId> {
        let mut reader = BufReader::new(File::open(path)?);
        self.identify(&mut reader)
    }

    /// Identify the payload of `reader`.
    ///
    /// Fails with [`ExtractError::Read`] if the stream ends before a payload
    /// range it advertised has been consumed.
    pub fn identify<R: Read + Seek + ?Sized>(&self, reader: &mut R) -> Result<ContentId> {
        let probe = Probe::run(reader)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.buffer_size];

        match probe.layout {
            PayloadLayout::Ranges(ranges) => {
                for range in ranges {
                    hash_range(reader, &range, &mut hasher, &mut buffer)?;
                }
            }
            PayloadLayout::OggPages(region) => {
                hash_ogg_audio(reader, region, &mut hasher, &mut buffer)?;
            }
        }

        Ok(ContentId::from_bytes(hasher.finalize().into()))
    }
}

fn hash_range<R: Read + Seek + ?Sized>(
    reader: &mut R,
    range: &Range<u64>,
    hasher: &mut Sha256,
    buffer: &mut [u8],
) -> Result<()> {
    reader.seek(SeekFrom::Start(range.start))?;
    let mut remaining = range.end.saturating_sub(range.start);
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(buffer.len(), |r| r.min(buffer.len()));
        let n = reader.read(&mut buffer[..want])?;
        if n == 0 {
            return Err(ExtractError::Read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended {remaining} bytes before end of payload"),
            )));
        }
        hasher.update(&buffer[..n]);
        remaining -= n as u64;
    }
    Ok(())
}

/// Hash page bodies from the first page carrying an audio granule onwards.
/// Header pages (granule 0, or no granule while a header packet spans pages)
/// are left out. Bytes after a broken page are hashed raw.
fn hash_ogg_audio<R: Read + Seek + ?Sized>(
    reader: &mut R,
    region: Range<u64>,
    hasher: &mut Sha256,
    buffer: &mut [u8],
) -> Result<()> {
    let mut pos = region.start;
    let mut in_audio = false;

    while pos < region.end {
        let Some(page) = read_ogg_page(reader, pos, region.end)? else {
            return hash_range(reader, &(pos..region.end), hasher, buffer);
        };
        if !in_audio && page.granule != 0 && page.granule != OGG_NO_GRANULE {
            in_audio = true;
        }
        if in_audio {
            hash_range(reader, &page.body, hasher, buffer)?;
        }
        pos = page.body.end;
    }
    Ok(())
}
