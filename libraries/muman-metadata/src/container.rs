//! Container sniffing and audio payload layout
//!
//! The content identity covers the audio payload only. This module works out
//! which byte ranges of a stream make up that payload for each supported
//! container, skipping tag blocks wherever a container allows them.

use muman_core::AudioFormat;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Range;

const ID3V2_HEADER_LEN: u64 = 10;
const ID3V1_LEN: u64 = 128;
const APE_FOOTER_LEN: u64 = 32;
const OGG_PAGE_HEADER_LEN: u64 = 27;
const MPEG_SYNC_WINDOW: u64 = 64 * 1024;

/// Container families the identifier knows how to take apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mpeg,
    Flac,
    Wav,
    Aiff,
    Mp4,
    Ogg,
    Unknown,
}

impl Container {
    /// Sniff the container from the first bytes after any leading ID3v2 tag
    pub fn sniff(header: &[u8]) -> Self {
        if header.starts_with(b"fLaC") {
            Self::Flac
        } else if header.starts_with(b"OggS") {
            Self::Ogg
        } else if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
            Self::Wav
        } else if header.len() >= 12
            && &header[0..4] == b"FORM"
            && matches!(&header[8..12], b"AIFF" | b"AIFC")
        {
            Self::Aiff
        } else if header.len() >= 8 && &header[4..8] == b"ftyp" {
            Self::Mp4
        } else if header.len() >= 2 && is_mpeg_sync(header[0], header[1]) {
            Self::Mpeg
        } else {
            Self::Unknown
        }
    }

    /// Container a file extension suggests, for streams whose magic is
    /// missing or damaged
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" | "mp2" | "mpga" => Self::Mpeg,
            "flac" => Self::Flac,
            "wav" | "wave" => Self::Wav,
            "aif" | "aiff" | "aifc" => Self::Aiff,
            "m4a" | "mp4" | "m4b" | "alac" => Self::Mp4,
            "ogg" | "oga" | "opus" => Self::Ogg,
            _ => Self::Unknown,
        }
    }

    /// Canonical format label, when the container maps to one
    pub fn audio_format(self) -> Option<AudioFormat> {
        match self {
            Self::Mpeg => Some(AudioFormat::Mp3),
            Self::Flac => Some(AudioFormat::Flac),
            Self::Wav => Some(AudioFormat::Wav),
            Self::Aiff => Some(AudioFormat::Aiff),
            Self::Mp4 => Some(AudioFormat::Mp4),
            Self::Ogg => Some(AudioFormat::Ogg),
            Self::Unknown => None,
        }
    }
}

fn is_mpeg_sync(b0: u8, b1: u8) -> bool {
    // 11 sync bits, a valid version and a valid layer
    b0 == 0xFF && (b1 & 0xE0) == 0xE0 && (b1 & 0x18) != 0x08 && (b1 & 0x06) != 0
}

/// Byte ranges holding the audio payload of one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Hash these ranges in order
    Ranges(Vec<Range<u64>>),
    /// Walk Ogg pages inside this range and hash audio page bodies
    OggPages(Range<u64>),
}

/// Result of probing a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub container: Container,
    pub layout: PayloadLayout,
}

impl Probe {
    /// Work out the container and payload ranges of `reader`.
    ///
    /// Never fails on malformed structure: a damaged container degrades to
    /// hashing whatever region could not be classified. Only I/O errors
    /// surface.
    pub fn run<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        let start = skip_id3v2(reader, 0, len)?;
        let header = read_at(reader, start, 12)?;
        let container = Container::sniff(&header);

        let layout = match container {
            Container::Flac => {
                let audio = skip_flac_metadata(reader, start + 4, len)?;
                let end = strip_trailing_tags(reader, audio, len)?;
                PayloadLayout::Ranges(vec![audio..end])
            }
            Container::Wav => PayloadLayout::Ranges(chunk_bodies(
                reader,
                start + 12,
                len,
                b"data",
                Endian::Little,
            )?)
            .or_whole(start..len),
            Container::Aiff => PayloadLayout::Ranges(chunk_bodies(
                reader,
                start + 12,
                len,
                b"SSND",
                Endian::Big,
            )?)
            .or_whole(start..len),
            Container::Mp4 => PayloadLayout::Ranges(mdat_bodies(reader, start, len)?)
                .or_whole(start..len),
            Container::Ogg => PayloadLayout::OggPages(start..len),
            Container::Mpeg | Container::Unknown => {
                let end = strip_trailing_tags(reader, start, len)?;
                PayloadLayout::Ranges(vec![start..end])
            }
        };

        Ok(Self { container, layout })
    }
}

impl PayloadLayout {
    fn or_whole(self, whole: Range<u64>) -> Self {
        match self {
            Self::Ranges(ranges) if ranges.is_empty() => Self::Ranges(vec![whole]),
            other => other,
        }
    }
}

/// Whether an MPEG frame sync appears within the first bytes after `start`
pub fn has_mpeg_sync<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<bool> {
    let len = reader.seek(SeekFrom::End(0))?;
    let start = skip_id3v2(reader, 0, len)?;
    let window = read_at(reader, start, MPEG_SYNC_WINDOW.min(len - start) as usize)?;
    Ok(window.windows(2).any(|pair| is_mpeg_sync(pair[0], pair[1])))
}

/// Read up to `n` bytes at `pos`; shorter near end of stream
pub(crate) fn read_at<R: Read + Seek + ?Sized>(
    reader: &mut R,
    pos: u64,
    n: usize,
) -> io::Result<Vec<u8>> {
    reader.seek(SeekFrom::Start(pos))?;
    let mut buf = Vec::with_capacity(n);
    reader.take(n as u64).read_to_end(&mut buf)?;
    Ok(buf)
}

fn syncsafe(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |acc, b| (acc << 7) | u64::from(b & 0x7F))
}

/// Offset of the first byte after any number of leading ID3v2 tags
fn skip_id3v2<R: Read + Seek + ?Sized>(reader: &mut R, mut pos: u64, len: u64) -> io::Result<u64> {
    loop {
        let header = read_at(reader, pos, ID3V2_HEADER_LEN as usize)?;
        if header.len() < ID3V2_HEADER_LEN as usize
            || &header[0..3] != b"ID3"
            || header[3] == 0xFF
            || header[4] == 0xFF
            || header[6..10].iter().any(|b| b & 0x80 != 0)
        {
            return Ok(pos);
        }
        let footer = if header[5] & 0x10 != 0 {
            ID3V2_HEADER_LEN
        } else {
            0
        };
        let next = pos + ID3V2_HEADER_LEN + syncsafe(&header[6..10]) + footer;
        if next >= len {
            return Ok(len);
        }
        pos = next;
    }
}

/// Offset of the first FLAC frame; `pos` points just past `fLaC`
fn skip_flac_metadata<R: Read + Seek + ?Sized>(
    reader: &mut R,
    mut pos: u64,
    len: u64,
) -> io::Result<u64> {
    loop {
        let header = read_at(reader, pos, 4)?;
        if header.len() < 4 {
            return Ok(len);
        }
        let last = header[0] & 0x80 != 0;
        let block_len =
            (u64::from(header[1]) << 16) | (u64::from(header[2]) << 8) | u64::from(header[3]);
        pos = pos.saturating_add(4 + block_len).min(len);
        if last || pos >= len {
            return Ok(pos);
        }
    }
}

/// End of the payload once trailing ID3v1, Lyrics3 and APEv2 tags are cut
fn strip_trailing_tags<R: Read + Seek + ?Sized>(
    reader: &mut R,
    floor: u64,
    mut end: u64,
) -> io::Result<u64> {
    loop {
        if end >= floor + ID3V1_LEN {
            let tag = read_at(reader, end - ID3V1_LEN, 3)?;
            if tag == b"TAG" {
                end -= ID3V1_LEN;
                continue;
            }
        }

        if end >= floor + APE_FOOTER_LEN {
            let footer = read_at(reader, end - APE_FOOTER_LEN, APE_FOOTER_LEN as usize)?;
            if footer.len() == APE_FOOTER_LEN as usize && &footer[0..8] == b"APETAGEX" {
                let size = u64::from(le_u32(&footer[12..16]));
                let flags = le_u32(&footer[20..24]);
                let header = if flags & 0x8000_0000 != 0 {
                    APE_FOOTER_LEN
                } else {
                    0
                };
                let total = size + header;
                if total >= APE_FOOTER_LEN && end - floor >= total {
                    end -= total;
                    continue;
                }
            }
        }

        if end >= floor + 15 {
            let marker = read_at(reader, end - 9, 9)?;
            if marker == b"LYRICS200" {
                let size_text = read_at(reader, end - 15, 6)?;
                let size = std::str::from_utf8(&size_text)
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok());
                if let Some(size) = size.filter(|s| end - floor >= s + 15) {
                    end -= size + 15;
                    continue;
                }
            }
        }

        return Ok(end);
    }
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Bodies of every `wanted` chunk in a RIFF or IFF chunk list
fn chunk_bodies<R: Read + Seek + ?Sized>(
    reader: &mut R,
    mut pos: u64,
    len: u64,
    wanted: &[u8; 4],
    endian: Endian,
) -> io::Result<Vec<Range<u64>>> {
    let mut bodies = Vec::new();
    while pos.saturating_add(8) <= len {
        let header = read_at(reader, pos, 8)?;
        if header.len() < 8 {
            break;
        }
        let size = u64::from(match endian {
            Endian::Little => le_u32(&header[4..8]),
            Endian::Big => be_u32(&header[4..8]),
        });
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(size).min(len);
        if &header[0..4] == wanted {
            bodies.push(body_start..body_end);
        }
        pos = body_end.saturating_add(size & 1);
    }
    Ok(bodies)
}

/// Bodies of every top-level `mdat` atom
fn mdat_bodies<R: Read + Seek + ?Sized>(
    reader: &mut R,
    mut pos: u64,
    len: u64,
) -> io::Result<Vec<Range<u64>>> {
    let mut bodies = Vec::new();
    while pos.saturating_add(8) <= len {
        let header = read_at(reader, pos, 16)?;
        if header.len() < 8 {
            break;
        }
        let (header_len, atom_len) = match be_u32(&header[0..4]) {
            0 => (8, len - pos),
            1 if header.len() == 16 => {
                let mut wide = [0u8; 8];
                wide.copy_from_slice(&header[8..16]);
                (16, u64::from_be_bytes(wide))
            }
            size => (8, u64::from(size)),
        };
        if atom_len < header_len {
            break;
        }
        // a declared size past the end of the stream is clamped, so `end`
        // always moves forward
        let end = pos.saturating_add(atom_len).min(len);
        if end <= pos {
            break;
        }
        if &header[4..8] == b"mdat" {
            bodies.push((pos + header_len).min(end)..end);
        }
        pos = end;
    }
    Ok(bodies)
}

/// One Ogg page as seen by the identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OggPage {
    pub granule: u64,
    pub body: Range<u64>,
}

/// Read the page starting at `pos`; `None` when no valid page header is there
pub(crate) fn read_ogg_page<R: Read + Seek + ?Sized>(
    reader: &mut R,
    pos: u64,
    end: u64,
) -> io::Result<Option<OggPage>> {
    if pos + OGG_PAGE_HEADER_LEN > end {
        return Ok(None);
    }
    let header = read_at(reader, pos, OGG_PAGE_HEADER_LEN as usize)?;
    if header.len() < OGG_PAGE_HEADER_LEN as usize || &header[0..4] != b"OggS" {
        return Ok(None);
    }
    let mut granule = [0u8; 8];
    granule.copy_from_slice(&header[6..14]);
    let segments = usize::from(header[26]);
    let table = read_at(reader, pos + OGG_PAGE_HEADER_LEN, segments)?;
    if table.len() < segments {
        return Ok(None);
    }
    let body_len: u64 = table.iter().map(|b| u64::from(*b)).sum();
    let body_start = pos + OGG_PAGE_HEADER_LEN + segments as u64;
    Ok(Some(OggPage {
        granule: u64::from_le_bytes(granule),
        body: body_start..(body_start + body_len).min(end),
    }))
}
