//! Synthetic audio files for tests
//!
//! Tiny but well-formed WAV, MP3 and FLAC streams with caller-chosen tags,
//! so tests never depend on real recordings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Length of one MPEG-1 Layer III frame at 128 kbps / 44.1 kHz, no padding
pub const MPEG_FRAME_LEN: usize = 417;

/// `count` MPEG-1 Layer III frames whose bodies are derived from `seed`.
///
/// Different seeds give different payloads; body bytes never contain 0xFF so
/// no false frame sync appears.
pub fn mpeg_frames(count: usize, seed: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(count * MPEG_FRAME_LEN);
    for frame in 0..count {
        out.extend([0xFF, 0xFB, 0x90, 0x00]);
        out.extend((0..MPEG_FRAME_LEN - 4).map(|i| {
            let value = (i + frame * 7 + usize::from(seed) * 31) % 0xF0;
            value as u8
        }));
    }
    out
}

fn syncsafe(n: usize) -> [u8; 4] {
    [
        ((n >> 21) & 0x7F) as u8,
        ((n >> 14) & 0x7F) as u8,
        ((n >> 7) & 0x7F) as u8,
        (n & 0x7F) as u8,
    ]
}

/// ID3v2.3 tag with Latin-1 text frames, e.g. `("TIT2", "Title")`
pub fn id3v2_tag(frames: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, text) in frames {
        body.extend(id.as_bytes());
        body.extend(((text.len() + 1) as u32).to_be_bytes());
        body.extend([0, 0]);
        body.push(0); // ISO-8859-1
        body.extend(text.as_bytes());
    }
    body.extend([0u8; 16]); // padding

    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend(syncsafe(body.len()));
    tag.extend(body);
    tag
}

/// MP3 file: an ID3v2 tag followed by `frames`
pub fn mp3(frames: &[u8], tags: &[(&str, &str)]) -> Vec<u8> {
    let mut out = if tags.is_empty() {
        Vec::new()
    } else {
        id3v2_tag(tags)
    };
    out.extend(frames);
    out
}

/// FLAC file: STREAMINFO, a Vorbis comment block, then `audio` as frame data.
///
/// Comments are `("TITLE", "...")` pairs.
pub fn flac(audio: &[u8], comments: &[(&str, &str)]) -> Vec<u8> {
    let mut out = b"fLaC".to_vec();

    // STREAMINFO: 4096-sample blocks, 44.1 kHz, stereo, 16 bit, one second
    out.extend([0x00, 0x00, 0x00, 34]);
    out.extend(4096u16.to_be_bytes());
    out.extend(4096u16.to_be_bytes());
    out.extend([0u8; 6]);
    let packed: u64 = (44_100u64 << 44) | (1u64 << 41) | (15u64 << 36) | 44_100u64;
    out.extend(packed.to_be_bytes());
    out.extend([0u8; 16]);

    let vendor = b"muman test";
    let mut block = Vec::new();
    block.extend((vendor.len() as u32).to_le_bytes());
    block.extend(vendor);
    block.extend((comments.len() as u32).to_le_bytes());
    for (key, value) in comments {
        let entry = format!("{key}={value}");
        block.extend((entry.len() as u32).to_le_bytes());
        block.extend(entry.as_bytes());
    }
    let len = block.len() as u32;
    out.extend([0x84, (len >> 16) as u8, (len >> 8) as u8, len as u8]);
    out.extend(block);

    out.extend(audio);
    out
}

/// Mono 16-bit 8 kHz WAV with a LIST/INFO chunk built from `info`, e.g.
/// `("INAM", "Title")`
pub fn wav(samples: &[u8], info: &[(&str, &str)]) -> Vec<u8> {
    let mut chunks = Vec::new();

    chunks.extend(b"fmt ");
    chunks.extend(16u32.to_le_bytes());
    chunks.extend(1u16.to_le_bytes()); // PCM
    chunks.extend(1u16.to_le_bytes()); // mono
    chunks.extend(8000u32.to_le_bytes());
    chunks.extend(16_000u32.to_le_bytes());
    chunks.extend(2u16.to_le_bytes());
    chunks.extend(16u16.to_le_bytes());

    if !info.is_empty() {
        let mut list = b"INFO".to_vec();
        for (id, text) in info {
            list.extend(id.as_bytes());
            list.extend((text.len() as u32).to_le_bytes());
            list.extend(text.as_bytes());
            if text.len() % 2 == 1 {
                list.push(0);
            }
        }
        chunks.extend(b"LIST");
        chunks.extend((list.len() as u32).to_le_bytes());
        chunks.extend(list);
    }

    chunks.extend(b"data");
    chunks.extend((samples.len() as u32).to_le_bytes());
    chunks.extend(samples);
    if samples.len() % 2 == 1 {
        chunks.push(0);
    }

    let mut out = b"RIFF".to_vec();
    out.extend(((chunks.len() + 4) as u32).to_le_bytes());
    out.extend(b"WAVE");
    out.extend(chunks);
    out
}

/// Deterministic 16-bit sample bytes
pub fn pcm_samples(frames: usize, seed: u8) -> Vec<u8> {
    (0..frames * 2)
        .map(|i| ((i * 13 + usize::from(seed) * 101) % 256) as u8)
        .collect()
}

/// Write `bytes` to `dir/name`, creating parent directories
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Set the modification time of `path`
pub fn set_mtime(path: &Path, time: SystemTime) -> io::Result<()> {
    fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(time)
}
