/// Metadata extractor implementation using lofty
use crate::container::has_mpeg_sync;
use crate::error::{ExtractError, Result};
use crate::normalize::{normalize_isrc, parse_position, parse_year};
use lofty::{Accessor, AudioFile, FileType, ItemKey, Probe, Tag, TaggedFileExt};
use muman_core::{AudioFormat, Field, MetadataExtractor, ReadSeek, TrackMetadata};
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// Metadata extractor using the lofty library
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyExtractor;

impl LoftyExtractor {
    /// Create a new extractor
    pub fn new() -> Self {
        Self
    }

    /// Read and normalize metadata, keeping the extraction error type
    pub fn read(&self, path: &Path, reader: &mut dyn ReadSeek) -> Result<TrackMetadata> {
        reader.seek(SeekFrom::Start(0))?;
        let guessed = Probe::new(&mut *reader).guess_file_type()?.file_type();
        let file_type = match guessed {
            Some(file_type) => file_type,
            None => Self::fallback_type(path, reader)?,
        };
        let format = audio_format(&file_type)?;

        reader.seek(SeekFrom::Start(0))?;
        let tagged_file = Probe::with_file_type(&mut *reader, file_type).read()?;

        let mut metadata = match tagged_file.primary_tag().or(tagged_file.first_tag()) {
            Some(tag) => Self::extract_from_tag(tag, format),
            None => TrackMetadata::unknown(format),
        };

        let millis = tagged_file.properties().duration().as_millis();
        metadata.duration_ms = u64::try_from(millis).ok().filter(|ms| *ms > 0).into();

        trace!(path = %path.display(), format = %format, "Extracted metadata");
        Ok(metadata)
    }

    /// Container type from the file extension, when the stream's magic bytes
    /// were not recognized
    fn fallback_type(path: &Path, reader: &mut dyn ReadSeek) -> Result<FileType> {
        let file_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(FileType::from_ext)
            .ok_or_else(|| {
                ExtractError::UnsupportedFormat(format!(
                    "unrecognized container: {}",
                    path.display()
                ))
            })?;

        if file_type == FileType::Mpeg && !has_mpeg_sync(reader)? {
            return Err(ExtractError::CorruptData(format!(
                "no MPEG frame sync in {}",
                path.display()
            )));
        }
        Ok(file_type)
    }

    fn extract_from_tag(tag: &Tag, format: AudioFormat) -> TrackMetadata {
        let mut metadata = TrackMetadata::unknown(format);

        metadata.title = Field::from_text(tag.title().as_deref());
        metadata.artist = Field::from_text(tag.artist().as_deref());
        metadata.album = Field::from_text(tag.album().as_deref());
        metadata.album_artist = Field::from_text(tag.get_string(&ItemKey::AlbumArtist));
        metadata.genre = Field::from_text(tag.genre().as_deref());

        metadata.year = parse_year(tag.get_string(&ItemKey::Year))
            .or(parse_year(tag.get_string(&ItemKey::RecordingDate)))
            .or(tag.year().filter(|y| *y > 0).into());

        metadata.track_number = parse_position(tag.get_string(&ItemKey::TrackNumber));
        metadata.disc_number = parse_position(tag.get_string(&ItemKey::DiscNumber));

        metadata.isrc = normalize_isrc(tag.get_string(&ItemKey::Isrc));

        metadata
    }
}

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path, reader: &mut dyn ReadSeek) -> muman_core::Result<TrackMetadata> {
        Ok(self.read(path, reader)?)
    }
}

fn audio_format(file_type: &FileType) -> Result<AudioFormat> {
    match file_type {
        FileType::Mpeg => Ok(AudioFormat::Mp3),
        FileType::Flac => Ok(AudioFormat::Flac),
        FileType::Vorbis | FileType::Speex => Ok(AudioFormat::Ogg),
        FileType::Opus => Ok(AudioFormat::Opus),
        FileType::Wav => Ok(AudioFormat::Wav),
        FileType::Aiff => Ok(AudioFormat::Aiff),
        FileType::Mp4 => Ok(AudioFormat::Mp4),
        FileType::Aac => Ok(AudioFormat::Aac),
        FileType::Ape => Ok(AudioFormat::Ape),
        FileType::WavPack => Ok(AudioFormat::WavPack),
        other => Err(ExtractError::UnsupportedFormat(format!("{other:?}"))),
    }
}
