use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use lofty::prelude::{Accessor, ItemKey, TaggedFileExt};
use lofty::tag::{Tag, TagType};
use crate::error::ExtractionError;
use crate::ingest::track::Track;

/// Audio containers the scanner hands to an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// `mp3` and `aac`, tagged with ID3v2 frames.
    Id3,
    /// `m4a`, `m4b`, `m4p` and `mp4`, tagged with iTunes-style atoms.
    Mp4,
}

impl Container {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" | "aac" => Some(Container::Id3),
            "m4a" | "m4b" | "m4p" | "mp4" => Some(Container::Mp4),
            _ => None,
        }
    }

    fn tag_type(self) -> TagType {
        match self {
            Container::Id3 => TagType::Id3v2,
            Container::Mp4 => TagType::Mp4Ilst,
        }
    }

    /// Artist fields in order of preference. ID3 files favour the album
    /// artist (TPE2); MP4 files fall back to the composer.
    fn artist_keys(self) -> [ItemKey; 2] {
        match self {
            Container::Id3 => [ItemKey::AlbumArtist, ItemKey::TrackArtist],
            Container::Mp4 => [ItemKey::TrackArtist, ItemKey::Composer],
        }
    }
}

/// Reads a [`Track`] out of an audio file.
pub trait TagExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Track, ExtractionError>;
}

/// Tag extractor backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl TagExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Result<Track, ExtractionError> {
        let container = Container::from_path(path)
            .ok_or_else(|| ExtractionError::UnrecognizedFormat(path.display().to_string()))?;

        let tagged_file = lofty::read_from_path(path)?;
        let tag = tagged_file
            .tag(container.tag_type())
            .or_else(|| tagged_file.primary_tag())
            .ok_or(ExtractionError::MissingTag)?;

        Ok(Track {
            title: tag.title().map(|t| t.to_string()),
            album_name: tag.album().map(|a| a.to_string()).unwrap_or_default(),
            artist_name: artist_name(tag, container),
            disc_number: tag.disk(),
            track_number: tag.track(),
            path: path.to_string_lossy().to_string(),
            last_modified: last_modified(path)?,
        })
    }
}

fn artist_name(tag: &Tag, container: Container) -> String {
    container
        .artist_keys()
        .iter()
        .find_map(|key| tag.get_string(key))
        .unwrap_or_default()
        .to_string()
}

fn last_modified(path: &Path) -> Result<Option<i64>, ExtractionError> {
    let modified = fs::metadata(path)?.modified().ok();
    Ok(modified
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs() as i64))
}
