use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use serde::Serialize;
use crate::ingest::extractor::Container;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// What the streaming endpoint needs to serve one song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSource {
    pub song_id: i64,
    pub path: PathBuf,
    pub mime: String,
}

impl StreamSource {
    /// Sniffs the content type from the file's leading bytes. Files `infer`
    /// cannot place are typed by their container instead.
    pub fn for_song(song_id: i64, path: PathBuf) -> Result<Self> {
        let sniffed = infer::get_from_path(&path)
            .with_context(|| format!("Failed to read {:?} for streaming", path))?;

        let mime = match sniffed {
            Some(kind) => kind.mime_type(),
            None => container_mime(&path),
        };

        Ok(Self { song_id, path, mime: mime.to_string() })
    }
}

fn container_mime(path: &Path) -> &'static str {
    let raw_aac = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("aac"));

    match Container::from_path(path) {
        Some(Container::Id3) if raw_aac => "audio/aac",
        Some(Container::Id3) => "audio/mpeg",
        Some(Container::Mp4) => "audio/mp4",
        None => OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_sniffed_type_wins() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tagged.m4a");
        fs::write(&path, b"ID3\x04\x00\x00\x00\x00\x00\x00")?;

        let source = StreamSource::for_song(7, path.clone())?;
        assert_eq!(source.mime, "audio/mpeg");
        assert_eq!(source.path, path);
        assert_eq!(source.song_id, 7);
        Ok(())
    }

    #[test]
    fn test_container_fallback() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cases = [
            ("song.mp3", "audio/mpeg"),
            ("song.AAC", "audio/aac"),
            ("song.m4a", "audio/mp4"),
            ("book.m4b", "audio/mp4"),
            ("notes.bin", OCTET_STREAM),
        ];

        for (name, expected) in cases {
            let path = dir.path().join(name);
            fs::write(&path, b"")?;
            assert_eq!(StreamSource::for_song(1, path)?.mime, expected, "{name}");
        }
        Ok(())
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(StreamSource::for_song(1, PathBuf::from("/nonexistent/song.mp3")).is_err());
    }
}
