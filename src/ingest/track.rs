use serde::Serialize;

/// Metadata pulled from one audio file, before it is resolved against the
/// catalog. A track without a title is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub title: Option<String>,
    pub album_name: String,
    pub artist_name: String,
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    pub path: String,
    pub last_modified: Option<i64>,
}
