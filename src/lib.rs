//! Music catalog for a voice-driven jukebox.
//!
//! A directory of audio files is scanned into a SQLite catalog of artists,
//! albums and songs. Spoken-style names are then resolved against it and
//! turned into a playback queue.

pub mod error;
pub mod library;

pub mod database {
    pub mod repo;
    pub mod schema;
}

pub mod ingest {
    pub mod extractor;
    pub mod loader;
    pub mod scanner;
    pub mod track;
}

pub mod media {
    pub mod stream;
}

pub mod playback {
    pub mod queue;
}

pub mod resolve {
    pub mod resolver;
}

pub mod utils {
    pub mod config;
    pub mod grammar;
}

pub use crate::library::Library;
pub use crate::utils::grammar::normalize;
