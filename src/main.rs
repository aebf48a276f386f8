use std::path::PathBuf;
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use jukebox::Library;
use jukebox::utils::config::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file with JUKEBOX_* entries
    #[arg(short, long, default_value = ".env")]
    env_file: PathBuf,

    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Hide the scan progress spinner
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add every tagged audio file under DIR to the catalog
    Scan {
        dir: Option<PathBuf>,

        #[arg(short, long)]
        workers: Option<usize>,

        #[arg(short, long)]
        buffer: Option<usize>,
    },
    /// Resolve an artist name
    Artist { name: String },
    /// Resolve an album, optionally by artist
    Album {
        name: String,

        #[arg(short, long)]
        artist: Option<String>,
    },
    /// List the albums of an artist
    Albums { artist: String },
    /// Resolve a song title
    Song { title: String },
    /// Build the playback queue for an album
    Play {
        album: String,

        #[arg(short, long)]
        artist: Option<String>,
    },
    /// Show the file behind a song id
    Path { song_id: i64 },
    /// Count catalog rows
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut settings = Settings::load(&args.env_file)?;
    if let Some(db_path) = &args.db_path {
        settings.db_path = db_path.clone();
    }
    if let Command::Scan { workers, buffer, .. } = &args.command {
        settings.max_workers = workers.unwrap_or(settings.max_workers);
        settings.buffer_size = buffer.unwrap_or(settings.buffer_size);
    }

    info!("Catalog: {:?}", settings.db_path);
    let library = Library::open(settings)?;
    let json = args.json;

    match args.command {
        Command::Scan { dir, .. } => {
            let dir = dir
                .or_else(|| library.settings().library_path.clone())
                .ok_or_else(|| anyhow!("No library directory given; pass DIR or set JUKEBOX_LIBRARY_PATH"))?;

            // An integrity violation surfaces here and ends the process with an error.
            let summary = library.scan(&dir, !args.quiet)?;
            emit(json, &summary, || {
                format!(
                    "Scanned {} audio files: {} new songs, {} already known, {} unreadable",
                    summary.recognized, summary.loaded.inserted, summary.loaded.duplicates, summary.failed
                )
            })
        }
        Command::Artist { name } => {
            let found = library.resolver().resolve_artist(&name)?;
            emit(json, &json!({ "query": name, "artist": found }), || match &found {
                Some(artist) => artist.clone(),
                None => "I could not find that artist in your library".to_string(),
            })
        }
        Command::Album { name, artist } => {
            let album_id = library.resolver().resolve_album(&name, artist.as_deref())?;
            let (album, by) = match album_id {
                Some(id) => (library.catalog().album_name(id)?, library.catalog().artist_name_for_album(id)?),
                None => (None, None),
            };
            emit(json, &json!({ "album_id": album_id, "album": album, "artist": by }), || {
                match (&album, &by) {
                    (Some(album), Some(by)) => format!("{} by {}", album, by),
                    _ => "I could not find that album in your library".to_string(),
                }
            })
        }
        Command::Albums { artist } => {
            let resolver = library.resolver();
            let albums = resolver.list_albums_by_artist(&artist)?;
            let real_name = resolver.resolve_artist(&artist)?.unwrap_or_else(|| artist.clone());
            emit(json, &json!({ "artist": real_name, "albums": albums }), || {
                format!(
                    "I have found {} albums by {} in your library: {}",
                    albums.len(),
                    real_name,
                    spoken_list(&albums)
                )
            })
        }
        Command::Song { title } => {
            let found = library.resolver().resolve_song(&title)?;
            emit(json, &found, || match &found {
                Some(song) => format!("{} (song {})", song.title, song.id),
                None => "I could not find that song in your library".to_string(),
            })
        }
        Command::Play { album, artist } => {
            let playback = library.play_album(&album, artist.as_deref())?;
            let status = playback.as_ref().map(|p| {
                json!({
                    "album": p.album_name,
                    "artist": p.artist_name,
                    "status": p.queue.status(),
                })
            });
            emit(json, &status, || match &playback {
                Some(p) => format!(
                    "Playing the album {} by {}: {}",
                    p.album_name,
                    p.artist_name,
                    p.queue.current().unwrap_or_default()
                ),
                None => "I could not find that album in your library".to_string(),
            })
        }
        Command::Path { song_id } => {
            let source = library.stream_source(song_id)?;
            emit(json, &source, || match &source {
                Some(source) => format!("{} ({})", source.path.display(), source.mime),
                None => format!("No song with id {}", song_id),
            })
        }
        Command::Stats => {
            let stats = library.catalog().stats()?;
            emit(json, &stats, || {
                format!("{} artists, {} albums, {} songs", stats.artists, stats.albums, stats.songs)
            })
        }
    }
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

/// "a", "a, and b", "a, b, and c"
fn spoken_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}
