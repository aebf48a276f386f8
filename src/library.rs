use std::path::{Path, PathBuf};
use std::sync::Arc;
use anyhow::{Result, Context};
use tracing::info;
use crate::database::repo::{Catalog, IntegrityPolicy};
use crate::ingest::extractor::{LoftyExtractor, TagExtractor};
use crate::ingest::loader::BatchLoader;
use crate::ingest::scanner::{ScanOptions, ScanSummary, Scanner};
use crate::media::stream::StreamSource;
use crate::playback::queue::{stream_urls, PlaybackQueue};
use crate::resolve::resolver::{MatchPolicy, Resolver};
use crate::utils::config::Settings;

#[derive(Debug, Clone)]
pub struct AlbumPlayback {
    pub album_id: i64,
    pub album_name: String,
    pub artist_name: String,
    pub queue: PlaybackQueue,
}

/// Everything a running jukebox shares: settings, the catalog and the loader
/// that writes into it. Built once at startup and handed out by reference.
pub struct Library {
    settings: Settings,
    catalog: Arc<Catalog>,
    loader: Arc<BatchLoader>,
    policy: MatchPolicy,
}

impl Library {
    pub fn open(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let catalog = Catalog::open(&settings.db_path)
            .with_context(|| format!("Failed to open catalog at {:?}", settings.db_path))?;
        Ok(Self::with_catalog(settings, catalog))
    }

    pub fn with_catalog(settings: Settings, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        let loader = Arc::new(BatchLoader::with_policy(Arc::clone(&catalog), IntegrityPolicy::Abort));
        Self {
            settings,
            catalog,
            loader,
            policy: MatchPolicy::default(),
        }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::with_policy(&self.catalog, self.policy)
    }

    pub fn scan(&self, root: &Path, progress: bool) -> Result<ScanSummary> {
        self.scan_with(root, Arc::new(LoftyExtractor), progress)
    }

    pub fn scan_with(&self, root: &Path, extractor: Arc<dyn TagExtractor>, progress: bool) -> Result<ScanSummary> {
        let options = ScanOptions {
            progress,
            ..ScanOptions::from(&self.settings)
        };
        Scanner::new(extractor, Arc::clone(&self.loader), options).scan(root)
    }

    pub fn stream_source(&self, song_id: i64) -> Result<Option<StreamSource>> {
        let Some(path) = self.catalog.song_path(song_id)? else {
            return Ok(None);
        };

        Ok(Some(StreamSource::for_song(song_id, PathBuf::from(path))?))
    }

    /// Resolves an album and lines its songs up for playback, first song
    /// current.
    pub fn play_album(&self, album: &str, artist: Option<&str>) -> Result<Option<AlbumPlayback>> {
        let resolver = self.resolver();
        let Some(album_id) = resolver.resolve_album(album, artist)? else {
            return Ok(None);
        };

        let songs = resolver.songs_for_album(album_id)?;
        if songs.is_empty() {
            return Ok(None);
        }

        let album_name = self.catalog.album_name(album_id)?.unwrap_or_default();
        let artist_name = self.catalog.artist_name_for_album(album_id)?.unwrap_or_default();

        let mut queue = PlaybackQueue::default();
        queue.start(stream_urls(&self.settings.base_url, &songs));

        info!("Playing the album {} by {} ({} songs)", album_name, artist_name, songs.len());
        Ok(Some(AlbumPlayback {
            album_id,
            album_name,
            artist_name,
            queue,
        }))
    }
}
