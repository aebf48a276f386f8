use std::collections::HashSet;
use std::sync::Arc;
use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};
use crate::database::repo::{Catalog, IntegrityPolicy, SongRow};
use crate::error::CatalogError;
use crate::ingest::track::Track;
use crate::utils::grammar::normalize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    /// Tracks taken off the queue.
    pub processed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub untagged: usize,
}

impl FlushSummary {
    pub(crate) fn absorb(&mut self, other: &FlushSummary) {
        self.processed += other.processed;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.untagged += other.untagged;
    }
}

/// Remembers the id resolved for the previous track so runs of songs by the
/// same artist (or from the same album) skip the catalog round trip.
struct LastResolved<K> {
    entry: Option<(K, i64)>,
}

impl<K: PartialEq> LastResolved<K> {
    fn new() -> Self {
        Self { entry: None }
    }

    fn resolve<F>(&mut self, key: K, lookup: F) -> Result<i64, CatalogError>
    where
        F: FnOnce(&K) -> Result<i64, CatalogError>,
    {
        if let Some((cached, id)) = &self.entry {
            if *cached == key {
                return Ok(*id);
            }
        }

        let id = lookup(&key)?;
        self.entry = Some((key, id));
        Ok(id)
    }
}

/// Collects extracted tracks from scanner workers and writes them to the
/// catalog in batches.
pub struct BatchLoader {
    catalog: Arc<Catalog>,
    queue: SegQueue<Track>,
    policy: IntegrityPolicy,
    // Held for the duration of a flush; only one drain runs at a time.
    totals: Mutex<FlushSummary>,
}

impl BatchLoader {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_policy(catalog, IntegrityPolicy::default())
    }

    pub fn with_policy(catalog: Arc<Catalog>, policy: IntegrityPolicy) -> Self {
        Self {
            catalog,
            queue: SegQueue::new(),
            policy,
            totals: Mutex::new(FlushSummary::default()),
        }
    }

    pub fn enqueue(&self, track: Track) {
        self.queue.push(track);
    }

    /// Number of tracks waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Cumulative counts over every flush so far.
    pub fn totals(&self) -> FlushSummary {
        *self.totals.lock()
    }

    /// Drains the queue and writes every new song in one bulk insert.
    ///
    /// An [`CatalogError::IntegrityViolation`] means the batch was abandoned
    /// and nothing from it was written. Callers are expected to stop.
    pub fn flush(&self) -> Result<FlushSummary, CatalogError> {
        let mut totals = self.totals.lock();

        let mut summary = FlushSummary::default();
        let mut rows = Vec::new();
        let mut batch_paths = HashSet::new();
        let mut artist_cache = LastResolved::new();
        let mut album_cache = LastResolved::new();

        while let Some(track) = self.queue.pop() {
            summary.processed += 1;

            let Some(title) = track.title else {
                debug!("Skipping untagged file {}", track.path);
                summary.untagged += 1;
                continue;
            };

            if batch_paths.contains(&track.path) || self.catalog.song_path_exists(&track.path)? {
                summary.duplicates += 1;
                continue;
            }

            let artist_id = artist_cache.resolve(track.artist_name, |name| {
                self.catalog.get_or_create_artist(name)
            })?;
            let album_id = album_cache.resolve((track.album_name, artist_id), |(name, artist_id)| {
                self.catalog.get_or_create_album(name, *artist_id)
            })?;

            batch_paths.insert(track.path.clone());
            rows.push(SongRow {
                search_title: normalize(&title),
                title,
                path: track.path,
                disc_number: track.disc_number,
                track_number: track.track_number,
                last_modified: track.last_modified,
                artist_id,
                album_id,
            });
        }

        summary.inserted = match self.catalog.bulk_insert_songs(&rows, self.policy) {
            Ok(inserted) => inserted,
            Err(e) => {
                if e.is_integrity_violation() {
                    error!("Abandoning batch of {} songs: {}", rows.len(), e);
                }
                return Err(e);
            }
        };

        // Rows ignored under SkipDuplicates lost a race with another writer.
        summary.duplicates += rows.len() - summary.inserted;
        totals.absorb(&summary);
        info!(
            "Flushed {} tracks: {} inserted, {} already known, {} untagged",
            summary.processed, summary.inserted, summary.duplicates, summary.untagged
        );

        Ok(summary)
    }
}
