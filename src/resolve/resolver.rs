//! Turns loosely spoken names into catalog entries.
//!
//! Every lookup normalizes the query, tries an exact match on the search
//! key and, only if that finds nothing, retries once with a wildcard
//! pattern. Which wildcard each kind of lookup uses is set by
//! [`MatchPolicy`].

use serde::Serialize;
use tracing::debug;
use crate::database::repo::{Catalog, NameFilter, Result};
use crate::utils::grammar::normalize;

/// How a fuzzy retry widens the normalized query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wildcard {
    /// Stored key ends with the query.
    Suffix,
    /// Stored key contains the query.
    Substring,
}

impl Wildcard {
    fn filter(self, key: &str) -> NameFilter {
        match self {
            Wildcard::Suffix => NameFilter::suffix(key),
            Wildcard::Substring => NameFilter::substring(key),
        }
    }
}

/// The fuzzy pattern used by each kind of lookup.
///
/// Artist lookups only widen to the left while album lookups widen on both
/// sides. The artist filter inside album lookups is a substring match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub artist: Wildcard,
    pub album: Wildcard,
    pub album_artist: Wildcard,
    pub song: Wildcard,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            artist: Wildcard::Suffix,
            album: Wildcard::Substring,
            album_artist: Wildcard::Substring,
            song: Wildcard::Substring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongMatch {
    pub id: i64,
    pub title: String,
}

pub struct Resolver<'a> {
    catalog: &'a Catalog,
    policy: MatchPolicy,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self::with_policy(catalog, MatchPolicy::default())
    }

    pub fn with_policy(catalog: &'a Catalog, policy: MatchPolicy) -> Self {
        Self { catalog, policy }
    }

    /// Canonical display name of the single artist matching `query`.
    pub fn resolve_artist(&self, query: &str) -> Result<Option<String>> {
        self.resolve_unique(query, self.policy.artist, |filter| self.catalog.artist_names(filter))
    }

    pub fn resolve_song(&self, query: &str) -> Result<Option<SongMatch>> {
        let found = self.resolve_unique(query, self.policy.song, |filter| {
            self.catalog.songs_by_title(filter)
        })?;
        Ok(found.map(|(id, title)| SongMatch { id, title }))
    }

    /// Finds an album id, widening the artist before the album.
    pub fn resolve_album(&self, album: &str, artist: Option<&str>) -> Result<Option<i64>> {
        let album_key = normalize(album);
        if album_key.is_empty() {
            return Ok(None);
        }

        let exact_album = NameFilter::exact(&album_key);
        let fuzzy_album = self.policy.album.filter(&album_key);

        let attempts = match artist.map(normalize) {
            Some(artist_key) => {
                let exact_artist = NameFilter::exact(&artist_key);
                let fuzzy_artist = self.policy.album_artist.filter(&artist_key);
                vec![
                    (exact_album.clone(), Some(exact_artist)),
                    (exact_album, Some(fuzzy_artist.clone())),
                    (fuzzy_album, Some(fuzzy_artist)),
                ]
            }
            None => vec![(exact_album, None), (fuzzy_album, None)],
        };

        for (album_filter, artist_filter) in &attempts {
            let ids = self.catalog.album_ids(album_filter, artist_filter.as_ref())?;
            if let Some(id) = ids.first() {
                debug!("Album '{}' resolved via {:?} / {:?}", album, album_filter, artist_filter);
                return Ok(Some(*id));
            }
        }

        Ok(None)
    }

    /// Album names for the artist, in catalog order. Empty when nothing matches.
    pub fn list_albums_by_artist(&self, artist: &str) -> Result<Vec<String>> {
        let key = normalize(artist);
        if key.is_empty() {
            return Ok(Vec::new());
        }

        let albums = self.catalog.album_names_by_artist(&NameFilter::exact(&key))?;
        if !albums.is_empty() {
            return Ok(albums);
        }
        self.catalog
            .album_names_by_artist(&self.policy.album_artist.filter(&key))
    }

    /// Song ids of an album in disc then track order.
    pub fn songs_for_album(&self, album_id: i64) -> Result<Vec<i64>> {
        self.catalog.song_ids_for_album(album_id)
    }

    /// Exact pass, then one fuzzy pass. More than one hit on either pass is
    /// ambiguous and resolves to nothing.
    fn resolve_unique<T, F>(&self, query: &str, wildcard: Wildcard, lookup: F) -> Result<Option<T>>
    where
        F: Fn(&NameFilter) -> Result<Vec<T>>,
    {
        let key = normalize(query);
        if key.is_empty() {
            return Ok(None);
        }

        for filter in [NameFilter::exact(&key), wildcard.filter(&key)] {
            let mut rows = lookup(&filter)?;
            match rows.len() {
                0 => continue,
                1 => return Ok(rows.pop()),
                n => {
                    debug!("'{}' is ambiguous: {} matches for {:?}", query, n, filter);
                    return Ok(None);
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repo::{IntegrityPolicy, SongRow};

    struct Fixture {
        catalog: Catalog,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            Ok(Self { catalog: Catalog::open_in_memory()? })
        }

        fn album(&self, artist: &str, album: &str) -> Result<i64> {
            let artist_id = self.catalog.get_or_create_artist(artist)?;
            self.catalog.get_or_create_album(album, artist_id)
        }

        fn song(&self, artist: &str, album: &str, title: &str, disc: u32, track: u32) -> Result<()> {
            let artist_id = self.catalog.get_or_create_artist(artist)?;
            let album_id = self.catalog.get_or_create_album(album, artist_id)?;
            let row = SongRow {
                title: title.to_string(),
                search_title: normalize(title),
                path: format!("/music/{artist}/{album}/{disc}-{track}.mp3"),
                disc_number: Some(disc),
                track_number: Some(track),
                last_modified: None,
                artist_id,
                album_id,
            };
            self.catalog.bulk_insert_songs(&[row], IntegrityPolicy::Abort)?;
            Ok(())
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver::new(&self.catalog)
        }
    }

    #[test]
    fn test_resolve_artist_exact() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("The Beatles", "Abbey Road")?;

        assert_eq!(fx.resolver().resolve_artist("the beatles")?.as_deref(), Some("The Beatles"));
        assert_eq!(fx.resolver().resolve_artist("Beatles")?.as_deref(), Some("The Beatles"));
        assert_eq!(fx.resolver().resolve_artist("beatlez")?, None);
        Ok(())
    }

    #[test]
    fn test_resolve_artist_fuzzy_is_suffix_only() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Florence and the Machine", "Lungs")?;

        // Stored key is "florence and machine": a suffix pattern reaches the
        // tail of the name, never its head.
        assert_eq!(
            fx.resolver().resolve_artist("machine")?.as_deref(),
            Some("Florence and the Machine")
        );
        assert_eq!(fx.resolver().resolve_artist("florence")?, None);
        Ok(())
    }

    #[test]
    fn test_substring_policy_widens_artist_lookup() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Florence and the Machine", "Lungs")?;

        let policy = MatchPolicy { artist: Wildcard::Substring, ..MatchPolicy::default() };
        let resolver = Resolver::with_policy(&fx.catalog, policy);
        assert_eq!(
            resolver.resolve_artist("florence")?.as_deref(),
            Some("Florence and the Machine")
        );
        Ok(())
    }

    #[test]
    fn test_ambiguous_artist_is_no_result() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Beach House", "Bloom")?;
        fx.album("Full House", "Live")?;

        assert_eq!(fx.resolver().resolve_artist("house")?, None);
        Ok(())
    }

    #[test]
    fn test_exact_match_wins_over_fuzzy_candidates() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Genesis", "Selling England by the Pound")?;
        fx.album("Sons of Genesis", "Fire")?;

        assert_eq!(fx.resolver().resolve_artist("genesis")?.as_deref(), Some("Genesis"));
        Ok(())
    }

    #[test]
    fn test_empty_query_is_no_result() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Radiohead", "Kid A")?;

        assert_eq!(fx.resolver().resolve_artist("the")?, None);
        assert_eq!(fx.resolver().resolve_album("", None)?, None);
        assert!(fx.resolver().list_albums_by_artist("")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_resolve_album_exact_artist_and_album() -> Result<()> {
        let fx = Fixture::new()?;
        let abbey_road = fx.album("The Beatles", "Abbey Road")?;
        fx.album("The Beatles", "Let It Be")?;

        assert_eq!(fx.resolver().resolve_album("abbey road", Some("the beatles"))?, Some(abbey_road));
        Ok(())
    }

    #[test]
    fn test_resolve_album_escalates_to_fuzzy_artist() -> Result<()> {
        let fx = Fixture::new()?;
        let abbey_road = fx.album("Beatles, The", "Abbey Road")?;

        // Stored key is "beatles,", so the exact artist pass misses.
        assert_eq!(fx.resolver().resolve_album("Abbey Road", Some("Beatles"))?, Some(abbey_road));
        Ok(())
    }

    #[test]
    fn test_resolve_album_escalates_to_fuzzy_album() -> Result<()> {
        let fx = Fixture::new()?;
        let white_album = fx.album("The Beatles", "The Beatles (The White Album)")?;

        assert_eq!(
            fx.resolver().resolve_album("white album", Some("beatles"))?,
            Some(white_album)
        );
        Ok(())
    }

    #[test]
    fn test_resolve_album_without_artist() -> Result<()> {
        let fx = Fixture::new()?;
        let ok_computer = fx.album("Radiohead", "OK Computer")?;

        assert_eq!(fx.resolver().resolve_album("ok computer", None)?, Some(ok_computer));
        assert_eq!(fx.resolver().resolve_album("computer", None)?, Some(ok_computer));
        assert_eq!(fx.resolver().resolve_album("ok computer", Some("Muse"))?, None);
        Ok(())
    }

    #[test]
    fn test_list_albums_by_artist_in_catalog_order() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("Radiohead", "Pablo Honey")?;
        fx.album("Radiohead", "The Bends")?;
        fx.album("Muse", "Showbiz")?;
        fx.album("Radiohead", "OK Computer")?;

        assert_eq!(
            fx.resolver().list_albums_by_artist("radiohead")?,
            vec!["Pablo Honey", "The Bends", "OK Computer"]
        );
        Ok(())
    }

    #[test]
    fn test_list_albums_by_artist_fuzzy() -> Result<()> {
        let fx = Fixture::new()?;
        fx.album("The Smashing Pumpkins", "Siamese Dream")?;

        assert_eq!(fx.resolver().list_albums_by_artist("smashing")?, vec!["Siamese Dream"]);
        assert!(fx.resolver().list_albums_by_artist("nirvana")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_songs_for_album_follow_disc_and_track() -> Result<()> {
        let fx = Fixture::new()?;
        fx.song("The Beatles", "The Beatles", "Birthday", 2, 1)?;
        fx.song("The Beatles", "The Beatles", "Dear Prudence", 1, 2)?;
        fx.song("The Beatles", "The Beatles", "Back in the U.S.S.R.", 1, 1)?;

        let resolver = fx.resolver();
        let album = resolver.resolve_album("beatles", Some("beatles"))?.unwrap_or_default();
        let titles: Vec<String> = resolver
            .songs_for_album(album)?
            .into_iter()
            .map(|id| fx.catalog.song_path(id).map(|p| p.unwrap_or_default()))
            .collect::<Result<_>>()?;

        assert_eq!(
            titles,
            vec![
                "/music/The Beatles/The Beatles/1-1.mp3",
                "/music/The Beatles/The Beatles/1-2.mp3",
                "/music/The Beatles/The Beatles/2-1.mp3",
            ]
        );
        Ok(())
    }

    #[test]
    fn test_resolve_song() -> Result<()> {
        let fx = Fixture::new()?;
        fx.song("Radiohead", "OK Computer", "Paranoid Android", 1, 2)?;
        fx.song("Radiohead", "OK Computer", "Karma Police", 1, 6)?;

        let found = fx.resolver().resolve_song("karma")?;
        assert_eq!(found.map(|s| s.title).as_deref(), Some("Karma Police"));
        assert_eq!(fx.resolver().resolve_song("creep")?, None);
        Ok(())
    }
}
