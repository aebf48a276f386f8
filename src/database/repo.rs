use std::fs;
use std::path::Path;
use parking_lot::Mutex;
use rusqlite::types::{FromSql, ToSql};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};
use crate::database::schema::SCHEMA;
use crate::error::{CatalogError, is_constraint_violation};
use crate::utils::grammar::normalize;

pub type Result<T> = std::result::Result<T, CatalogError>;

/// A fully resolved song, ready for the bulk insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRow {
    pub title: String,
    pub search_title: String,
    pub path: String,
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    pub last_modified: Option<i64>,
    pub artist_id: i64,
    pub album_id: i64,
}

/// What a bulk insert does when a song path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrityPolicy {
    /// Roll back the whole batch and report the collision.
    #[default]
    Abort,
    /// Leave the existing row alone and keep inserting.
    SkipDuplicates,
}

/// A comparison against a `search_name` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    Exact(String),
    Like(String),
}

impl NameFilter {
    pub fn exact(key: &str) -> Self {
        NameFilter::Exact(key.to_string())
    }

    /// Matches any value ending with `key`.
    pub fn suffix(key: &str) -> Self {
        NameFilter::Like(format!("%{}", escape_like(key)))
    }

    /// Matches any value containing `key`.
    pub fn substring(key: &str) -> Self {
        NameFilter::Like(format!("%{}%", escape_like(key)))
    }

    fn clause(&self, column: &str, idx: usize) -> String {
        match self {
            NameFilter::Exact(_) => format!("{column} = ?{idx}"),
            NameFilter::Like(_) => format!("{column} LIKE ?{idx} ESCAPE '\\'"),
        }
    }

    fn value(&self) -> &str {
        match self {
            NameFilter::Exact(v) | NameFilter::Like(v) => v,
        }
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub artists: u64,
    pub albums: u64,
    pub songs: u64,
}

/// The persisted artist/album/song catalog.
///
/// A single connection sits behind a mutex, so every statement sees a
/// consistent database. The bulk insert holds it for one transaction.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            info!("Creating catalog at {:?}", path);
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn get_or_create_artist(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock();
        let mut select = conn.prepare_cached("SELECT id FROM artist WHERE name = ?1")?;

        if let Some(id) = select.query_row(params![name], |row| row.get(0)).optional()? {
            return Ok(id);
        }

        // A racing writer may have inserted the same name; DO NOTHING lets the
        // re-select below pick up its row.
        let created = conn
            .prepare_cached(
                "INSERT INTO artist (name, search_name) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING",
            )?
            .execute(params![name, normalize(name)])?;
        if created > 0 {
            debug!("Added artist {}", name);
        }

        Ok(select.query_row(params![name], |row| row.get(0))?)
    }

    pub fn get_or_create_album(&self, name: &str, artist_id: i64) -> Result<i64> {
        let conn = self.conn.lock();
        let mut select =
            conn.prepare_cached("SELECT id FROM album WHERE name = ?1 AND artist_id = ?2")?;

        if let Some(id) = select
            .query_row(params![name, artist_id], |row| row.get(0))
            .optional()?
        {
            return Ok(id);
        }

        let created = conn
            .prepare_cached(
                "INSERT INTO album (name, search_name, artist_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name, artist_id) DO NOTHING",
            )?
            .execute(params![name, normalize(name), artist_id])?;
        if created > 0 {
            debug!("Added album {} (artist {})", name, artist_id);
        }

        Ok(select.query_row(params![name, artist_id], |row| row.get(0))?)
    }

    pub fn song_path_exists(&self, path: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists = conn
            .prepare_cached("SELECT EXISTS(SELECT 1 FROM song WHERE path = ?1)")?
            .query_row(params![path], |row| row.get(0))?;
        Ok(exists)
    }

    /// Inserts all rows in one transaction and returns how many were written.
    ///
    /// Under [`IntegrityPolicy::Abort`] a path collision rolls back every row
    /// of the batch and yields [`CatalogError::IntegrityViolation`].
    pub fn bulk_insert_songs(&self, rows: &[SongRow], policy: IntegrityPolicy) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        {
            let sql = match policy {
                IntegrityPolicy::Abort => {
                    "INSERT INTO song (name, search_name, path, disc_number, track_number, last_modified, artist_id, album_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                }
                IntegrityPolicy::SkipDuplicates => {
                    "INSERT OR IGNORE INTO song (name, search_name, path, disc_number, track_number, last_modified, artist_id, album_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                }
            };
            let mut stmt = tx.prepare(sql)?;

            for row in rows {
                let result = stmt.execute(params![
                    row.title,
                    row.search_title,
                    row.path,
                    row.disc_number,
                    row.track_number,
                    row.last_modified,
                    row.artist_id,
                    row.album_id
                ]);

                match result {
                    Ok(count) => inserted += count,
                    Err(e) if is_constraint_violation(&e) => {
                        return Err(CatalogError::IntegrityViolation {
                            path: row.path.clone(),
                            source: e,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Display names of artists whose search name matches, in insertion order.
    pub fn artist_names(&self, filter: &NameFilter) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT name FROM artist WHERE {} ORDER BY id",
            filter.clause("search_name", 1)
        );
        self.query_column(&sql, &[&filter.value()])
    }

    /// Ids of albums matching `album`, optionally restricted to artists
    /// matching `artist`.
    pub fn album_ids(&self, album: &NameFilter, artist: Option<&NameFilter>) -> Result<Vec<i64>> {
        let album_value = album.value();
        let artist_value = artist.map(NameFilter::value);

        let mut sql = String::from("SELECT album.id FROM album ");
        let mut conditions = vec![album.clause("album.search_name", 1)];
        let mut values: Vec<&dyn ToSql> = vec![&album_value];

        if let (Some(artist), Some(value)) = (artist, artist_value.as_ref()) {
            sql.push_str("JOIN artist ON album.artist_id = artist.id ");
            conditions.push(artist.clause("artist.search_name", 2));
            values.push(value);
        }

        sql.push_str(&format!("WHERE {} ORDER BY album.id", conditions.join(" AND ")));
        self.query_column(&sql, &values)
    }

    pub fn album_names_by_artist(&self, artist: &NameFilter) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT album.name FROM album
             INNER JOIN artist ON album.artist_id = artist.id
             WHERE {} ORDER BY album.id",
            artist.clause("artist.search_name", 1)
        );
        self.query_column(&sql, &[&artist.value()])
    }

    /// `(id, title)` of songs whose search title matches.
    pub fn songs_by_title(&self, filter: &NameFilter) -> Result<Vec<(i64, String)>> {
        let sql = format!(
            "SELECT id, name FROM song WHERE {} ORDER BY id",
            filter.clause("search_name", 1)
        );
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![filter.value()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Song ids of an album in disc then track order.
    pub fn song_ids_for_album(&self, album_id: i64) -> Result<Vec<i64>> {
        self.query_column(
            "SELECT id FROM song WHERE album_id = ?1
             ORDER BY disc_number ASC, track_number ASC, id ASC",
            &[&album_id],
        )
    }

    pub fn song_path(&self, song_id: i64) -> Result<Option<String>> {
        self.query_optional("SELECT path FROM song WHERE id = ?1", song_id)
    }

    pub fn album_name(&self, album_id: i64) -> Result<Option<String>> {
        self.query_optional("SELECT name FROM album WHERE id = ?1", album_id)
    }

    pub fn artist_name_for_album(&self, album_id: i64) -> Result<Option<String>> {
        self.query_optional(
            "SELECT artist.name FROM artist JOIN album ON artist.id = album.artist_id
             WHERE album.id = ?1",
            album_id,
        )
    }

    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.conn.lock();
        let stats = conn.query_row(
            "SELECT (SELECT count(*) FROM artist), (SELECT count(*) FROM album), (SELECT count(*) FROM song)",
            [],
            |row| {
                Ok(CatalogStats {
                    artists: row.get(0)?,
                    albums: row.get(1)?,
                    songs: row.get(2)?,
                })
            },
        )?;
        Ok(stats)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.lock().execute_batch(sql)?)
    }

    #[cfg(test)]
    pub(crate) fn song_rows(&self) -> Result<Vec<SongRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, search_name, path, disc_number, track_number, last_modified, artist_id, album_id
             FROM song ORDER BY path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SongRow {
                title: row.get(0)?,
                search_title: row.get(1)?,
                path: row.get(2)?,
                disc_number: row.get(3)?,
                track_number: row.get(4)?,
                last_modified: row.get(5)?,
                artist_id: row.get(6)?,
                album_id: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn query_column<T: FromSql>(&self, sql: &str, values: &[&dyn ToSql]) -> Result<Vec<T>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(values, |row| row.get(0))?;
        Ok(rows.collect::<std::result::Result<Vec<T>, _>>()?)
    }

    fn query_optional<T: FromSql>(&self, sql: &str, id: i64) -> Result<Option<T>> {
        let conn = self.conn.lock();
        let value = conn
            .prepare_cached(sql)?
            .query_row(params![id], |row| row.get(0))
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Makes another writer claim `path` the moment an album row is created,
    /// after the loader has checked the path but before its bulk insert.
    pub(crate) fn race_for_path(catalog: &Catalog, path: &str) -> Result<()> {
        catalog.execute_batch(&format!(
            "CREATE TRIGGER racing_writer AFTER INSERT ON album BEGIN
                 INSERT INTO song (name, search_name, path, artist_id, album_id)
                 VALUES ('Other', 'other', '{path}', NEW.artist_id, NEW.id);
             END;"
        ))
    }

    pub(crate) fn song(path: &str, title: &str, artist_id: i64, album_id: i64) -> SongRow {
        SongRow {
            title: title.to_string(),
            search_title: normalize(title),
            path: path.to_string(),
            disc_number: Some(1),
            track_number: None,
            last_modified: None,
            artist_id,
            album_id,
        }
    }

    #[test]
    fn test_get_or_create_artist_is_idempotent() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;

        let first = catalog.get_or_create_artist("Radiohead")?;
        let second = catalog.get_or_create_artist("Radiohead")?;

        assert_eq!(first, second);
        assert_eq!(catalog.stats()?.artists, 1);
        Ok(())
    }

    #[test]
    fn test_artist_search_name_is_derived() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        catalog.get_or_create_artist("The Beatles")?;

        let names = catalog.artist_names(&NameFilter::exact("beatles"))?;
        assert_eq!(names, vec!["The Beatles".to_string()]);
        Ok(())
    }

    #[test]
    fn test_album_is_scoped_to_artist() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        let queen = catalog.get_or_create_artist("Queen")?;
        let abba = catalog.get_or_create_artist("ABBA")?;

        let queen_hits = catalog.get_or_create_album("Greatest Hits", queen)?;
        let abba_hits = catalog.get_or_create_album("Greatest Hits", abba)?;

        assert_ne!(queen_hits, abba_hits);
        assert_eq!(catalog.get_or_create_album("Greatest Hits", queen)?, queen_hits);
        assert_eq!(catalog.stats()?.albums, 2);
        assert_eq!(catalog.artist_name_for_album(abba_hits)?.as_deref(), Some("ABBA"));
        Ok(())
    }

    #[test]
    fn test_bulk_insert_and_path_lookup() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        let artist = catalog.get_or_create_artist("Radiohead")?;
        let album = catalog.get_or_create_album("OK Computer", artist)?;

        let rows = vec![
            song("/music/ok/01.mp3", "Airbag", artist, album),
            song("/music/ok/02.mp3", "Paranoid Android", artist, album),
        ];
        assert_eq!(catalog.bulk_insert_songs(&rows, IntegrityPolicy::Abort)?, 2);

        assert!(catalog.song_path_exists("/music/ok/01.mp3")?);
        assert!(!catalog.song_path_exists("/music/ok/03.mp3")?);
        Ok(())
    }

    #[test]
    fn test_bulk_insert_collision_rolls_back_whole_batch() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        let artist = catalog.get_or_create_artist("Radiohead")?;
        let album = catalog.get_or_create_album("OK Computer", artist)?;

        catalog.bulk_insert_songs(&[song("/music/ok/02.mp3", "Paranoid Android", artist, album)], IntegrityPolicy::Abort)?;

        let batch = vec![
            song("/music/ok/01.mp3", "Airbag", artist, album),
            song("/music/ok/02.mp3", "Paranoid Android", artist, album),
            song("/music/ok/03.mp3", "Subterranean Homesick Alien", artist, album),
        ];
        let err = catalog
            .bulk_insert_songs(&batch, IntegrityPolicy::Abort)
            .unwrap_err();

        match err {
            CatalogError::IntegrityViolation { ref path, .. } => assert_eq!(path, "/music/ok/02.mp3"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!catalog.song_path_exists("/music/ok/01.mp3")?);
        assert_eq!(catalog.stats()?.songs, 1);
        Ok(())
    }

    #[test]
    fn test_bulk_insert_skip_duplicates_keeps_going() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        let artist = catalog.get_or_create_artist("Radiohead")?;
        let album = catalog.get_or_create_album("OK Computer", artist)?;

        catalog.bulk_insert_songs(&[song("/music/ok/02.mp3", "Paranoid Android", artist, album)], IntegrityPolicy::Abort)?;

        let batch = vec![
            song("/music/ok/01.mp3", "Airbag", artist, album),
            song("/music/ok/02.mp3", "Paranoid Android", artist, album),
        ];
        assert_eq!(catalog.bulk_insert_songs(&batch, IntegrityPolicy::SkipDuplicates)?, 1);
        assert_eq!(catalog.stats()?.songs, 2);
        Ok(())
    }

    #[test]
    fn test_songs_ordered_by_disc_then_track() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        let artist = catalog.get_or_create_artist("The Beatles")?;
        let album = catalog.get_or_create_album("The Beatles", artist)?;

        let mut rows = Vec::new();
        for (path, disc, track) in [("d2t1", 2, 1), ("d1t10", 1, 10), ("d1t2", 1, 2)] {
            let mut row = song(path, path, artist, album);
            row.disc_number = Some(disc);
            row.track_number = Some(track);
            rows.push(row);
        }
        catalog.bulk_insert_songs(&rows, IntegrityPolicy::Abort)?;

        let ordered: Vec<String> = catalog
            .song_ids_for_album(album)?
            .into_iter()
            .map(|id| catalog.song_path(id).map(|p| p.unwrap_or_default()))
            .collect::<Result<_>>()?;
        assert_eq!(ordered, vec!["d1t2", "d1t10", "d2t1"]);
        Ok(())
    }

    #[test]
    fn test_like_patterns_escape_wildcards() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        catalog.get_or_create_artist("100% Pure")?;
        catalog.get_or_create_artist("100 Proof")?;

        let names = catalog.artist_names(&NameFilter::substring("100%"))?;
        assert_eq!(names, vec!["100% Pure".to_string()]);
        Ok(())
    }

    #[test]
    fn test_missing_rows_are_none() -> Result<()> {
        let catalog = Catalog::open_in_memory()?;
        assert_eq!(catalog.song_path(42)?, None);
        assert_eq!(catalog.album_name(42)?, None);
        assert_eq!(catalog.artist_name_for_album(42)?, None);
        Ok(())
    }

    #[test]
    fn test_open_creates_parent_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("database").join("library.db");

        let catalog = Catalog::open(&path)?;
        catalog.get_or_create_artist("Björk")?;
        drop(catalog);

        let reopened = Catalog::open(&path)?;
        assert_eq!(reopened.stats()?.artists, 1);
        Ok(())
    }
}
