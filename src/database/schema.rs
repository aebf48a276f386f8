pub const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS artist (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        search_name TEXT NOT NULL,
        play_count INTEGER NOT NULL DEFAULT 0
    );
    CREATE UNIQUE INDEX IF NOT EXISTS unq_artist_name ON artist(name);
    CREATE INDEX IF NOT EXISTS idx_artist_search_name ON artist(search_name);

    CREATE TABLE IF NOT EXISTS album (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        search_name TEXT NOT NULL,
        artist_id INTEGER NOT NULL,
        play_count INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(artist_id) REFERENCES artist(id)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS unq_album_name_artist_id ON album(name, artist_id);
    CREATE INDEX IF NOT EXISTS idx_album_search_name ON album(search_name);
    CREATE INDEX IF NOT EXISTS idx_album_artist_id ON album(artist_id);

    CREATE TABLE IF NOT EXISTS song (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        search_name TEXT NOT NULL,
        path TEXT NOT NULL,
        disc_number INTEGER,
        track_number INTEGER,
        last_modified INTEGER,
        artist_id INTEGER NOT NULL,
        album_id INTEGER NOT NULL,
        play_count INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(artist_id) REFERENCES artist(id),
        FOREIGN KEY(album_id) REFERENCES album(id)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS unq_song_path ON song(path);
    CREATE INDEX IF NOT EXISTS idx_song_search_name ON song(search_name);
    CREATE INDEX IF NOT EXISTS idx_song_album_id ON song(album_id);
    CREATE INDEX IF NOT EXISTS idx_song_artist_id ON song(artist_id);
";
