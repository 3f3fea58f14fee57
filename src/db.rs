use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OpenFlags, OptionalExtension, ffi, params};

use crate::camelot;
use crate::error::MatchError;
use crate::normalize::{normalize_for_matching, normalized_file_stem};
use crate::session::{LookupMethod, TrackLookup, TrackStore};
use crate::types::{KeyCount, LibrarySummary, Track};

const SCHEMA_VERSION: i32 = 1;

pub fn open(path: &str) -> Result<Connection, rusqlite::Error> {
    open_file(path, migrate)
}

/// Open (creating if needed) a file-backed SQLite database, set the shared
/// PRAGMAs and bring its schema up to date with `migrate`.
pub fn open_file(
    path: &str,
    migrate: fn(&Connection) -> Result<(), rusqlite::Error>,
) -> Result<Connection, rusqlite::Error> {
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_CANTOPEN),
                Some(format!(
                    "failed to create parent directory {} for {}: {}",
                    parent.display(),
                    db_path.display(),
                    err
                )),
            )
        })?;
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    migrate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_test() -> Connection {
    open_in_memory().unwrap()
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS tracks (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            title        TEXT NOT NULL,
            bpm          REAL,
            musical_key  TEXT,
            camelot_code TEXT,
            genre        TEXT,
            label        TEXT,
            energy       INTEGER,
            date_added   INTEGER,
            file_path    TEXT UNIQUE,
            comment      TEXT
        );
        CREATE TABLE IF NOT EXISTS artists (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS track_artists (
            track_id  INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
            artist_id INTEGER NOT NULL REFERENCES artists(id),
            role      TEXT NOT NULL CHECK (role IN ('artist', 'remixer')),
            position  INTEGER NOT NULL,
            PRIMARY KEY (track_id, role, position)
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_title ON tracks(title);
        CREATE INDEX IF NOT EXISTS idx_track_artists_artist ON track_artists(artist_id);
        PRAGMA user_version = {SCHEMA_VERSION};"
    ))?;
    Ok(())
}

const TRACK_SELECT: &str = "
SELECT id, title, bpm, musical_key, camelot_code, genre, label, energy,
       date_added, file_path, comment
FROM tracks";

/// Row to track, without artist credits. Unparseable codes degrade to `None`.
fn row_to_track(row: &rusqlite::Row) -> Result<Track, rusqlite::Error> {
    let code: Option<String> = row.get("camelot_code")?;
    let energy: Option<i64> = row.get("energy")?;
    let mut track = Track::new(row.get("id")?, row.get::<_, String>("title")?);
    track.bpm = row.get("bpm")?;
    track.key = row.get("musical_key")?;
    track.camelot_code = code.and_then(|c| c.parse().ok());
    track.genre = row.get("genre")?;
    track.label = row.get("label")?;
    track.energy = energy.and_then(|e| u8::try_from(e).ok());
    track.date_added = row.get("date_added")?;
    track.file_path = row.get("file_path")?;
    track.comment = row.get("comment")?;
    Ok(track)
}

type Credits = (Vec<String>, Vec<String>);

fn load_credits(
    conn: &Connection,
    track_id: Option<i64>,
) -> Result<HashMap<i64, Credits>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT ta.track_id, ta.role, a.name
         FROM track_artists ta
         JOIN artists a ON a.id = ta.artist_id
         WHERE ?1 IS NULL OR ta.track_id = ?1
         ORDER BY ta.track_id, ta.role, ta.position",
    )?;
    let rows = stmt.query_map(params![track_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut credits: HashMap<i64, Credits> = HashMap::new();
    for row in rows {
        let (id, role, name) = row?;
        let entry = credits.entry(id).or_default();
        if role == "remixer" {
            entry.1.push(name);
        } else {
            entry.0.push(name);
        }
    }
    Ok(credits)
}

fn attach_credits(track: &mut Track, credits: &mut HashMap<i64, Credits>) {
    if let Some((artists, remixers)) = credits.remove(&track.id) {
        track.artists = artists;
        track.remixers = remixers;
    }
}

pub fn load_all_tracks(conn: &Connection) -> Result<Vec<Track>, rusqlite::Error> {
    let mut credits = load_credits(conn, None)?;
    let mut stmt = conn.prepare(&format!("{TRACK_SELECT} ORDER BY id"))?;
    let rows = stmt.query_map([], row_to_track)?;
    let mut tracks = Vec::new();
    for row in rows {
        let mut track = row?;
        attach_credits(&mut track, &mut credits);
        tracks.push(track);
    }
    Ok(tracks)
}

pub fn get_track(conn: &Connection, track_id: i64) -> Result<Option<Track>, rusqlite::Error> {
    let track = conn
        .query_row(
            &format!("{TRACK_SELECT} WHERE id = ?1"),
            params![track_id],
            row_to_track,
        )
        .optional()?;
    let Some(mut track) = track else {
        return Ok(None);
    };
    let mut credits = load_credits(conn, Some(track_id))?;
    attach_credits(&mut track, &mut credits);
    Ok(Some(track))
}

/// Insert a track, or update the existing row with the same file path.
/// Artist and remixer links are replaced. The incoming `id` is ignored;
/// the stored id is returned.
pub fn upsert_track(conn: &Connection, track: &Track) -> Result<i64, rusqlite::Error> {
    let code = track
        .camelot_code
        .or_else(|| track.key.as_deref().and_then(camelot::key_to_camelot))
        .map(|c| c.to_string());
    let key = track
        .key
        .as_deref()
        .map(|k| camelot::canonical_key(k).unwrap_or_else(|| k.trim().to_string()));

    let tx = conn.unchecked_transaction()?;
    let id: i64 = tx.query_row(
        "INSERT INTO tracks (title, bpm, musical_key, camelot_code, genre, label, energy,
                             date_added, file_path, comment)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(file_path) DO UPDATE SET
             title = ?1, bpm = ?2, musical_key = ?3, camelot_code = ?4, genre = ?5,
             label = ?6, energy = ?7, date_added = COALESCE(tracks.date_added, ?8),
             comment = ?10
         RETURNING id",
        params![
            track.title,
            track.bpm,
            key,
            code,
            track.genre,
            track.label,
            track.energy,
            track.date_added,
            track.file_path,
            track.comment,
        ],
        |row| row.get(0),
    )?;

    tx.execute("DELETE FROM track_artists WHERE track_id = ?1", params![id])?;
    for (role, names) in [("artist", &track.artists), ("remixer", &track.remixers)] {
        let names = names.iter().map(|n| n.trim()).filter(|n| !n.is_empty());
        for (position, name) in names.enumerate() {
            tx.execute(
                "INSERT INTO artists (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![name],
            )?;
            let artist_id: i64 =
                tx.query_row("SELECT id FROM artists WHERE name = ?1", params![name], |row| {
                    row.get(0)
                })?;
            tx.execute(
                "INSERT OR IGNORE INTO track_artists (track_id, artist_id, role, position)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, artist_id, role, position as i64],
            )?;
        }
    }
    tx.commit()?;
    Ok(id)
}

/// Resolve an identifier: numeric id, exact title, case-insensitive title,
/// exact file path, then normalized file name.
pub fn find_track(
    conn: &Connection,
    identifier: &str,
) -> Result<Option<TrackLookup>, rusqlite::Error> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Ok(None);
    }
    let found = |id: i64, method: LookupMethod| -> Result<Option<TrackLookup>, rusqlite::Error> {
        Ok(get_track(conn, id)?.map(|track| TrackLookup { track, method }))
    };

    if let Ok(id) = identifier.parse::<i64>()
        && let Some(lookup) = found(id, LookupMethod::Id)?
    {
        return Ok(Some(lookup));
    }

    let by_title: Option<i64> = conn
        .query_row(
            "SELECT id FROM tracks WHERE title = ?1 ORDER BY id LIMIT 1",
            params![identifier],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = by_title {
        return found(id, LookupMethod::Title);
    }
    let by_loose_title: Option<i64> = conn
        .query_row(
            "SELECT id FROM tracks WHERE trim(title) = ?1 COLLATE NOCASE ORDER BY id LIMIT 1",
            params![identifier],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = by_loose_title {
        return found(id, LookupMethod::LooseTitle);
    }

    let by_path: Option<i64> = conn
        .query_row(
            "SELECT id FROM tracks WHERE file_path = ?1",
            params![identifier],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = by_path {
        return found(id, LookupMethod::FilePath);
    }

    let wanted = normalized_file_stem(identifier).unwrap_or_else(|| normalize_for_matching(identifier));
    if wanted.is_empty() {
        return Ok(None);
    }
    let mut stmt =
        conn.prepare("SELECT id, file_path FROM tracks WHERE file_path IS NOT NULL ORDER BY id")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (id, path) = row?;
        if normalized_file_stem(&path).as_deref() == Some(wanted.as_str()) {
            return found(id, LookupMethod::FileName);
        }
    }
    Ok(None)
}

pub fn library_summary(conn: &Connection) -> Result<LibrarySummary, rusqlite::Error> {
    let total_tracks: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
    let matchable_tracks: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tracks WHERE bpm > 0 AND camelot_code IS NOT NULL",
        [],
        |row| row.get(0),
    )?;
    let artist_count: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT artist_id) FROM track_artists",
        [],
        |row| row.get(0),
    )?;
    let avg_bpm: f64 = conn.query_row(
        "SELECT COALESCE(AVG(bpm), 0) FROM tracks WHERE bpm > 0",
        [],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(
        "SELECT camelot_code, COUNT(*) AS n FROM tracks
         WHERE camelot_code IS NOT NULL
         GROUP BY camelot_code
         ORDER BY n DESC, camelot_code",
    )?;
    let key_distribution = stmt
        .query_map([], |row| {
            Ok(KeyCount {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LibrarySummary {
        total_tracks,
        matchable_tracks,
        artist_count,
        avg_bpm,
        key_distribution,
    })
}

/// SQLite-backed [`TrackStore`].
pub struct SqliteTrackStore {
    conn: Mutex<Connection>,
}

impl SqliteTrackStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &str) -> Result<Self, MatchError> {
        Ok(Self::new(open(path)?))
    }

    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, MatchError> {
        self.conn.lock().map_err(|_| MatchError::LockPoisoned)
    }

    pub fn summary(&self) -> Result<LibrarySummary, MatchError> {
        let conn = self.conn()?;
        Ok(library_summary(&conn)?)
    }
}

impl TrackStore for SqliteTrackStore {
    fn load_all_tracks(&self) -> Result<Vec<Track>, MatchError> {
        let conn = self.conn()?;
        Ok(load_all_tracks(&conn)?)
    }

    fn find_track(&self, identifier: &str) -> Result<TrackLookup, MatchError> {
        let conn = self.conn()?;
        find_track(&conn, identifier)?
            .ok_or_else(|| MatchError::TrackNotFound(identifier.to_string()))
    }
}
