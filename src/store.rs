use std::io::BufRead;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::MatchError;
use crate::scoring::SimilarityStore;

const SCHEMA_VERSION: i32 = 1;

pub fn open(path: &str) -> Result<Connection, rusqlite::Error> {
    db::open_file(path, migrate)
}

#[cfg(test)]
pub fn open_in_memory() -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS similarity (
            reference_id INTEGER NOT NULL,
            candidate_id INTEGER NOT NULL,
            value        REAL NOT NULL,
            updated_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (reference_id, candidate_id)
        );
        PRAGMA user_version = {SCHEMA_VERSION};"
    ))?;
    Ok(())
}

/// Idempotent write keyed by the pair. Retrying an import is safe.
pub fn set_similarity(
    conn: &Connection,
    reference_id: i64,
    candidate_id: i64,
    value: f64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO similarity (reference_id, candidate_id, value)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(reference_id, candidate_id)
         DO UPDATE SET value = ?3, updated_at = datetime('now')",
        params![reference_id, candidate_id, value],
    )?;
    Ok(())
}

pub fn get_similarity(
    conn: &Connection,
    reference_id: i64,
    candidate_id: i64,
) -> Result<Option<f64>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM similarity WHERE reference_id = ?1 AND candidate_id = ?2",
        params![reference_id, candidate_id],
        |row| row.get(0),
    )
    .optional()
}

pub fn max_similarity(conn: &Connection) -> Result<Option<f64>, rusqlite::Error> {
    conn.query_row("SELECT MAX(value) FROM similarity WHERE value >= 0", [], |row| {
        row.get(0)
    })
}

pub fn count_similarity(conn: &Connection) -> Result<i64, rusqlite::Error> {
    conn.query_row("SELECT COUNT(*) FROM similarity", [], |row| row.get(0))
}

/// One line of a similarity JSONL file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    pub reference_id: i64,
    pub candidate_id: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    /// First few rejected lines as `(line number, reason)`.
    pub errors: Vec<(usize, String)>,
}

const MAX_REPORTED_ERRORS: usize = 20;

/// Import `{"reference_id", "candidate_id", "value"}` lines. Blank lines are
/// ignored; malformed lines and non-finite or negative values are counted and
/// skipped. The whole import is one transaction.
pub fn import_similarity_jsonl<R: BufRead>(
    conn: &Connection,
    reader: R,
) -> Result<ImportSummary, MatchError> {
    let mut summary = ImportSummary::default();
    let tx = conn.unchecked_transaction()?;
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<SimilarityRecord>(trimmed) {
            Ok(record) if record.value.is_finite() && record.value >= 0.0 => record,
            Ok(record) => {
                reject(&mut summary, line_no, format!("invalid value {}", record.value));
                continue;
            }
            Err(e) => {
                reject(&mut summary, line_no, e.to_string());
                continue;
            }
        };
        set_similarity(&tx, record.reference_id, record.candidate_id, record.value)?;
        summary.imported += 1;
    }
    tx.commit()?;
    tracing::info!(
        imported = summary.imported,
        skipped = summary.skipped,
        "similarity import finished"
    );
    Ok(summary)
}

fn reject(summary: &mut ImportSummary, line_no: usize, reason: String) {
    tracing::debug!(line = line_no, "skipping similarity line: {reason}");
    summary.skipped += 1;
    if summary.errors.len() < MAX_REPORTED_ERRORS {
        summary.errors.push((line_no, reason));
    }
}

/// SQLite-backed [`SimilarityStore`]. Read errors degrade to "no value".
pub struct SqliteSimilarityStore {
    conn: Mutex<Connection>,
}

impl SqliteSimilarityStore {
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
}

impl SimilarityStore for SqliteSimilarityStore {
    fn lookup_similarity(&self, reference_id: i64, candidate_id: i64) -> Option<f64> {
        let conn = self.conn().ok()?;
        match get_similarity(&conn, reference_id, candidate_id) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(reference_id, candidate_id, "similarity lookup failed: {e}");
                None
            }
        }
    }

    fn max_similarity(&self) -> Option<f64> {
        let conn = self.conn().ok()?;
        match max_similarity(&conn) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("similarity max lookup failed: {e}");
                None
            }
        }
    }
}
