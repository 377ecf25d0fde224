//! SQLite-backed analysis history
//!
//! Stores every completed analysis as one row; payloads are kept as JSON so
//! the read side returns exactly the shape that was written.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vibe_analysis::{AnalysisPayload, AnalysisResult, TimeRange};

use crate::record::{HistoryQuery, HistoryRecord, OwnerId};
use crate::repository::{HistoryError, HistoryRepository};

/// How long a writer waits for another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Analysis history backed by SQLite
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

/// Row as stored, before decoding
struct StoredRow {
    id: i64,
    owner: String,
    time_range: String,
    created_at: i64,
    payload: String,
}

impl SqliteHistory {
    /// SQL schema for the history table
    const SCHEMA: &'static str = r#"
        CREATE TABLE IF NOT EXISTS analysis_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            analysis_type TEXT NOT NULL,
            time_range TEXT NOT NULL,
            created_at INTEGER NOT NULL,  -- nanoseconds since Unix epoch
            payload TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_owner_created
            ON analysis_history(owner, created_at DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_owner_type
            ON analysis_history(owner, analysis_type, time_range);
    "#;

    /// Open or create a history database at the given path
    pub fn open(db_path: &Path) -> Result<Self, HistoryError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(Self::SCHEMA)?;
        debug!(path = %db_path.display(), "Opened history database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the number of stored records across all owners
    pub fn count(&self) -> Result<usize, HistoryError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM analysis_history", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn decode(row: StoredRow) -> Result<HistoryRecord, HistoryError> {
        let corrupt = |message: String| HistoryError::CorruptRecord {
            id: row.id,
            message,
        };

        let time_range: TimeRange = row
            .time_range
            .parse()
            .map_err(|e: vibe_analysis::AnalysisError| corrupt(e.to_string()))?;
        let payload: AnalysisPayload =
            serde_json::from_str(&row.payload).map_err(|e| corrupt(e.to_string()))?;

        Ok(HistoryRecord {
            id: row.id,
            owner: OwnerId::new(row.owner),
            result: AnalysisResult {
                time_range,
                created_at: from_nanos(row.created_at),
                payload,
            },
        })
    }
}

impl HistoryRepository for SqliteHistory {
    fn append(
        &self,
        owner: &OwnerId,
        result: AnalysisResult,
    ) -> Result<HistoryRecord, HistoryError> {
        let created_at = to_nanos(&result.created_at)?;
        let payload = serde_json::to_string(&result.payload)?;
        let analysis_type = result.analysis_type();

        // AUTOINCREMENT never reuses a rowid; insert and id lookup share the
        // lock so concurrent appends cannot read each other's rowid
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO analysis_history
               (owner, analysis_type, time_range, created_at, payload)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                owner.as_str(),
                analysis_type.as_str(),
                result.time_range.as_str(),
                created_at,
                payload,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        info!(id, owner = %owner, %analysis_type, "Appended history record");
        Ok(HistoryRecord {
            id,
            owner: owner.clone(),
            result,
        })
    }

    fn query(
        &self,
        owner: &OwnerId,
        query: &HistoryQuery,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = query.limit.map_or(-1, |l| l.min(i64::MAX as usize) as i64);

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner, time_range, created_at, payload
             FROM analysis_history
             WHERE owner = ?1
               AND (?2 IS NULL OR analysis_type = ?2)
               AND (?3 IS NULL OR time_range = ?3)
             ORDER BY created_at DESC, id DESC
             LIMIT ?4",
        )?;

        let rows = stmt
            .query_map(
                params![
                    owner.as_str(),
                    query.analysis_type.map(|t| t.as_str()),
                    query.time_range.map(|r| r.as_str()),
                    limit,
                ],
                |row| {
                    Ok(StoredRow {
                        id: row.get(0)?,
                        owner: row.get(1)?,
                        time_range: row.get(2)?,
                        created_at: row.get(3)?,
                        payload: row.get(4)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(Self::decode).collect()
    }

    fn clear(&self, owner: &OwnerId) -> Result<usize, HistoryError> {
        let removed = self.conn.lock().execute(
            "DELETE FROM analysis_history WHERE owner = ?1",
            [owner.as_str()],
        )?;
        info!(owner = %owner, removed, "Cleared history");
        Ok(removed)
    }
}

fn to_nanos(timestamp: &DateTime<Utc>) -> Result<i64, HistoryError> {
    timestamp
        .timestamp_nanos_opt()
        .ok_or(HistoryError::TimestampOutOfRange)
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
